//! Budget and eviction integration tests.
//!
//! These exercise the pool through the factory, the way the rendering
//! pipeline uses it.

mod common;

use std::sync::{Arc, mpsc};
use std::thread;

use rstest::rstest;

use common::{Harness, render_target_of};
use redlilium_gpu_resources::{
    GpuResource, Image, PoolCategory, ResourceError, ResourceSettings, TextureDescriptor,
    TextureFormat, WrapMode,
};

const BUDGET: u64 = 1_000_000;

#[test]
fn test_eviction_admits_new_target() {
    let h = Harness::with_budget(PoolCategory::RenderTargets, BUDGET);

    let kept = render_target_of(&h.factory, 300_000);
    let scratch = render_target_of(&h.factory, 300_000);
    scratch.set_contents_useful(false);
    assert_eq!(h.usage(PoolCategory::RenderTargets), 600_000);

    let incoming = render_target_of(&h.factory, 500_000);

    assert_eq!(h.usage(PoolCategory::RenderTargets), 800_000);
    assert!(scratch.is_disposed());
    assert!(!kept.is_disposed());
    assert!(!incoming.is_disposed());
    assert_eq!(h.backend.release_count(), 1);
}

#[rstest]
#[case::all_useful(false, false)]
#[case::discardable_but_pinned(true, true)]
fn test_rejection_leaves_usage_unchanged(#[case] discardable: bool, #[case] pinned: bool) {
    let h = Harness::with_budget(PoolCategory::RenderTargets, BUDGET);

    let first = render_target_of(&h.factory, 300_000);
    let second = render_target_of(&h.factory, 300_000);
    first.set_contents_useful(!discardable);
    second.set_contents_useful(!discardable);
    let _pins = pinned.then(|| (first.pin(), second.pin()));

    let err = h
        .factory
        .create_render_target(250, 500, WrapMode::ClampNotNeeded, false)
        .unwrap_err();

    assert!(err.is_transient());
    assert!(matches!(
        err,
        ResourceError::AllocationRejected {
            category: PoolCategory::RenderTargets,
            requested: 500_000,
            usage: 600_000,
            maximum: BUDGET,
        }
    ));
    assert_eq!(h.usage(PoolCategory::RenderTargets), 600_000);
    assert!(!first.is_disposed());
    assert!(!second.is_disposed());
    assert_eq!(h.backend.created_count(), 2);
}

#[rstest]
#[case::bgra(TextureFormat::Bgra8Premultiplied, 4)]
#[case::gray(TextureFormat::Gray8, 1)]
#[case::rgb(TextureFormat::Rgb8, 3)]
#[case::half_float(TextureFormat::Rgba16Float, 8)]
fn test_texture_over_budget_fails(#[case] format: TextureFormat, #[case] bpp: u64) {
    let h = Harness::with_budget(PoolCategory::Textures, 64 * 64 * bpp);

    let _resident = h
        .factory
        .create_texture(&TextureDescriptor::new_2d(64, 48, format))
        .unwrap();
    let before = h.usage(PoolCategory::Textures);
    assert_eq!(before, 64 * 48 * bpp);

    let result = h
        .factory
        .create_texture(&TextureDescriptor::new_2d(64, 32, format));
    assert!(matches!(
        result,
        Err(ResourceError::AllocationRejected { .. })
    ));
    assert_eq!(h.usage(PoolCategory::Textures), before);
}

#[test]
fn test_dropped_resources_return_budget() {
    let h = Harness::with_budget(PoolCategory::RenderTargets, BUDGET);

    let targets: Vec<_> = (0..4).map(|_| render_target_of(&h.factory, 250_000)).collect();
    assert_eq!(h.usage(PoolCategory::RenderTargets), BUDGET);

    drop(targets);
    h.flush();

    assert_eq!(h.usage(PoolCategory::RenderTargets), 0);
    assert_eq!(h.factory.context().record_count(), 0);
    let stats = h.factory.context().pool(PoolCategory::RenderTargets).stats();
    assert_eq!(stats.peak, BUDGET);
    assert_eq!(stats.tracked, 0);
}

#[test]
fn test_least_recently_used_is_evicted_first() {
    let h = Harness::with_budget(PoolCategory::RenderTargets, BUDGET);

    let a = render_target_of(&h.factory, 400_000);
    let b = render_target_of(&h.factory, 400_000);
    a.set_contents_useful(false);
    b.set_contents_useful(false);
    a.touch();

    let _c = render_target_of(&h.factory, 400_000);
    assert!(b.is_disposed());
    assert!(!a.is_disposed());
}

#[test]
fn test_pools_are_independent() {
    let h = Harness::new(
        ResourceSettings::default()
            .with_budget(PoolCategory::RenderTargets, 1000)
            .with_budget(PoolCategory::Textures, BUDGET),
    );

    let texture = h
        .factory
        .create_texture(&TextureDescriptor::new_2d(100, 100, TextureFormat::Gray8))
        .unwrap();
    let target = render_target_of(&h.factory, 1000);

    assert!(
        h.factory
            .create_render_target(250, 1, WrapMode::ClampNotNeeded, false)
            .is_err()
    );
    assert_eq!(h.usage(PoolCategory::RenderTargets), 1000);
    assert_eq!(h.usage(PoolCategory::Textures), 10_000);
    assert!(!texture.is_disposed());
    assert!(!target.is_disposed());
}

#[test]
fn test_cached_texture_of_dropped_image_returns_budget() {
    // Room for exactly one 4x4 gray texture.
    let h = Harness::with_budget(PoolCategory::Textures, 16);
    let image = Arc::new(Image::filled(4, 4, TextureFormat::Gray8, &[1]).unwrap());

    let cached = h
        .factory
        .get_cached_texture(&image, WrapMode::ClampToEdge, false)
        .unwrap();
    let cached_handle = cached.handle();
    drop((cached, image));
    h.flush();

    let texture = h
        .factory
        .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Gray8))
        .unwrap();
    h.flush();

    assert!(!h.backend.is_live(cached_handle));
    assert!(h.backend.is_live(texture.handle()));
    assert_eq!(h.usage(PoolCategory::Textures), 16);
    assert_eq!(h.factory.cached_texture_count(), 0);
    assert_eq!(h.backend.double_release_count(), 0);
}

#[test]
fn test_concurrent_churn_stays_within_budget() {
    const WORKERS: u64 = 4;
    let h = Harness::with_budget(PoolCategory::RenderTargets, 64_000);
    let (dropped, drop_queue) = mpsc::channel();

    thread::scope(|scope| {
        // Hands owners to the disposer from a thread of its own.
        scope.spawn(move || {
            for target in drop_queue {
                drop(target);
            }
        });

        for seed in 0..WORKERS {
            let h = &h;
            let dropped = dropped.clone();
            scope.spawn(move || {
                let mut state = seed * 0x2545_F491 + 7;
                let mut held = Vec::new();
                for _ in 0..300 {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    let rows = (state % 16 + 1) as u32;

                    if let Ok(target) =
                        h.factory
                            .create_render_target(250, rows, WrapMode::ClampNotNeeded, false)
                    {
                        target.set_contents_useful(state % 4 != 0);
                        held.push(target);
                    }
                    if state % 3 == 0 && !held.is_empty() {
                        let index = (state as usize / 3) % held.len();
                        dropped.send(held.swap_remove(index)).unwrap();
                    }
                    assert!(h.usage(PoolCategory::RenderTargets) <= 64_000);
                }
                for target in held {
                    dropped.send(target).unwrap();
                }
            });
        }
        drop(dropped);
    });
    h.flush();

    let stats = h.factory.context().pool(PoolCategory::RenderTargets).stats();
    assert_eq!(stats.usage, 0);
    assert_eq!(stats.tracked, 0);
    assert!(stats.peak <= 64_000);
    assert_eq!(h.backend.live_count(), 0);
    assert_eq!(h.backend.double_release_count(), 0);
}
