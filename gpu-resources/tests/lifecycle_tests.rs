//! Resource lifetime integration tests.
//!
//! Release must happen exactly once per native resource, whichever path
//! triggers it: eager disposal, the disposer thread, eviction or context
//! teardown.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use rstest::rstest;

use common::{Harness, init_logging, render_target_of};
use redlilium_gpu_resources::{
    ContextRegistry, DummyBackend, GpuResource, Image, Indices, MeshDescriptor, PoolCategory,
    ResourceError, ResourceSettings, ShaderDescriptor, SwapChainDescriptor, TextureDescriptor,
    TextureFormat, WrapMode, load_settings,
};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Texture,
    RenderTarget,
    Shader,
    Mesh,
    SwapChain,
}

/// Create a small resource of the given kind.
fn create(h: &Harness, kind: Kind) -> Box<dyn GpuResource> {
    let factory = &h.factory;
    match kind {
        Kind::Texture => Box::new(
            factory
                .create_texture(&TextureDescriptor::new_2d(8, 8, TextureFormat::Gray8))
                .unwrap(),
        ),
        Kind::RenderTarget => Box::new(
            factory
                .create_render_target(8, 8, WrapMode::ClampToZero, false)
                .unwrap(),
        ),
        Kind::Shader => Box::new(
            factory
                .create_shader(&ShaderDescriptor::new(vec![1, 2, 3, 4]))
                .unwrap(),
        ),
        Kind::Mesh => Box::new(
            factory
                .create_mesh(&MeshDescriptor::new(
                    vec![0.0; 6],
                    Indices::U16(vec![0, 1, 2]),
                ))
                .unwrap(),
        ),
        Kind::SwapChain => Box::new(
            factory
                .create_swap_chain(&SwapChainDescriptor::new(0x1000, 16, 16))
                .unwrap(),
        ),
    }
}

#[rstest]
#[case::texture(Kind::Texture)]
#[case::render_target(Kind::RenderTarget)]
#[case::shader(Kind::Shader)]
#[case::mesh(Kind::Mesh)]
#[case::swap_chain(Kind::SwapChain)]
fn test_drop_releases_once(#[case] kind: Kind) {
    let h = Harness::new(ResourceSettings::default());
    let resource = create(&h, kind);
    let record = Arc::clone(resource.record());
    let created = h.backend.created_count();
    assert!(h.factory.context().contains(record.id()));

    drop(resource);
    h.flush();

    assert!(record.is_disposed());
    assert!(!h.factory.context().contains(record.id()));
    assert_eq!(h.backend.live_count(), 0);
    assert_eq!(h.backend.release_count(), created);
    assert_eq!(h.backend.double_release_count(), 0);
}

#[rstest]
#[case::texture(Kind::Texture)]
#[case::render_target(Kind::RenderTarget)]
#[case::shader(Kind::Shader)]
#[case::mesh(Kind::Mesh)]
fn test_eager_dispose_then_drop(#[case] kind: Kind) {
    let h = Harness::new(ResourceSettings::default());
    let resource = create(&h, kind);

    assert!(resource.dispose());
    assert!(!resource.dispose());
    assert!(resource.handle().is_null());
    drop(resource);
    h.flush();

    assert_eq!(h.backend.release_count(), 1);
    assert_eq!(h.registry.disposer_stats().drained, 0);
}

#[test]
fn test_concurrent_dispose_releases_once() {
    let h = Harness::new(ResourceSettings::default());
    let target = h
        .factory
        .create_render_target(64, 64, WrapMode::ClampToEdge, false)
        .unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let target = target.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                target.dispose()
            })
        })
        .collect();
    let released = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|released| *released)
        .count();

    assert_eq!(released, 1);
    assert_eq!(h.backend.release_count(), 1);
    assert_eq!(h.usage(PoolCategory::RenderTargets), 0);
}

#[test]
fn test_teardown_after_dispose_has_no_double_free() {
    let h = Harness::new(ResourceSettings::default());
    let a = render_target_of(&h.factory, 4000);
    let b = render_target_of(&h.factory, 8000);

    a.dispose();
    b.dispose();
    assert_eq!(h.backend.release_count(), 2);

    h.factory.context().dispose().unwrap();
    assert_eq!(h.backend.release_count(), 2);
    assert_eq!(h.backend.double_release_count(), 0);

    drop((a, b));
    h.flush();
    assert_eq!(h.backend.release_count(), 2);
}

#[test]
fn test_teardown_releases_outstanding_resources() {
    let h = Harness::new(ResourceSettings::default());
    let texture = create(&h, Kind::Texture);
    let shader = create(&h, Kind::Shader);

    h.registry.dispose().unwrap();
    assert!(texture.is_disposed());
    assert!(shader.is_disposed());
    assert_eq!(h.backend.release_count(), 2);
    assert_eq!(h.backend.device_count(), 0);
    assert_eq!(h.usage(PoolCategory::Textures), 0);

    // The disposer is gone; dropping the owners is a no-op.
    drop((texture, shader));
    assert_eq!(h.backend.double_release_count(), 0);
}

#[test]
fn test_cross_thread_teardown_releases_nothing() {
    let h = Harness::new(ResourceSettings::default());
    let target = create(&h, Kind::RenderTarget);
    let context = Arc::clone(h.factory.context());

    let result = thread::Builder::new()
        .name("render-worker".into())
        .spawn(move || context.dispose())
        .unwrap()
        .join()
        .unwrap();

    match result {
        Err(ResourceError::CrossThreadTeardown {
            operation, current, ..
        }) => {
            assert_eq!(operation, "Context::dispose");
            assert_eq!(current, "render-worker");
        }
        other => panic!("expected cross-thread error, got {other:?}"),
    }
    assert!(!target.is_disposed());
    assert_eq!(h.backend.release_count(), 0);
}

#[test]
fn test_panicking_release_keeps_accounting() {
    let h = Harness::new(ResourceSettings::default());
    let first = render_target_of(&h.factory, 2000);
    let second = render_target_of(&h.factory, 2000);

    h.backend.set_panic_on_release(true);
    drop(first);
    h.flush();
    assert_eq!(h.registry.disposer_stats().panicked, 1);
    assert_eq!(h.usage(PoolCategory::RenderTargets), 2000);

    // The drain thread survives the panic.
    h.backend.set_panic_on_release(false);
    drop(second);
    h.flush();
    assert_eq!(h.usage(PoolCategory::RenderTargets), 0);
    assert_eq!(h.backend.release_count(), 2);
}

#[test]
fn test_image_cache_follows_image_lifetime() {
    let h = Harness::new(ResourceSettings::default());
    let image = Arc::new(Image::filled(4, 4, TextureFormat::Gray8, &[9]).unwrap());

    let first = h
        .factory
        .get_cached_texture(&image, WrapMode::ClampToEdge, false)
        .unwrap();
    let again = h
        .factory
        .get_cached_texture(&image, WrapMode::ClampToEdge, false)
        .unwrap();
    assert_eq!(first.handle(), again.handle());
    assert_eq!(h.backend.created_count(), 1);

    let old_handle = first.handle();
    drop((first, again, image));

    let equal_image = Arc::new(Image::filled(4, 4, TextureFormat::Gray8, &[9]).unwrap());
    let fresh = h
        .factory
        .get_cached_texture(&equal_image, WrapMode::ClampToEdge, false)
        .unwrap();
    h.flush();

    assert_ne!(fresh.handle(), old_handle);
    assert_eq!(h.backend.created_count(), 2);
    assert!(!h.backend.is_live(old_handle));
    assert_eq!(h.factory.cached_texture_count(), 1);
}

#[test]
fn test_mipmapped_images_use_their_own_cache() {
    let h = Harness::new(ResourceSettings::default());
    let image = Arc::new(
        Image::filled(8, 8, TextureFormat::Bgra8Premultiplied, &[0, 0, 0, 255]).unwrap(),
    );

    let plain = h
        .factory
        .get_cached_texture(&image, WrapMode::ClampToEdge, false)
        .unwrap();
    let mipmapped = h
        .factory
        .get_cached_texture(&image, WrapMode::ClampToEdge, true)
        .unwrap();

    assert_ne!(plain.handle(), mipmapped.handle());
    assert!(mipmapped.descriptor().mipmapped);
    let plain_size = 8 * 8 * 4;
    assert_eq!(
        h.usage(PoolCategory::Textures),
        plain_size + plain_size + plain_size / 3
    );
}

#[test]
fn test_registry_with_settings_file() {
    init_logging();
    let path = std::env::temp_dir().join(format!("gpu-resources-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "render_target_budget = 4096\nforce_pow2 = true\ndisposer_thread_name = \"test-disposer\"\n",
    )
    .unwrap();
    let settings = load_settings(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let backend = Arc::new(DummyBackend::new());
    let registry = ContextRegistry::new(backend.clone(), settings).unwrap();
    let factory = registry.find_default().unwrap();

    // 30x30 rounds up to 32x32, exactly the budget.
    let target = factory
        .create_render_target(30, 30, WrapMode::ClampToZero, false)
        .unwrap();
    assert_eq!(target.physical_width(), 32);
    assert!(
        factory
            .create_render_target(1, 1, WrapMode::ClampToZero, false)
            .is_err()
    );

    drop(target);
    registry.dispose().unwrap();
    assert_eq!(backend.live_count(), 0);
}
