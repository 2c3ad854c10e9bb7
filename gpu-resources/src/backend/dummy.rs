//! Dummy native backend for testing and headless runs.
//!
//! This backend doesn't talk to a GPU. It hands out unique handles, keeps
//! texture contents in memory, and records every creation and release so
//! tests can check that each native resource is freed exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::handle::Handle;
use crate::types::{MeshDescriptor, ShaderDescriptor};

use super::{BackendCapabilities, NativeBackend, NativeTextureRequest};

/// Native calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DummyFailure {
    /// `create_device`
    Device,
    /// `create_texture`
    Texture,
    /// `create_shader`
    Shader,
    /// `create_mesh`
    Mesh,
    /// `build_mesh_geometry`
    MeshGeometry,
    /// `create_mesh_view`
    MeshView,
    /// `create_swap_chain`
    SwapChain,
}

#[derive(Debug)]
enum DummyObject {
    Texture {
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        data: Vec<u8>,
    },
    Shader,
    Mesh {
        vertex_count: usize,
        index_count: usize,
    },
    MeshView,
    SwapChain {
        presents: usize,
    },
}

#[derive(Debug, Default)]
struct DummyState {
    next_handle: u64,
    devices: HashSet<Handle>,
    objects: HashMap<Handle, DummyObject>,
    pending_failures: HashMap<DummyFailure, usize>,
    failed_adapters: HashSet<usize>,
    created: usize,
    released: Vec<Handle>,
    double_releases: usize,
    destroyed_devices: usize,
}

impl DummyState {
    fn allocate(&mut self) -> Handle {
        self.next_handle += 1;
        Handle(self.next_handle)
    }

    fn should_fail(&mut self, failure: DummyFailure) -> bool {
        match self.pending_failures.get_mut(&failure) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn insert(&mut self, object: DummyObject) -> Handle {
        let handle = self.allocate();
        self.objects.insert(handle, object);
        self.created += 1;
        handle
    }
}

#[derive(Debug, Default)]
struct ReleaseGate {
    held: bool,
    waiting: usize,
}

/// Dummy native backend.
#[derive(Debug)]
pub struct DummyBackend {
    adapter_count: usize,
    capabilities: BackendCapabilities,
    panic_on_release: AtomicBool,
    state: Mutex<DummyState>,
    release_gate: Mutex<ReleaseGate>,
    release_gate_changed: Condvar,
}

impl DummyBackend {
    /// Create a dummy backend with one adapter and default capabilities.
    pub fn new() -> Self {
        Self {
            adapter_count: 1,
            capabilities: BackendCapabilities::default(),
            panic_on_release: AtomicBool::new(false),
            state: Mutex::new(DummyState::default()),
            release_gate: Mutex::new(ReleaseGate::default()),
            release_gate_changed: Condvar::new(),
        }
    }

    /// Set the number of adapters.
    pub fn with_adapter_count(mut self, count: usize) -> Self {
        self.adapter_count = count;
        self
    }

    /// Set the capabilities reported for every device.
    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make the next `count` calls of the given kind fail.
    pub fn fail_next(&self, failure: DummyFailure, count: usize) {
        *self
            .state
            .lock()
            .pending_failures
            .entry(failure)
            .or_default() += count;
    }

    /// Make device creation always fail for an adapter.
    pub fn fail_adapter(&self, adapter: usize) {
        self.state.lock().failed_adapters.insert(adapter);
    }

    /// Make `release` panic after recording the release, simulating a driver fault.
    pub fn set_panic_on_release(&self, enabled: bool) {
        self.panic_on_release.store(enabled, Ordering::Release);
    }

    /// Block every `release` call until the gate is opened again.
    pub fn hold_releases(&self, held: bool) {
        self.release_gate.lock().held = held;
        self.release_gate_changed.notify_all();
    }

    /// Wait until some thread is blocked in `release` by [`hold_releases`](Self::hold_releases).
    pub fn wait_for_held_release(&self) {
        let mut gate = self.release_gate.lock();
        while gate.waiting == 0 {
            self.release_gate_changed.wait(&mut gate);
        }
    }

    /// Number of resources currently alive.
    pub fn live_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Returns true if the handle refers to a live resource.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    /// Number of resources created so far.
    pub fn created_count(&self) -> usize {
        self.state.lock().created
    }

    /// Number of successful releases so far.
    pub fn release_count(&self) -> usize {
        self.state.lock().released.len()
    }

    /// Handles released so far, in release order.
    pub fn released_handles(&self) -> Vec<Handle> {
        self.state.lock().released.clone()
    }

    /// Number of releases of handles that were not alive.
    pub fn double_release_count(&self) -> usize {
        self.state.lock().double_releases
    }

    /// Number of devices currently alive.
    pub fn device_count(&self) -> usize {
        self.state.lock().devices.len()
    }

    /// Number of devices destroyed so far.
    pub fn destroyed_device_count(&self) -> usize {
        self.state.lock().destroyed_devices
    }

    /// Number of times a swap chain was presented.
    pub fn present_count(&self, swap_chain: Handle) -> usize {
        match self.state.lock().objects.get(&swap_chain) {
            Some(DummyObject::SwapChain { presents }) => *presents,
            _ => 0,
        }
    }

    /// Vertex and index counts uploaded into a mesh.
    pub fn mesh_geometry(&self, mesh: Handle) -> Option<(usize, usize)> {
        match self.state.lock().objects.get(&mesh) {
            Some(DummyObject::Mesh {
                vertex_count,
                index_count,
            }) => Some((*vertex_count, *index_count)),
            _ => None,
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn adapter_count(&self) -> usize {
        self.adapter_count
    }

    fn create_device(&self, adapter: usize) -> Handle {
        let mut state = self.state.lock();
        if adapter >= self.adapter_count
            || state.failed_adapters.contains(&adapter)
            || state.should_fail(DummyFailure::Device)
        {
            log::trace!("DummyBackend: device creation failed for adapter {adapter}");
            return Handle::NULL;
        }
        let device = state.allocate();
        state.devices.insert(device);
        log::trace!("DummyBackend: created device {device} on adapter {adapter}");
        device
    }

    fn destroy_device(&self, device: Handle) {
        let mut state = self.state.lock();
        if state.devices.remove(&device) {
            state.destroyed_devices += 1;
        } else {
            log::warn!("DummyBackend: destroying unknown device {device}");
        }
    }

    fn capabilities(&self, _device: Handle) -> BackendCapabilities {
        self.capabilities
    }

    fn create_texture(&self, _device: Handle, request: &NativeTextureRequest) -> Handle {
        let mut state = self.state.lock();
        if state.should_fail(DummyFailure::Texture)
            || request.width > self.capabilities.max_texture_size
            || request.height > self.capabilities.max_texture_size
        {
            return Handle::NULL;
        }
        let bytes_per_pixel = request.format.bytes_per_pixel();
        let size = request.width as usize * request.height as usize * bytes_per_pixel as usize;
        let handle = state.insert(DummyObject::Texture {
            width: request.width,
            height: request.height,
            bytes_per_pixel,
            // Fresh allocations hold garbage until cleared.
            data: vec![0xCD; size],
        });
        log::trace!(
            "DummyBackend: created texture {handle} ({}x{})",
            request.width,
            request.height
        );
        handle
    }

    fn texture_size(&self, texture: Handle) -> (u32, u32) {
        match self.state.lock().objects.get(&texture) {
            Some(DummyObject::Texture { width, height, .. }) => (*width, *height),
            _ => (0, 0),
        }
    }

    fn update_texture(&self, _device: Handle, texture: Handle, data: &[u8]) -> bool {
        match self.state.lock().objects.get_mut(&texture) {
            Some(DummyObject::Texture {
                data: contents, ..
            }) if contents.len() == data.len() => {
                contents.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    fn clear_texture(&self, _device: Handle, texture: Handle) -> bool {
        match self.state.lock().objects.get_mut(&texture) {
            Some(DummyObject::Texture { data, .. }) => {
                data.fill(0);
                true
            }
            _ => false,
        }
    }

    fn read_texture(&self, _device: Handle, texture: Handle) -> Option<Vec<u8>> {
        match self.state.lock().objects.get(&texture) {
            Some(DummyObject::Texture {
                width,
                height,
                bytes_per_pixel,
                data,
            }) => {
                debug_assert_eq!(
                    data.len(),
                    *width as usize * *height as usize * *bytes_per_pixel as usize
                );
                Some(data.clone())
            }
            _ => None,
        }
    }

    fn create_shader(&self, _device: Handle, descriptor: &ShaderDescriptor) -> Handle {
        let mut state = self.state.lock();
        if state.should_fail(DummyFailure::Shader) || descriptor.bytecode.is_empty() {
            return Handle::NULL;
        }
        state.insert(DummyObject::Shader)
    }

    fn create_mesh(&self, _device: Handle) -> Handle {
        let mut state = self.state.lock();
        if state.should_fail(DummyFailure::Mesh) {
            return Handle::NULL;
        }
        state.insert(DummyObject::Mesh {
            vertex_count: 0,
            index_count: 0,
        })
    }

    fn build_mesh_geometry(
        &self,
        _device: Handle,
        mesh: Handle,
        descriptor: &MeshDescriptor,
    ) -> bool {
        let mut state = self.state.lock();
        if state.should_fail(DummyFailure::MeshGeometry) {
            return false;
        }
        match state.objects.get_mut(&mesh) {
            Some(DummyObject::Mesh {
                vertex_count,
                index_count,
            }) => {
                *vertex_count = descriptor.vertices.len();
                *index_count = descriptor.indices.len();
                true
            }
            _ => false,
        }
    }

    fn create_mesh_view(&self, _device: Handle, mesh: Handle) -> Handle {
        let mut state = self.state.lock();
        if state.should_fail(DummyFailure::MeshView) || !state.objects.contains_key(&mesh) {
            return Handle::NULL;
        }
        state.insert(DummyObject::MeshView)
    }

    fn create_swap_chain(&self, _device: Handle, window: u64, vsync: bool) -> Handle {
        let mut state = self.state.lock();
        if state.should_fail(DummyFailure::SwapChain) || window == 0 {
            return Handle::NULL;
        }
        log::trace!("DummyBackend: creating swap chain for window {window:#x} (vsync: {vsync})");
        state.insert(DummyObject::SwapChain { presents: 0 })
    }

    fn present(&self, _device: Handle, swap_chain: Handle) -> bool {
        match self.state.lock().objects.get_mut(&swap_chain) {
            Some(DummyObject::SwapChain { presents }) => {
                *presents += 1;
                true
            }
            _ => false,
        }
    }

    fn release(&self, _device: Handle, resource: Handle) {
        {
            let mut gate = self.release_gate.lock();
            gate.waiting += 1;
            self.release_gate_changed.notify_all();
            while gate.held {
                self.release_gate_changed.wait(&mut gate);
            }
            gate.waiting -= 1;
        }
        {
            let mut state = self.state.lock();
            if state.objects.remove(&resource).is_some() {
                state.released.push(resource);
                log::trace!("DummyBackend: released {resource}");
            } else {
                state.double_releases += 1;
                log::warn!("DummyBackend: release of dead handle {resource}");
            }
        }
        if self.panic_on_release.load(Ordering::Acquire) {
            panic!("DummyBackend: simulated driver fault releasing {resource}");
        }
    }
}
