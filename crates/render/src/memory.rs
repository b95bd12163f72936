//! In-memory reference surface.
//!
//! Backs the capability probe's throwaway surface, headless hosts, the CLI
//! demo, and the test suite. The pixel store sits behind an `Arc` so an
//! observer handle stays valid after the surface's ownership moves into a
//! renderer (or across the worker-offload thread boundary), and every
//! upload/draw/reallocation bumps an atomic counter so the per-frame
//! performance properties are directly observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use farview_common::{BYTES_PER_PIXEL, RegionRect, RenderError, RenderResult, Tier};

use crate::blit;
use crate::surface::{
    ModernHandshake, ModernResolver, PixelTarget, Surface, SurfaceProvider, TextureContext,
};

/// Instrumentation shared by a surface and its observer handle.
#[derive(Debug, Default)]
pub struct MemoryCounters {
    pub texture_uploads: AtomicUsize,
    pub draw_calls: AtomicUsize,
    pub texture_reallocs: AtomicUsize,
    pub store_reallocs: AtomicUsize,
    pub contexts_released: AtomicUsize,
}

#[derive(Debug)]
struct PixelStore {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelStore {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }
}

type SharedStore = Arc<Mutex<PixelStore>>;

fn lock(store: &SharedStore) -> MutexGuard<'_, PixelStore> {
    store.lock().expect("pixel store lock poisoned")
}

/// Observer for a [`MemorySurface`]'s visible pixels and counters. Stays
/// usable after the surface itself has been handed to a renderer.
#[derive(Clone)]
pub struct MemorySurfaceHandle {
    store: SharedStore,
    counters: Arc<MemoryCounters>,
}

impl MemorySurfaceHandle {
    pub fn size(&self) -> (u32, u32) {
        let store = lock(&self.store);
        (store.width, store.height)
    }

    /// Read back visible pixels. `None` when the rect is malformed or out of
    /// bounds.
    pub fn read_region(&self, rect: RegionRect) -> Option<Vec<u8>> {
        let store = lock(&self.store);
        blit::read_region(&store.data, store.width, store.height, rect)
    }

    pub fn counters(&self) -> &MemoryCounters {
        &self.counters
    }
}

/// CPU pixel path of a [`MemorySurface`].
pub struct MemoryPixelTarget {
    store: SharedStore,
    counters: Arc<MemoryCounters>,
}

impl PixelTarget for MemoryPixelTarget {
    fn size(&self) -> (u32, u32) {
        let store = lock(&self.store);
        (store.width, store.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        let mut store = lock(&self.store);
        *store = PixelStore::new(width, height);
        self.counters.store_reallocs.fetch_add(1, Ordering::Relaxed);
    }

    fn write_region(&mut self, rect: RegionRect, pixels: &[u8]) -> bool {
        let mut store = lock(&self.store);
        let (width, height) = (store.width, store.height);
        blit::copy_region(&mut store.data, width, height, rect, pixels)
    }

    fn read_region(&self, rect: RegionRect) -> Option<Vec<u8>> {
        let store = lock(&self.store);
        blit::read_region(&store.data, store.width, store.height, rect)
    }
}

/// Texture context emulated in memory: a private texture buffer, with `draw`
/// flushing the whole texture to the visible store.
struct MemoryTextureContext {
    texture: PixelStore,
    screen: SharedStore,
    counters: Arc<MemoryCounters>,
    released: bool,
}

impl MemoryTextureContext {
    fn new(width: u32, height: u32, screen: SharedStore, counters: Arc<MemoryCounters>) -> Self {
        Self {
            texture: PixelStore::new(width, height),
            screen,
            counters,
            released: false,
        }
    }
}

impl TextureContext for MemoryTextureContext {
    fn write_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        if self.released {
            return;
        }
        let (width, height) = (self.texture.width, self.texture.height);
        if blit::copy_region(&mut self.texture.data, width, height, rect, pixels) {
            self.counters.texture_uploads.fetch_add(1, Ordering::Relaxed);
        } else {
            tracing::debug!(?rect, "memory texture rejected upload");
        }
    }

    fn reallocate(&mut self, width: u32, height: u32) {
        if self.released {
            return;
        }
        self.texture = PixelStore::new(width, height);
        self.counters.texture_reallocs.fetch_add(1, Ordering::Relaxed);
    }

    fn draw(&mut self) {
        if self.released {
            return;
        }
        let mut screen = lock(&self.screen);
        screen.width = self.texture.width;
        screen.height = self.texture.height;
        screen.data.clear();
        screen.data.extend_from_slice(&self.texture.data);
        self.counters.draw_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&mut self) {
        if self.released {
            tracing::debug!("memory texture context released twice");
            return;
        }
        self.released = true;
        self.texture = PixelStore::new(0, 0);
        self.counters.contexts_released.fetch_add(1, Ordering::Relaxed);
    }
}

struct PendingModern {
    resolver: ModernResolver,
    ctx: Box<dyn TextureContext>,
}

type PendingQueue = Arc<Mutex<Vec<PendingModern>>>;

/// Control over deferred modern-tier negotiations, for tests and for hosts
/// that gate device readiness on an external event.
#[derive(Clone, Default)]
pub struct MemoryModernGate {
    pending: PendingQueue,
}

impl MemoryModernGate {
    /// Resolve every in-flight negotiation; returns how many were resolved.
    pub fn resolve_all(&self) -> usize {
        let drained: Vec<PendingModern> =
            self.pending.lock().expect("gate lock poisoned").drain(..).collect();
        let count = drained.len();
        for pending in drained {
            pending.resolver.resolve(Ok(pending.ctx));
        }
        count
    }

    /// Fail every in-flight negotiation; returns how many were failed.
    pub fn fail_all(&self, message: &str) -> usize {
        let drained: Vec<PendingModern> =
            self.pending.lock().expect("gate lock poisoned").drain(..).collect();
        let count = drained.len();
        for mut pending in drained {
            pending.ctx.release();
            pending
                .resolver
                .resolve(Err(RenderError::Negotiation(message.into())));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("gate lock poisoned").len()
    }
}

/// In-memory drawable surface with configurable tier support.
pub struct MemorySurface {
    target: MemoryPixelTarget,
    counters: Arc<MemoryCounters>,
    software: bool,
    raster: bool,
    modern: bool,
    defer_modern: bool,
    gate: MemoryModernGate,
}

impl MemorySurface {
    /// A surface supporting every tier, with modern negotiation completing
    /// inline.
    pub fn new(width: u32, height: u32) -> Self {
        let counters = Arc::new(MemoryCounters::default());
        Self {
            target: MemoryPixelTarget {
                store: Arc::new(Mutex::new(PixelStore::new(width, height))),
                counters: counters.clone(),
            },
            counters,
            software: true,
            raster: true,
            modern: true,
            defer_modern: false,
            gate: MemoryModernGate::default(),
        }
    }

    pub fn software_only(width: u32, height: u32) -> Self {
        let mut surface = Self::new(width, height);
        surface.raster = false;
        surface.modern = false;
        surface
    }

    pub fn with_software(mut self, supported: bool) -> Self {
        self.software = supported;
        self
    }

    pub fn with_raster(mut self, supported: bool) -> Self {
        self.raster = supported;
        self
    }

    pub fn with_modern(mut self, supported: bool) -> Self {
        self.modern = supported;
        self
    }

    /// Hold modern negotiations open until the [`MemoryModernGate`] releases
    /// them.
    pub fn with_deferred_modern(mut self) -> Self {
        self.defer_modern = true;
        self
    }

    fn with_gate(mut self, gate: MemoryModernGate) -> Self {
        self.gate = gate;
        self
    }

    /// Observer handle; remains valid after the surface moves into a
    /// renderer.
    pub fn handle(&self) -> MemorySurfaceHandle {
        MemorySurfaceHandle {
            store: self.target.store.clone(),
            counters: self.counters.clone(),
        }
    }

    pub fn modern_gate(&self) -> MemoryModernGate {
        self.gate.clone()
    }
}

impl Surface for MemorySurface {
    fn width(&self) -> u32 {
        lock(&self.target.store).width
    }

    fn height(&self) -> u32 {
        lock(&self.target.store).height
    }

    fn pixels(&mut self) -> Option<&mut dyn PixelTarget> {
        if self.software {
            Some(&mut self.target)
        } else {
            None
        }
    }

    fn acquire_raster(&mut self) -> RenderResult<Box<dyn TextureContext>> {
        if !self.raster {
            return Err(RenderError::ContextUnavailable(Tier::RasterGpu));
        }
        let (width, height) = {
            let store = lock(&self.target.store);
            (store.width, store.height)
        };
        Ok(Box::new(MemoryTextureContext::new(
            width,
            height,
            self.target.store.clone(),
            self.counters.clone(),
        )))
    }

    fn acquire_modern(&mut self) -> RenderResult<ModernHandshake> {
        if !self.modern {
            return Err(RenderError::ContextUnavailable(Tier::ModernGpu));
        }
        let (width, height) = {
            let store = lock(&self.target.store);
            (store.width, store.height)
        };
        let ctx: Box<dyn TextureContext> = Box::new(MemoryTextureContext::new(
            width,
            height,
            self.target.store.clone(),
            self.counters.clone(),
        ));
        if self.defer_modern {
            let (resolver, handshake) = ModernHandshake::channel();
            self.gate
                .pending
                .lock()
                .expect("gate lock poisoned")
                .push(PendingModern { resolver, ctx });
            Ok(handshake)
        } else {
            Ok(ModernHandshake::resolved(ctx))
        }
    }
}

/// Provider over [`MemorySurface`]; every surface it creates shares the same
/// tier configuration and modern gate.
pub struct MemorySurfaceProvider {
    software: bool,
    raster: bool,
    modern: bool,
    defer_modern: bool,
    gate: MemoryModernGate,
}

impl MemorySurfaceProvider {
    /// Full capability, inline modern negotiation.
    pub fn full() -> Self {
        Self {
            software: true,
            raster: true,
            modern: true,
            defer_modern: false,
            gate: MemoryModernGate::default(),
        }
    }

    /// Baseline-only host.
    pub fn software_only() -> Self {
        Self {
            software: true,
            raster: false,
            modern: false,
            defer_modern: false,
            gate: MemoryModernGate::default(),
        }
    }

    pub fn with_raster(mut self, supported: bool) -> Self {
        self.raster = supported;
        self
    }

    pub fn with_modern(mut self, supported: bool) -> Self {
        self.modern = supported;
        self
    }

    pub fn with_deferred_modern(mut self) -> Self {
        self.defer_modern = true;
        self
    }

    pub fn modern_gate(&self) -> MemoryModernGate {
        self.gate.clone()
    }
}

impl SurfaceProvider for MemorySurfaceProvider {
    fn create_surface(&self, width: u32, height: u32) -> RenderResult<Box<dyn Surface>> {
        let mut surface = MemorySurface::new(width, height)
            .with_software(self.software)
            .with_raster(self.raster)
            .with_modern(self.modern)
            .with_gate(self.gate.clone());
        if self.defer_modern {
            surface = surface.with_deferred_modern();
        }
        Ok(Box::new(surface))
    }
}
