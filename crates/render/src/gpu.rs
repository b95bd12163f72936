//! GPU texture renderers: the synchronously-initialized raster tier and the
//! asynchronously-initialized modern tier.
//!
//! Both share one algorithm once ready: `paint_region` is a partial texture
//! upload of just the dirty sub-rectangle (never a full reupload) that marks
//! the frame dirty, and `present` issues exactly one fullscreen-quad draw
//! regardless of how many paints preceded it. The modern tier adds a
//! readiness state machine: calls arriving during device negotiation are
//! queued FIFO and replayed, in original order, exactly once.

use std::collections::VecDeque;

use farview_common::{RegionRect, Tier};

use crate::blit;
use crate::renderer::{Renderer, TierUnavailable};
use crate::surface::{ModernHandshake, Surface, TextureContext};

/// The shared once-ready core: backing texture, logical dimensions, and the
/// dirty flag that gates the single draw per present.
struct TextureSession {
    ctx: Box<dyn TextureContext>,
    width: u32,
    height: u32,
    dirty: bool,
}

impl TextureSession {
    fn new(ctx: Box<dyn TextureContext>, width: u32, height: u32) -> Self {
        Self {
            ctx,
            width,
            height,
            dirty: false,
        }
    }

    fn paint_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        if !blit::payload_matches(&rect, pixels) {
            tracing::debug!(?rect, len = pixels.len(), "dropping malformed paint input");
            return;
        }
        if !rect.fits_within(self.width, self.height) {
            tracing::debug!(?rect, "dropping out-of-bounds paint input");
            return;
        }
        self.ctx.write_region(rect, pixels);
        self.dirty = true;
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.ctx.reallocate(width, height);
        self.width = width;
        self.height = height;
        tracing::debug!(width, height, "backing texture reallocated");
    }

    fn present(&mut self) {
        if !self.dirty {
            return;
        }
        self.ctx.draw();
        self.dirty = false;
    }

    fn release(&mut self) {
        self.ctx.release();
    }
}

/// Raster-tier renderer. Context acquisition, program compilation, the quad
/// vertex buffer, and the initial texture allocation all complete inside
/// `new`; the instance starts ready.
pub struct RasterGpuRenderer {
    // Keeps the target surface alive for the session.
    _surface: Box<dyn Surface>,
    session: Option<TextureSession>,
}

impl std::fmt::Debug for RasterGpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterGpuRenderer").finish_non_exhaustive()
    }
}

impl RasterGpuRenderer {
    pub fn new(mut surface: Box<dyn Surface>) -> Result<Self, TierUnavailable> {
        let (width, height) = (surface.width(), surface.height());
        match surface.acquire_raster() {
            Ok(ctx) => Ok(Self {
                _surface: surface,
                session: Some(TextureSession::new(ctx, width, height)),
            }),
            Err(error) => Err(TierUnavailable { surface, error }),
        }
    }
}

impl Renderer for RasterGpuRenderer {
    fn tier(&self) -> Tier {
        Tier::RasterGpu
    }

    fn paint_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        if let Some(session) = &mut self.session {
            session.paint_region(rect, pixels);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(session) = &mut self.session {
            session.resize(width, height);
        }
    }

    fn present(&mut self) {
        if let Some(session) = &mut self.session {
            session.present();
        }
    }

    fn destroy(&mut self) {
        match self.session.take() {
            Some(mut session) => session.release(),
            None => tracing::debug!("raster renderer destroy called more than once"),
        }
    }
}

/// A call that arrived before the modern tier reached readiness. Pixels are
/// copied at enqueue time because the caller may reuse its buffer.
enum DeferredCall {
    Paint { rect: RegionRect, pixels: Vec<u8> },
    Resize { width: u32, height: u32 },
}

enum ModernState {
    Initializing {
        handshake: ModernHandshake,
        queue: VecDeque<DeferredCall>,
    },
    Ready(TextureSession),
    /// Negotiation failed after construction. The factory has already
    /// returned, so there is no tier to fall back to; every further call is
    /// a no-op.
    Failed,
    Destroyed,
}

/// Modern-tier renderer. Device negotiation is awaited asynchronously: the
/// constructor returns with the instance in `Initializing`, and the state
/// machine pumps the readiness signal on every call.
pub struct ModernGpuRenderer {
    // Keeps the target surface alive for the session.
    _surface: Box<dyn Surface>,
    width: u32,
    height: u32,
    state: ModernState,
}

impl ModernGpuRenderer {
    pub fn new(mut surface: Box<dyn Surface>) -> Result<Self, TierUnavailable> {
        let (width, height) = (surface.width(), surface.height());
        match surface.acquire_modern() {
            Ok(handshake) => Ok(Self {
                _surface: surface,
                width,
                height,
                state: ModernState::Initializing {
                    handshake,
                    queue: VecDeque::new(),
                },
            }),
            Err(error) => Err(TierUnavailable { surface, error }),
        }
    }

    /// Check the readiness signal; on readiness, replay every deferred call
    /// in its original submission order, exactly once.
    fn pump(&mut self) {
        let resolved = match &mut self.state {
            ModernState::Initializing { handshake, .. } => handshake.poll(),
            _ => return,
        };
        let Some(result) = resolved else {
            return;
        };

        let queue = match std::mem::replace(&mut self.state, ModernState::Failed) {
            ModernState::Initializing { queue, .. } => queue,
            other => {
                self.state = other;
                return;
            }
        };

        match result {
            Ok(ctx) => {
                tracing::info!(
                    deferred = queue.len(),
                    "modern-gpu device ready, replaying deferred calls"
                );
                let mut session = TextureSession::new(ctx, self.width, self.height);
                for call in queue {
                    match call {
                        DeferredCall::Paint { rect, pixels } => {
                            session.paint_region(rect, &pixels);
                        }
                        DeferredCall::Resize { width, height } => {
                            session.resize(width, height);
                        }
                    }
                }
                self.state = ModernState::Ready(session);
            }
            Err(error) => {
                tracing::error!("modern-gpu device negotiation failed: {error}");
                // state is already Failed; the queue is dropped.
            }
        }
    }
}

impl Renderer for ModernGpuRenderer {
    fn tier(&self) -> Tier {
        Tier::ModernGpu
    }

    fn paint_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        self.pump();
        match &mut self.state {
            ModernState::Initializing { queue, .. } => {
                if !blit::payload_matches(&rect, pixels) {
                    tracing::debug!(?rect, len = pixels.len(), "dropping malformed paint input");
                    return;
                }
                queue.push_back(DeferredCall::Paint {
                    rect,
                    pixels: pixels.to_vec(),
                });
            }
            ModernState::Ready(session) => session.paint_region(rect, pixels),
            ModernState::Failed | ModernState::Destroyed => {}
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.pump();
        match &mut self.state {
            ModernState::Initializing { queue, .. } => {
                // Replayed in order at readiness, so of two resizes queued
                // during negotiation the later one wins.
                queue.push_back(DeferredCall::Resize { width, height });
            }
            ModernState::Ready(session) => session.resize(width, height),
            ModernState::Failed | ModernState::Destroyed => {}
        }
    }

    fn present(&mut self) {
        self.pump();
        match &mut self.state {
            ModernState::Ready(session) => session.present(),
            // Nothing is visible before readiness; deferred paints are drawn
            // by the first present after the replay.
            ModernState::Initializing { .. } => {}
            ModernState::Failed | ModernState::Destroyed => {}
        }
    }

    fn destroy(&mut self) {
        self.pump();
        match std::mem::replace(&mut self.state, ModernState::Destroyed) {
            ModernState::Initializing { handshake, queue } => {
                // Cancel: dropping the handshake makes the negotiating side
                // release the context once initialization settles.
                tracing::debug!(
                    deferred = queue.len(),
                    "modern-gpu destroyed before negotiation completed"
                );
                drop(handshake);
            }
            ModernState::Ready(mut session) => session.release(),
            ModernState::Failed => {}
            ModernState::Destroyed => {
                tracing::debug!("modern renderer destroy called more than once");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySurface;
    use std::sync::atomic::Ordering;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((w * h) as usize)
    }

    #[test]
    fn raster_paints_are_invisible_until_present() {
        let surface = MemorySurface::new(8, 8);
        let handle = surface.handle();
        let mut renderer = RasterGpuRenderer::new(Box::new(surface)).unwrap();

        let px = solid(2, 2, [255, 0, 0, 255]);
        renderer.paint_region(RegionRect::new(1, 1, 2, 2), &px);
        assert_eq!(
            handle.read_region(RegionRect::new(1, 1, 2, 2)).unwrap(),
            vec![0; 16]
        );

        renderer.present();
        assert_eq!(handle.read_region(RegionRect::new(1, 1, 2, 2)).unwrap(), px);
    }

    #[test]
    fn many_paints_cost_exactly_one_draw_call() {
        let surface = MemorySurface::new(16, 16);
        let handle = surface.handle();
        let mut renderer = RasterGpuRenderer::new(Box::new(surface)).unwrap();

        let px = solid(1, 1, [7, 7, 7, 7]);
        for i in 0..10 {
            renderer.paint_region(RegionRect::new(i, i, 1, 1), &px);
        }
        renderer.present();

        let counters = handle.counters();
        assert_eq!(counters.texture_uploads.load(Ordering::Relaxed), 10);
        assert_eq!(counters.draw_calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn present_with_nothing_pending_is_a_no_op() {
        let surface = MemorySurface::new(4, 4);
        let handle = surface.handle();
        let mut renderer = RasterGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.present();
        renderer.paint_region(RegionRect::new(0, 0, 1, 1), &solid(1, 1, [1, 1, 1, 1]));
        renderer.present();
        renderer.present();

        assert_eq!(handle.counters().draw_calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn resize_with_equal_dimensions_skips_reallocation() {
        let surface = MemorySurface::new(8, 8);
        let handle = surface.handle();
        let mut renderer = RasterGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.resize(8, 8);
        assert_eq!(handle.counters().texture_reallocs.load(Ordering::Relaxed), 0);
        renderer.resize(4, 4);
        renderer.resize(4, 4);
        assert_eq!(handle.counters().texture_reallocs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn raster_destroy_releases_the_context_once() {
        let surface = MemorySurface::new(4, 4);
        let handle = surface.handle();
        let mut renderer = RasterGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.destroy();
        renderer.destroy();
        assert_eq!(
            handle.counters().contexts_released.load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn raster_construction_failure_hands_the_surface_back() {
        let surface = MemorySurface::new(4, 4).with_raster(false);
        let err = RasterGpuRenderer::new(Box::new(surface)).unwrap_err();
        assert_eq!(err.surface.width(), 4);
    }

    #[test]
    fn modern_defers_paints_and_replays_in_order() {
        let surface = MemorySurface::new(8, 8).with_deferred_modern();
        let gate = surface.modern_gate();
        let handle = surface.handle();
        let mut renderer = ModernGpuRenderer::new(Box::new(surface)).unwrap();

        // Overlapping writes: replay order is observable in the result.
        let first = solid(2, 2, [10, 10, 10, 10]);
        let second = solid(2, 2, [20, 20, 20, 20]);
        renderer.paint_region(RegionRect::new(0, 0, 2, 2), &first);
        renderer.paint_region(RegionRect::new(1, 1, 2, 2), &second);
        renderer.present();

        // Still negotiating: nothing painted, nothing drawn.
        assert_eq!(handle.counters().texture_uploads.load(Ordering::Relaxed), 0);

        assert_eq!(gate.resolve_all(), 1);
        renderer.present();

        let counters = handle.counters();
        assert_eq!(counters.texture_uploads.load(Ordering::Relaxed), 2);
        assert_eq!(counters.draw_calls.load(Ordering::Relaxed), 1);
        // (1,1) was painted by the second write; (0,0) by the first.
        assert_eq!(
            handle.read_region(RegionRect::new(1, 1, 1, 1)).unwrap(),
            vec![20, 20, 20, 20]
        );
        assert_eq!(
            handle.read_region(RegionRect::new(0, 0, 1, 1)).unwrap(),
            vec![10, 10, 10, 10]
        );
    }

    #[test]
    fn modern_replays_exactly_once() {
        let surface = MemorySurface::new(4, 4).with_deferred_modern();
        let gate = surface.modern_gate();
        let handle = surface.handle();
        let mut renderer = ModernGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.paint_region(RegionRect::new(0, 0, 1, 1), &solid(1, 1, [1, 1, 1, 1]));
        gate.resolve_all();

        // Several pumps after readiness must not duplicate the deferred call.
        renderer.present();
        renderer.present();
        renderer.resize(4, 4);
        assert_eq!(handle.counters().texture_uploads.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn modern_queued_resizes_last_write_wins() {
        let surface = MemorySurface::new(8, 8).with_deferred_modern();
        let gate = surface.modern_gate();
        let handle = surface.handle();
        let mut renderer = ModernGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.resize(2, 2);
        renderer.resize(6, 6);
        gate.resolve_all();
        renderer.paint_region(RegionRect::new(5, 5, 1, 1), &solid(1, 1, [3, 3, 3, 3]));
        renderer.present();

        assert_eq!(handle.size(), (6, 6));
        assert_eq!(
            handle.read_region(RegionRect::new(5, 5, 1, 1)).unwrap(),
            vec![3, 3, 3, 3]
        );
    }

    #[test]
    fn modern_destroy_before_ready_cancels_cleanly() {
        let surface = MemorySurface::new(4, 4).with_deferred_modern();
        let gate = surface.modern_gate();
        let handle = surface.handle();
        let mut renderer = ModernGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.paint_region(RegionRect::new(0, 0, 1, 1), &solid(1, 1, [1, 1, 1, 1]));
        renderer.destroy();

        // Negotiation settles after destroy; the context must be released.
        gate.resolve_all();
        assert_eq!(
            handle.counters().contexts_released.load(Ordering::Relaxed),
            1
        );
        assert_eq!(handle.counters().texture_uploads.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn modern_negotiation_failure_disables_the_renderer() {
        let surface = MemorySurface::new(4, 4).with_deferred_modern();
        let gate = surface.modern_gate();
        let handle = surface.handle();
        let mut renderer = ModernGpuRenderer::new(Box::new(surface)).unwrap();

        renderer.paint_region(RegionRect::new(0, 0, 1, 1), &solid(1, 1, [1, 1, 1, 1]));
        gate.fail_all("adapter lost");

        renderer.paint_region(RegionRect::new(0, 0, 1, 1), &solid(1, 1, [2, 2, 2, 2]));
        renderer.present();
        renderer.destroy();

        assert_eq!(handle.counters().texture_uploads.load(Ordering::Relaxed), 0);
        assert_eq!(handle.counters().draw_calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn modern_inline_negotiation_behaves_like_raster() {
        let surface = MemorySurface::new(8, 8);
        let handle = surface.handle();
        let mut renderer = ModernGpuRenderer::new(Box::new(surface)).unwrap();

        let px = solid(2, 2, [200, 100, 50, 255]);
        renderer.paint_region(RegionRect::new(3, 3, 2, 2), &px);
        renderer.present();

        assert_eq!(handle.read_region(RegionRect::new(3, 3, 2, 2)).unwrap(), px);
        assert_eq!(renderer.tier(), Tier::ModernGpu);
        renderer.destroy();
        assert_eq!(
            handle.counters().contexts_released.load(Ordering::Relaxed),
            1
        );
    }
}
