//! Drawable surface abstraction.
//!
//! The renderer backends never talk to a window system or GPU API directly;
//! they paint through these traits. A host supplies a [`Surface`] per display
//! session and a [`SurfaceProvider`] for the throwaway probe surface. The
//! traits are stable: swap in a wgpu implementation (or the in-memory
//! reference in [`crate::memory`]) without changing consumers.

use std::sync::mpsc;
use std::time::Duration;

use farview_common::{RegionRect, RenderError, RenderResult};

/// CPU-visible pixel store: the immediate-paint primitive shared by the
/// software renderer and the paint worker.
pub trait PixelTarget {
    fn size(&self) -> (u32, u32);

    /// Reallocate the store to the new dimensions. Prior contents are not
    /// preserved.
    fn resize(&mut self, width: u32, height: u32);

    /// Write an RGBA8 region at `(rect.x, rect.y)`. Returns `false` without
    /// touching the store when the rect/payload pair is malformed or does
    /// not fit.
    fn write_region(&mut self, rect: RegionRect, pixels: &[u8]) -> bool;

    /// Read a region back (diagnostics consumers and tests). `None` when the
    /// rect is malformed or out of bounds.
    fn read_region(&self, rect: RegionRect) -> Option<Vec<u8>>;
}

/// GPU texture context shared by the raster and modern tiers once ready.
pub trait TextureContext: Send {
    /// Partial upload of just the `rect` sub-rectangle into the backing
    /// texture. Never a full-texture reupload.
    fn write_region(&mut self, rect: RegionRect, pixels: &[u8]);

    /// Reallocate the backing texture and rebind it into the shader's
    /// resource binding.
    fn reallocate(&mut self, width: u32, height: u32);

    /// One fullscreen textured quad (Y-flipped to the surface coordinate
    /// convention) plus flush.
    fn draw(&mut self);

    /// Release the texture, pipeline, and device resources.
    fn release(&mut self);
}

/// Readiness signal for asynchronous device negotiation.
///
/// The negotiating side resolves through a [`ModernResolver`]; the modern-GPU
/// renderer polls from its state machine. No async runtime is involved: the
/// signal is a plain channel, resolvable from any thread.
pub struct ModernHandshake {
    rx: mpsc::Receiver<RenderResult<Box<dyn TextureContext>>>,
}

impl ModernHandshake {
    /// A handshake plus the resolver that will complete it.
    pub fn channel() -> (ModernResolver, ModernHandshake) {
        let (tx, rx) = mpsc::channel();
        (ModernResolver { tx }, ModernHandshake { rx })
    }

    /// A handshake that is already resolved (negotiation completed inline).
    pub fn resolved(ctx: Box<dyn TextureContext>) -> Self {
        let (resolver, handshake) = Self::channel();
        resolver.resolve(Ok(ctx));
        handshake
    }

    /// Non-blocking readiness check. `None` while negotiation is in flight.
    pub fn poll(&mut self) -> Option<RenderResult<Box<dyn TextureContext>>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(RenderError::Negotiation(
                "negotiation abandoned before completion".into(),
            ))),
        }
    }

    /// Bounded blocking wait, used by the capability probe. Consumes the
    /// handshake; on timeout the negotiating side releases the context when
    /// it eventually settles.
    pub fn wait_timeout(self, timeout: Duration) -> Option<RenderResult<Box<dyn TextureContext>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(RenderError::Negotiation(
                "negotiation abandoned before completion".into(),
            ))),
        }
    }
}

/// Completion side of a [`ModernHandshake`].
pub struct ModernResolver {
    tx: mpsc::Sender<RenderResult<Box<dyn TextureContext>>>,
}

impl ModernResolver {
    /// Deliver the negotiation outcome. If the renderer was destroyed before
    /// readiness the receiving side is gone; the freshly created context is
    /// released here so cancellation leaks nothing.
    pub fn resolve(self, result: RenderResult<Box<dyn TextureContext>>) {
        if let Err(mpsc::SendError(unclaimed)) = self.tx.send(result) {
            if let Ok(mut ctx) = unclaimed {
                tracing::debug!("releasing negotiated context: renderer destroyed before ready");
                ctx.release();
            }
        }
    }
}

/// A drawable surface handle for one display session.
///
/// `Send` because the worker-offload tier transfers exclusive ownership of
/// the surface to a background thread.
pub trait Surface: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// The CPU pixel path, when this surface has one.
    fn pixels(&mut self) -> Option<&mut dyn PixelTarget>;

    /// Synchronously initialize a raster-tier texture context: context
    /// acquisition, program compilation, quad vertex buffer, and the initial
    /// texture allocation all complete before this returns.
    fn acquire_raster(&mut self) -> RenderResult<Box<dyn TextureContext>>;

    /// Begin asynchronous modern-tier device negotiation.
    fn acquire_modern(&mut self) -> RenderResult<ModernHandshake>;
}

/// Creates surfaces; the capability probe uses it for its throwaway 1x1
/// surface.
pub trait SurfaceProvider {
    fn create_surface(&self, width: u32, height: u32) -> RenderResult<Box<dyn Surface>>;
}
