//! wgpu surface backend for the tiered renderer.
//!
//! Implements the drawable-surface traits from `farview-render` on top of a
//! headless wgpu device. Painted regions land in an RGBA8 texture and a blit
//! pipeline composites that texture onto an offscreen render target. Hosts
//! with a window system can swap the target for a swapchain view without
//! touching the renderers.
//!
//! # Invariants
//! - Raster-tier acquisition blocks until the device and pipeline exist.
//! - Modern-tier acquisition returns immediately; negotiation runs on a
//!   named background thread and settles through the handshake.
//! - A released context submits nothing further to the queue.

mod gpu;
mod shaders;

pub use gpu::{WgpuSurface, WgpuSurfaceProvider};

pub fn crate_info() -> &'static str {
    "farview-render-wgpu v0.1.0"
}
