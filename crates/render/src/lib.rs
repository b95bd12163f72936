//! Tiered dirty-rectangle painting for remotely-decoded video frames.
//!
//! A host loop submits zero-or-more dirty rectangles per frame tick through
//! [`Renderer::paint_region`], then calls [`Renderer::present`] exactly once.
//! The [`factory`] resolves a requested tier against the one-time capability
//! [`probe`] and builds a fallback chain down to the always-available
//! software backend.
//!
//! # Invariants
//! - Malformed paint input (zero dimension, wrong payload length) is a silent
//!   no-op; it never crashes or stalls the stream.
//! - N dirty rectangles per tick cost N partial uploads plus exactly one draw
//!   call on the GPU tiers, never N draw calls.
//! - A single control thread drives each renderer instance; only the
//!   worker-offload tier crosses a thread boundary, via surface ownership
//!   transfer.

pub mod blit;
pub mod factory;
pub mod gpu;
pub mod memory;
pub mod probe;
pub mod renderer;
pub mod software;
pub mod surface;
pub mod wire;
pub mod worker;

pub use factory::{create_renderer, create_with_capabilities, fallback_chain, resolve_tier};
pub use gpu::{ModernGpuRenderer, RasterGpuRenderer};
pub use memory::{MemoryModernGate, MemorySurface, MemorySurfaceHandle, MemorySurfaceProvider};
pub use probe::{probe, probe_detached};
pub use renderer::{Renderer, TierUnavailable};
pub use software::SoftwareRenderer;
pub use surface::{
    ModernHandshake, ModernResolver, PixelTarget, Surface, SurfaceProvider, TextureContext,
};
pub use worker::{WorkerOffloadRenderer, WorkerStats};

pub fn crate_info() -> &'static str {
    "farview-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
