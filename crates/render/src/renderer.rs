//! The renderer contract every tier implements.

use farview_common::{RegionRect, RenderError, Tier};

use crate::surface::Surface;

/// One renderer instance per active display session, driven by a single
/// control thread: zero-or-more `paint_region` calls followed by exactly one
/// `present` per display tick.
pub trait Renderer {
    /// The tier that was actually constructed (may differ from the request
    /// after fallback). Read by diagnostics consumers.
    fn tier(&self) -> Tier;

    /// Write `pixels` into the backing store at the rect's origin. Input not
    /// satisfying the rect/payload invariants is a silent no-op: no panic,
    /// no state change. Does not touch the screen.
    fn paint_region(&mut self, rect: RegionRect, pixels: &[u8]);

    /// Change the logical surface dimensions. A no-op when the dimensions
    /// are unchanged, so hosts can call it freely without triggering GPU
    /// reallocation. Not reentrant with an in-flight paint/present sequence;
    /// call between frame ticks.
    fn resize(&mut self, width: u32, height: u32);

    /// Make all writes since the last `present` visible. A cheap no-op when
    /// nothing is pending.
    fn present(&mut self);

    /// Release all backend resources deterministically. Safe to call exactly
    /// once; further calls (and any call after it) are no-ops.
    fn destroy(&mut self);
}

impl std::fmt::Debug for dyn Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("tier", &self.tier())
            .finish_non_exhaustive()
    }
}

/// Construction failure for one tier.
///
/// Hands the target surface back so the factory can attempt the next tier of
/// the fallback chain on the same surface.
pub struct TierUnavailable {
    pub surface: Box<dyn Surface>,
    pub error: RenderError,
}

impl std::fmt::Debug for TierUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierUnavailable")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
