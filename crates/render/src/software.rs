//! Baseline software renderer.
//!
//! Paints straight through the surface's CPU pixel path: writes are visible
//! immediately and `present` has nothing to flush. The terminal link of
//! every fallback chain; construction fails only on a surface with no CPU
//! pixel path at all, which the factory treats as a fatal host
//! misconfiguration.

use farview_common::{RegionRect, RenderError, Tier};

use crate::blit;
use crate::renderer::{Renderer, TierUnavailable};
use crate::surface::Surface;

pub struct SoftwareRenderer {
    surface: Box<dyn Surface>,
    width: u32,
    height: u32,
    destroyed: bool,
}

impl std::fmt::Debug for SoftwareRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl SoftwareRenderer {
    pub fn new(mut surface: Box<dyn Surface>) -> Result<Self, TierUnavailable> {
        let (width, height) = (surface.width(), surface.height());
        if surface.pixels().is_none() {
            return Err(TierUnavailable {
                error: RenderError::ContextUnavailable(Tier::Software),
                surface,
            });
        }
        Ok(Self {
            surface,
            width,
            height,
            destroyed: false,
        })
    }
}

impl Renderer for SoftwareRenderer {
    fn tier(&self) -> Tier {
        Tier::Software
    }

    fn paint_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        if self.destroyed {
            return;
        }
        if !blit::payload_matches(&rect, pixels) {
            tracing::debug!(?rect, len = pixels.len(), "dropping malformed paint input");
            return;
        }
        // The pixel target copies the payload into its own store, so the
        // caller is free to reuse its buffer immediately.
        if let Some(target) = self.surface.pixels() {
            if !target.write_region(rect, pixels) {
                tracing::debug!(?rect, "dropping out-of-bounds paint input");
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.destroyed || (width == self.width && height == self.height) {
            return;
        }
        if let Some(target) = self.surface.pixels() {
            target.resize(width, height);
        }
        self.width = width;
        self.height = height;
        tracing::debug!(width, height, "software backing store reallocated");
    }

    fn present(&mut self) {
        // Writes are already visible; nothing to flush.
    }

    fn destroy(&mut self) {
        if self.destroyed {
            tracing::debug!("software renderer destroy called more than once");
            return;
        }
        self.destroyed = true;
    }
}
