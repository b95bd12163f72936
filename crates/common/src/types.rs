use serde::{Deserialize, Serialize};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A sub-region of the display surface, in pixels.
///
/// The renderer never clips: callers are responsible for keeping rectangles
/// within surface bounds. A rect is only ever applied when it is well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rect may only be applied when both dimensions are non-zero.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Expected RGBA8 payload length for this rect.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Whether the rect lies entirely inside a `surface_width` x `surface_height` store.
    pub fn fits_within(&self, surface_width: u32, surface_height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= surface_width as u64 && bottom <= surface_height as u64
    }
}

/// A ranked renderer implementation, plus the orthogonal worker-offload option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Software,
    RasterGpu,
    ModernGpu,
    WorkerOffload,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Software => "software",
            Tier::RasterGpu => "raster-gpu",
            Tier::ModernGpu => "modern-gpu",
            Tier::WorkerOffload => "worker-offload",
        };
        f.write_str(name)
    }
}

/// What the host's settings layer asked for.
///
/// `Automatic` resolves to the highest probed tier; worker offload changes
/// surface-ownership semantics and is explicit opt-in only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TierRequest {
    #[default]
    Automatic,
    Software,
    RasterGpu,
    ModernGpu,
    WorkerOffload,
}

impl TierRequest {
    /// The explicitly requested tier, or `None` for automatic resolution.
    pub fn explicit(&self) -> Option<Tier> {
        match self {
            TierRequest::Automatic => None,
            TierRequest::Software => Some(Tier::Software),
            TierRequest::RasterGpu => Some(Tier::RasterGpu),
            TierRequest::ModernGpu => Some(Tier::ModernGpu),
            TierRequest::WorkerOffload => Some(Tier::WorkerOffload),
        }
    }
}

/// Which tiers the current host can drive, determined once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub software: bool,
    pub raster_gpu: bool,
    pub modern_gpu: bool,
    pub worker_offload: bool,
}

impl CapabilitySet {
    pub fn supports(&self, tier: Tier) -> bool {
        match tier {
            Tier::Software => self.software,
            Tier::RasterGpu => self.raster_gpu,
            Tier::ModernGpu => self.modern_gpu,
            Tier::WorkerOffload => self.worker_offload,
        }
    }

    /// Highest tier eligible for automatic resolution: modern > raster > software.
    /// Worker offload is never auto-selected.
    pub fn highest_automatic(&self) -> Tier {
        if self.modern_gpu {
            Tier::ModernGpu
        } else if self.raster_gpu {
            Tier::RasterGpu
        } else {
            Tier::Software
        }
    }
}

/// Errors from surface acquisition and renderer construction.
///
/// Nothing on the per-frame paint path returns these: malformed paint input
/// is silently dropped so a corrupt rectangle can never stall the stream.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("surface has no {0} context")]
    ContextUnavailable(Tier),
    #[error("device negotiation failed: {0}")]
    Negotiation(String),
    #[error("backend initialization failed: {0}")]
    Init(String),
    #[error("worker thread unavailable: {0}")]
    Worker(String),
    #[error("no renderer tier could be constructed: {0}")]
    NoTierAvailable(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_well_formed_requires_both_dimensions() {
        assert!(RegionRect::new(0, 0, 1, 1).is_well_formed());
        assert!(!RegionRect::new(0, 0, 0, 1).is_well_formed());
        assert!(!RegionRect::new(0, 0, 1, 0).is_well_formed());
    }

    #[test]
    fn rect_byte_len_is_rgba8() {
        assert_eq!(RegionRect::new(0, 0, 10, 10).byte_len(), 400);
        assert_eq!(RegionRect::new(5, 7, 2, 3).byte_len(), 24);
    }

    #[test]
    fn rect_fits_within_does_not_overflow() {
        let r = RegionRect::new(u32::MAX, u32::MAX, u32::MAX, u32::MAX);
        assert!(!r.fits_within(800, 600));
        assert!(RegionRect::new(798, 598, 2, 2).fits_within(800, 600));
        assert!(!RegionRect::new(799, 598, 2, 2).fits_within(800, 600));
    }

    #[test]
    fn automatic_resolution_prefers_modern_over_raster() {
        let caps = CapabilitySet {
            software: true,
            raster_gpu: true,
            modern_gpu: true,
            worker_offload: true,
        };
        assert_eq!(caps.highest_automatic(), Tier::ModernGpu);

        let raster_only = CapabilitySet {
            software: true,
            raster_gpu: true,
            ..CapabilitySet::default()
        };
        assert_eq!(raster_only.highest_automatic(), Tier::RasterGpu);
    }

    #[test]
    fn automatic_resolution_never_picks_worker_offload() {
        let caps = CapabilitySet {
            software: true,
            worker_offload: true,
            ..CapabilitySet::default()
        };
        assert_eq!(caps.highest_automatic(), Tier::Software);
    }

    #[test]
    fn tier_request_deserializes_kebab_case() {
        use serde::Deserialize;
        use serde::de::value::{Error, StrDeserializer};

        let req = TierRequest::deserialize(StrDeserializer::<Error>::new("modern-gpu")).unwrap();
        assert_eq!(req, TierRequest::ModernGpu);
        let req = TierRequest::deserialize(StrDeserializer::<Error>::new("automatic")).unwrap();
        assert_eq!(req, TierRequest::Automatic);
    }
}
