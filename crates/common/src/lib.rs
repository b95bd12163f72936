//! Shared types for the farview display pipeline.
//!
//! # Invariants
//! - A `RegionRect` that is applied anywhere has `width > 0` and `height > 0`.
//! - Pixel payloads are RGBA8: `len == width * height * 4`.

pub mod types;

pub use types::{
    BYTES_PER_PIXEL, CapabilitySet, RegionRect, RenderError, RenderResult, Tier, TierRequest,
};
