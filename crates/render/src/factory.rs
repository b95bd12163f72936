//! Renderer factory: tier resolution and fallback-chain construction.
//!
//! Consulted once per display session. Resolves the requested tier against
//! the capability probe, then walks a fallback chain, catching each
//! construction failure and handing the same target surface to the next
//! tier. Construction errors never reach the paint-path caller.

use farview_common::{CapabilitySet, RenderError, RenderResult, Tier, TierRequest};

use crate::gpu::{ModernGpuRenderer, RasterGpuRenderer};
use crate::probe;
use crate::renderer::{Renderer, TierUnavailable};
use crate::software::SoftwareRenderer;
use crate::surface::{Surface, SurfaceProvider};
use crate::worker::WorkerOffloadRenderer;

/// Resolve a request to a concrete tier. `Automatic` prefers
/// modern-GPU > raster-GPU > software and never selects worker offload,
/// which changes surface-ownership semantics and is explicit opt-in only.
pub fn resolve_tier(request: TierRequest, caps: &CapabilitySet) -> Tier {
    match request.explicit() {
        Some(tier) => tier,
        None => caps.highest_automatic(),
    }
}

/// The construction order attempted for a resolved tier. Software terminates
/// every chain; worker offload falls back only to software.
pub fn fallback_chain(tier: Tier) -> &'static [Tier] {
    match tier {
        Tier::ModernGpu => &[Tier::ModernGpu, Tier::RasterGpu, Tier::Software],
        Tier::RasterGpu => &[Tier::RasterGpu, Tier::Software],
        Tier::WorkerOffload => &[Tier::WorkerOffload, Tier::Software],
        Tier::Software => &[Tier::Software],
    }
}

/// Build a renderer for one display session, consulting the memoized
/// capability probe for automatic resolution.
pub fn create_renderer(
    request: TierRequest,
    provider: &dyn SurfaceProvider,
    surface: Box<dyn Surface>,
) -> RenderResult<Box<dyn Renderer>> {
    let caps = probe::probe(provider);
    create_with_capabilities(request, &caps, surface)
}

/// Chain construction against an explicit capability set.
pub fn create_with_capabilities(
    request: TierRequest,
    caps: &CapabilitySet,
    surface: Box<dyn Surface>,
) -> RenderResult<Box<dyn Renderer>> {
    let resolved = resolve_tier(request, caps);
    let mut surface = surface;
    let mut last_error = None;

    for &tier in fallback_chain(resolved) {
        match build_tier(tier, surface) {
            Ok(renderer) => {
                tracing::info!(requested = ?request, %tier, "renderer constructed");
                return Ok(renderer);
            }
            Err(TierUnavailable {
                surface: recovered,
                error,
            }) => {
                tracing::warn!(%tier, "tier construction failed, degrading: {error}");
                surface = recovered;
                last_error = Some(error);
            }
        }
    }

    // Even the baseline failed: a fatal host configuration problem, not a
    // paint-path condition.
    let detail = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "empty fallback chain".into());
    Err(RenderError::NoTierAvailable(detail))
}

fn build_tier(tier: Tier, surface: Box<dyn Surface>) -> Result<Box<dyn Renderer>, TierUnavailable> {
    match tier {
        Tier::Software => {
            SoftwareRenderer::new(surface).map(|r| Box::new(r) as Box<dyn Renderer>)
        }
        Tier::RasterGpu => {
            RasterGpuRenderer::new(surface).map(|r| Box::new(r) as Box<dyn Renderer>)
        }
        Tier::ModernGpu => {
            ModernGpuRenderer::new(surface).map(|r| Box::new(r) as Box<dyn Renderer>)
        }
        Tier::WorkerOffload => {
            WorkerOffloadRenderer::new(surface).map(|r| Box::new(r) as Box<dyn Renderer>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySurface;
    use farview_common::RegionRect;

    fn full_caps() -> CapabilitySet {
        CapabilitySet {
            software: true,
            raster_gpu: true,
            modern_gpu: true,
            worker_offload: true,
        }
    }

    fn baseline_caps() -> CapabilitySet {
        CapabilitySet {
            software: true,
            worker_offload: true,
            ..CapabilitySet::default()
        }
    }

    #[test]
    fn automatic_on_a_baseline_host_resolves_to_software() {
        let surface = MemorySurface::software_only(8, 8);
        let renderer =
            create_with_capabilities(TierRequest::Automatic, &baseline_caps(), Box::new(surface))
                .unwrap();
        assert_eq!(renderer.tier(), Tier::Software);
    }

    #[test]
    fn automatic_on_a_full_host_resolves_to_modern() {
        let surface = MemorySurface::new(8, 8);
        let renderer =
            create_with_capabilities(TierRequest::Automatic, &full_caps(), Box::new(surface))
                .unwrap();
        assert_eq!(renderer.tier(), Tier::ModernGpu);
    }

    #[test]
    fn automatic_never_selects_worker_offload() {
        assert_eq!(
            resolve_tier(TierRequest::Automatic, &baseline_caps()),
            Tier::Software
        );
        let caps = CapabilitySet {
            software: true,
            worker_offload: true,
            raster_gpu: true,
            modern_gpu: true,
        };
        assert_eq!(resolve_tier(TierRequest::Automatic, &caps), Tier::ModernGpu);
    }

    #[test]
    fn failing_higher_tier_falls_through_to_baseline() {
        // Surface refuses both GPU context types; the modern chain must
        // degrade to software without surfacing an error.
        let surface = MemorySurface::new(8, 8)
            .with_raster(false)
            .with_modern(false);
        let handle = surface.handle();
        let mut renderer =
            create_with_capabilities(TierRequest::ModernGpu, &full_caps(), Box::new(surface))
                .unwrap();
        assert_eq!(renderer.tier(), Tier::Software);

        // The surviving renderer paints on the same surface the failed
        // tiers handed back.
        let px = [8u8, 8, 8, 8];
        renderer.paint_region(RegionRect::new(2, 2, 1, 1), &px);
        renderer.present();
        assert_eq!(
            handle.read_region(RegionRect::new(2, 2, 1, 1)).unwrap(),
            px.to_vec()
        );
    }

    #[test]
    fn modern_chain_stops_at_raster_when_raster_works() {
        let surface = MemorySurface::new(8, 8).with_modern(false);
        let renderer =
            create_with_capabilities(TierRequest::ModernGpu, &full_caps(), Box::new(surface))
                .unwrap();
        assert_eq!(renderer.tier(), Tier::RasterGpu);
    }

    #[test]
    fn worker_chain_falls_back_only_to_software() {
        assert_eq!(
            fallback_chain(Tier::WorkerOffload),
            &[Tier::WorkerOffload, Tier::Software]
        );

        let surface = MemorySurface::software_only(8, 8);
        let mut renderer =
            create_with_capabilities(TierRequest::WorkerOffload, &full_caps(), Box::new(surface))
                .unwrap();
        assert_eq!(renderer.tier(), Tier::WorkerOffload);
        renderer.destroy();
    }

    #[test]
    fn explicit_request_overrides_automatic_preference() {
        let surface = MemorySurface::new(8, 8);
        let renderer =
            create_with_capabilities(TierRequest::RasterGpu, &full_caps(), Box::new(surface))
                .unwrap();
        assert_eq!(renderer.tier(), Tier::RasterGpu);
    }

    #[test]
    fn every_tier_failing_is_a_fatal_error() {
        let surface = MemorySurface::new(8, 8)
            .with_software(false)
            .with_raster(false)
            .with_modern(false);
        let err =
            create_with_capabilities(TierRequest::ModernGpu, &full_caps(), Box::new(surface))
                .unwrap_err();
        assert!(matches!(err, RenderError::NoTierAvailable(_)));
    }
}
