//! One-time capability detection.
//!
//! Host capabilities are assumed not to change at runtime, so the probe runs
//! once per process against a throwaway 1x1 surface and the result is
//! memoized in an explicit singleton (`OnceLock`, defined first-use
//! initialization). Probing never panics: a tier that cannot be acquired is
//! simply reported unsupported.

use std::sync::OnceLock;
use std::time::Duration;

use farview_common::CapabilitySet;

use crate::surface::SurfaceProvider;

static CAPABILITIES: OnceLock<CapabilitySet> = OnceLock::new();

/// How long the probe waits for modern-tier device negotiation before
/// reporting the tier unsupported.
const MODERN_PROBE_WAIT: Duration = Duration::from_millis(1500);

/// The memoized capability set, probing on first use.
pub fn probe(provider: &dyn SurfaceProvider) -> CapabilitySet {
    *CAPABILITIES.get_or_init(|| {
        let caps = probe_detached(provider);
        tracing::info!(
            software = caps.software,
            raster_gpu = caps.raster_gpu,
            modern_gpu = caps.modern_gpu,
            worker_offload = caps.worker_offload,
            "capability probe complete"
        );
        caps
    })
}

/// Uncached probe, for diagnostics and tests. Production callers go through
/// [`probe`].
pub fn probe_detached(provider: &dyn SurfaceProvider) -> CapabilitySet {
    let mut surface = match provider.create_surface(1, 1) {
        Ok(surface) => surface,
        Err(e) => {
            tracing::error!("probe surface creation failed: {e}");
            return CapabilitySet::default();
        }
    };

    let software = surface.pixels().is_some();

    let raster_gpu = match surface.acquire_raster() {
        Ok(mut ctx) => {
            ctx.release();
            true
        }
        Err(e) => {
            tracing::debug!("raster-gpu probe: {e}");
            false
        }
    };

    let modern_gpu = match surface.acquire_modern() {
        Ok(handshake) => match handshake.wait_timeout(MODERN_PROBE_WAIT) {
            Some(Ok(mut ctx)) => {
                ctx.release();
                true
            }
            Some(Err(e)) => {
                tracing::debug!("modern-gpu probe: {e}");
                false
            }
            None => {
                tracing::debug!("modern-gpu probe timed out");
                false
            }
        },
        Err(e) => {
            tracing::debug!("modern-gpu probe: {e}");
            false
        }
    };

    // Worker offload needs the CPU pixel path plus an OS thread.
    let worker_offload = software && thread_spawn_works();

    CapabilitySet {
        software,
        raster_gpu,
        modern_gpu,
        worker_offload,
    }
}

fn thread_spawn_works() -> bool {
    std::thread::Builder::new()
        .name("farview-probe".into())
        .spawn(|| {})
        .map(|handle| handle.join().is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySurfaceProvider;

    #[test]
    fn full_provider_reports_every_tier() {
        let caps = probe_detached(&MemorySurfaceProvider::full());
        assert!(caps.software);
        assert!(caps.raster_gpu);
        assert!(caps.modern_gpu);
        assert!(caps.worker_offload);
    }

    #[test]
    fn baseline_provider_reports_software_and_worker_only() {
        let caps = probe_detached(&MemorySurfaceProvider::software_only());
        assert!(caps.software);
        assert!(!caps.raster_gpu);
        assert!(!caps.modern_gpu);
        assert!(caps.worker_offload);
    }

    #[test]
    fn memoized_probe_returns_the_same_set() {
        let provider = MemorySurfaceProvider::full();
        let first = probe(&provider);
        // A second call with a weaker provider still returns the cached set:
        // host capabilities do not change at runtime.
        let second = probe(&MemorySurfaceProvider::software_only());
        assert_eq!(first, second);
    }
}
