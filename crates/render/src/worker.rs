//! Worker-offload renderer.
//!
//! Moves per-pixel painting off the control thread: exclusive ownership of
//! the drawing surface transfers to a dedicated paint thread once, and all
//! further communication is message passing over a FIFO channel. Paints are
//! batched — `present` moves everything accumulated since the last present
//! as a single `Frames` message — so per-rect channel overhead never scales
//! with the rectangle count. Presentation may lag submission by worker
//! scheduling delay; that is the accepted trade-off for a free control
//! thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use farview_common::{RegionRect, RenderError, Tier};

use crate::blit;
use crate::renderer::{Renderer, TierUnavailable};
use crate::surface::Surface;
use crate::wire;

enum WorkerMsg {
    /// Ownership transfer; sent exactly once, before any other message.
    Init(Box<dyn Surface>),
    Resize { width: u32, height: u32 },
    /// One batch of wire-encoded rectangles per present.
    Frames(Vec<u8>),
    Shutdown,
}

/// Counters the control thread (or a diagnostics consumer) can read while
/// the worker owns the surface. Worker paint faults are not propagated back
/// as errors; they surface here and in the worker's log output.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub frames_messages: AtomicUsize,
    pub rects_painted: AtomicUsize,
    pub rects_rejected: AtomicUsize,
}

pub struct WorkerOffloadRenderer {
    tx: Option<mpsc::Sender<WorkerMsg>>,
    join: Option<JoinHandle<()>>,
    discard: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
    batch: Vec<u8>,
    batch_rects: usize,
    width: u32,
    height: u32,
    destroyed: bool,
}

impl std::fmt::Debug for WorkerOffloadRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOffloadRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl WorkerOffloadRenderer {
    pub fn new(mut surface: Box<dyn Surface>) -> Result<Self, TierUnavailable> {
        if surface.pixels().is_none() {
            return Err(TierUnavailable {
                error: RenderError::ContextUnavailable(Tier::WorkerOffload),
                surface,
            });
        }
        let (width, height) = (surface.width(), surface.height());

        let (tx, rx) = mpsc::channel();
        let discard = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(WorkerStats::default());
        let spawn = std::thread::Builder::new()
            .name("farview-paint-worker".into())
            .spawn({
                let discard = discard.clone();
                let stats = stats.clone();
                move || worker_loop(rx, discard, stats)
            });
        let join = match spawn {
            Ok(join) => join,
            Err(e) => {
                return Err(TierUnavailable {
                    error: RenderError::Worker(e.to_string()),
                    surface,
                });
            }
        };

        // After this send the control thread can no longer draw to the
        // surface directly.
        if tx.send(WorkerMsg::Init(surface)).is_err() {
            tracing::warn!("paint worker exited before surface handoff");
        }

        Ok(Self {
            tx: Some(tx),
            join: Some(join),
            discard,
            stats,
            batch: Vec::new(),
            batch_rects: 0,
            width,
            height,
            destroyed: false,
        })
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Rectangles accumulated since the last present.
    pub fn pending_rects(&self) -> usize {
        self.batch_rects
    }
}

impl Renderer for WorkerOffloadRenderer {
    fn tier(&self) -> Tier {
        Tier::WorkerOffload
    }

    fn paint_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        if self.destroyed {
            return;
        }
        if !blit::payload_matches(&rect, pixels) || !wire::encodable(&rect) {
            tracing::debug!(?rect, len = pixels.len(), "dropping malformed paint input");
            return;
        }
        wire::encode_into(&mut self.batch, rect, pixels);
        self.batch_rects += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.destroyed || (width == self.width && height == self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        if let Some(tx) = &self.tx {
            if tx.send(WorkerMsg::Resize { width, height }).is_err() {
                tracing::warn!("paint worker unavailable, dropping resize");
            }
        }
    }

    fn present(&mut self) {
        if self.destroyed || self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);
        let rects = std::mem::replace(&mut self.batch_rects, 0);
        if let Some(tx) = &self.tx {
            // The whole tick's rectangles move as one message.
            match tx.send(WorkerMsg::Frames(batch)) {
                Ok(()) => tracing::trace!(rects, "frame batch handed to paint worker"),
                Err(_) => tracing::warn!(rects, "paint worker unavailable, dropping frame batch"),
            }
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            tracing::debug!("worker renderer destroy called more than once");
            return;
        }
        self.destroyed = true;
        self.batch = Vec::new();
        self.batch_rects = 0;

        // Fire-and-forget teardown: anything still queued ahead of the
        // shutdown is discarded without acknowledgment.
        self.discard.store(true, Ordering::Release);
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(WorkerMsg::Shutdown);
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!("paint worker panicked during teardown");
            }
        }
    }
}

fn worker_loop(rx: mpsc::Receiver<WorkerMsg>, discard: Arc<AtomicBool>, stats: Arc<WorkerStats>) {
    let mut surface: Option<Box<dyn Surface>> = None;

    while let Ok(msg) = rx.recv() {
        if discard.load(Ordering::Acquire) {
            // Teardown in progress: drain without painting.
            if matches!(msg, WorkerMsg::Shutdown) {
                break;
            }
            continue;
        }
        match msg {
            WorkerMsg::Init(s) => {
                surface = Some(s);
            }
            WorkerMsg::Resize { width, height } => {
                if let Some(target) = surface.as_mut().and_then(|s| s.pixels()) {
                    target.resize(width, height);
                }
            }
            WorkerMsg::Frames(batch) => {
                stats.frames_messages.fetch_add(1, Ordering::Relaxed);
                let Some(target) = surface.as_mut().and_then(|s| s.pixels()) else {
                    tracing::warn!("frame batch before surface handoff");
                    continue;
                };
                for (rect, payload) in wire::BatchReader::new(&batch) {
                    // Same immediate-paint primitive as the software tier.
                    if target.write_region(rect, payload) {
                        stats.rects_painted.fetch_add(1, Ordering::Relaxed);
                    } else {
                        stats.rects_rejected.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(?rect, "paint worker rejected rectangle");
                    }
                }
            }
            WorkerMsg::Shutdown => break,
        }
    }
    tracing::debug!("paint worker exited");
}
