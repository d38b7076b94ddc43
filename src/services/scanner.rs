use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::config::{MatchMode, SessionConfig};
use crate::core::candidate::{CandidateFile, FileRef};
use crate::core::cluster::StreamClusterer;
use crate::core::fingerprint::{GeometryError, IconGeometry, ICON_DIM};
use crate::core::similarity::Comparator;
use crate::services::extractor::{ExtractError, FingerprintExtractor};
use crate::source::{FileHandle, FileSource};

/// Minimum spacing between coalesced progress snapshots (~60 Hz).
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Ready,
    Initializing,
    Running,
    Paused,
    Ended,
}

/// Point-in-time view of a session for external observers.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSnapshot {
    pub status: SearchStatus,
    /// Files seen during enumeration, before any filtering.
    pub enumerated: usize,
    /// Files that survived validity and mode-specific filtering.
    pub candidates: usize,
    /// Candidates fingerprinted so far, including failures.
    pub processed: usize,
    pub errors: usize,
    pub clusters: Vec<Vec<FileRef>>,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid session configuration: {0}")]
    Config(#[from] GeometryError),

    #[error("anchor file unusable: {0}")]
    Anchor(#[source] ExtractError),

    #[error("scan cancelled")]
    Cancelled,
}

/// Clonable handle for steering a running scan. Pause takes effect at
/// the next candidate boundary, never mid-fingerprint; cancel abandons
/// the whole session.
#[derive(Debug, Clone)]
pub struct ScanController {
    paused: Arc<watch::Sender<bool>>,
    cancelled: Arc<AtomicBool>,
}

impl ScanController {
    pub fn pause(&self) {
        let _ = self.paused.send(true);
    }

    pub fn resume(&self) {
        let _ = self.paused.send(false);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        // Nudge the gate so a paused scan observes the flag promptly.
        let _ = self.paused.send(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Runs one scan session: enumerate, filter, fingerprint, cluster.
/// Strictly sequential over candidates; the session state lives inside
/// `run` and is discarded wholesale on cancellation.
pub struct ScanService {
    config: SessionConfig,
    controller: ScanController,
    pause_rx: watch::Receiver<bool>,
    progress_tx: Option<mpsc::UnboundedSender<ScanSnapshot>>,
}

impl ScanService {
    pub fn new(config: SessionConfig) -> Result<Self, ScanError> {
        // Geometry problems must surface at startup, not mid-scan.
        IconGeometry::new(ICON_DIM)?;
        let (paused_tx, pause_rx) = watch::channel(false);
        Ok(Self {
            config,
            controller: ScanController {
                paused: Arc::new(paused_tx),
                cancelled: Arc::new(AtomicBool::new(false)),
            },
            pause_rx,
            progress_tx: None,
        })
    }

    pub fn with_progress_sender(mut self, sender: mpsc::UnboundedSender<ScanSnapshot>) -> Self {
        self.progress_tx = Some(sender);
        self
    }

    pub fn controller(&self) -> ScanController {
        self.controller.clone()
    }

    /// Drive the session to completion. Returns the final snapshot
    /// (status `ended`), which is also flushed to the progress channel
    /// exactly once.
    pub async fn run<S: FileSource>(mut self, source: S) -> Result<ScanSnapshot, ScanError> {
        let comparator = Comparator::for_mode(self.config.mode);
        let mut extractor = FingerprintExtractor::new(&self.config)?;
        let mut emitter = ProgressEmitter::new(self.progress_tx.take());

        // ---- initializing: enumeration plus validity filtering.
        let mut enumerated = 0usize;
        let mut files: Vec<CandidateFile> = Vec::new();
        emitter.send(empty_snapshot(SearchStatus::Initializing));

        let mut batches = source.batches();
        while let Some(batch) = batches.recv().await {
            if self.controller.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            enumerated += batch.len();
            for handle in batch {
                let candidate = CandidateFile::new(handle, self.config.max_file_size);
                if candidate.valid {
                    files.push(candidate);
                }
            }
            if emitter.should_emit(false) {
                emitter.send(ScanSnapshot {
                    status: SearchStatus::Initializing,
                    enumerated,
                    candidates: 0,
                    processed: 0,
                    errors: 0,
                    clusters: Vec::new(),
                });
            }
        }
        log::info!("enumerated {} files, {} valid", enumerated, files.len());

        // ---- candidate selection and anchor fingerprinting.
        let anchor = match &self.config.anchor {
            Some(path) => {
                let handle = FileHandle::from_path(path)
                    .map_err(|e| ScanError::Anchor(ExtractError::Read(e)))?;
                let mut anchor = CandidateFile::new(handle, u64::MAX);
                extractor
                    .extract(&mut anchor)
                    .await
                    .map_err(ScanError::Anchor)?;
                Some(anchor)
            }
            None => None,
        };

        let order = select_candidates(&files, &self.config, anchor.as_ref());
        let candidates = order.len();
        log::info!("{} candidate files", candidates);

        let mut clusterer = match anchor {
            Some(anchor) => StreamClusterer::with_anchor(comparator, anchor),
            None => StreamClusterer::new(comparator),
        };

        // ---- running: one candidate in flight at a time.
        let mut processed = 0usize;
        let mut errors = 0usize;
        emitter.send(snapshot(
            SearchStatus::Running,
            enumerated,
            candidates,
            processed,
            errors,
            &clusterer,
            &files,
        ));

        for idx in order {
            // Candidate boundary: the only points where pause and
            // cancellation take effect.
            if self.controller.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            if *self.pause_rx.borrow() {
                emitter.send(snapshot(
                    SearchStatus::Paused,
                    enumerated,
                    candidates,
                    processed,
                    errors,
                    &clusterer,
                    &files,
                ));
                while *self.pause_rx.borrow() {
                    if self.controller.is_cancelled() {
                        return Err(ScanError::Cancelled);
                    }
                    if self.pause_rx.changed().await.is_err() {
                        break;
                    }
                }
                if self.controller.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }
                emitter.send(snapshot(
                    SearchStatus::Running,
                    enumerated,
                    candidates,
                    processed,
                    errors,
                    &clusterer,
                    &files,
                ));
            }

            match extractor.extract(&mut files[idx]).await {
                Ok(()) => {
                    clusterer.observe(&mut files, idx);
                }
                Err(err) => {
                    log::warn!("failed to fingerprint {}: {err}", files[idx].handle.rel_path);
                    files[idx].valid = false;
                    errors += 1;
                }
            }
            processed += 1;

            if emitter.should_emit(false) {
                emitter.send(snapshot(
                    SearchStatus::Running,
                    enumerated,
                    candidates,
                    processed,
                    errors,
                    &clusterer,
                    &files,
                ));
            }
        }

        // ---- ended: the final state is flushed exactly once.
        let summary = snapshot(
            SearchStatus::Ended,
            enumerated,
            candidates,
            processed,
            errors,
            &clusterer,
            &files,
        );
        emitter.send(summary.clone());
        Ok(summary)
    }
}

/// Which files are worth fingerprinting. Exact mode can rule out files by
/// byte size alone: without an anchor, a file whose size is unique can
/// match nothing; with one, only anchor-sized files can match.
fn select_candidates(
    files: &[CandidateFile],
    config: &SessionConfig,
    anchor: Option<&CandidateFile>,
) -> Vec<usize> {
    if config.mode != MatchMode::Exact {
        return (0..files.len()).collect();
    }
    match anchor {
        Some(anchor) => files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.handle.size == anchor.handle.size)
            .map(|(i, _)| i)
            .collect(),
        None => {
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for f in files {
                *counts.entry(f.handle.size).or_default() += 1;
            }
            files
                .iter()
                .enumerate()
                .filter(|(_, f)| counts[&f.handle.size] > 1)
                .map(|(i, _)| i)
                .collect()
        }
    }
}

fn snapshot(
    status: SearchStatus,
    enumerated: usize,
    candidates: usize,
    processed: usize,
    errors: usize,
    clusterer: &StreamClusterer,
    files: &[CandidateFile],
) -> ScanSnapshot {
    ScanSnapshot {
        status,
        enumerated,
        candidates,
        processed,
        errors,
        clusters: clusterer
            .clusters()
            .iter()
            .map(|cluster| cluster.iter().map(|&i| files[i].file_ref()).collect())
            .collect(),
    }
}

fn empty_snapshot(status: SearchStatus) -> ScanSnapshot {
    ScanSnapshot {
        status,
        enumerated: 0,
        candidates: 0,
        processed: 0,
        errors: 0,
        clusters: Vec::new(),
    }
}

/// Coalesces progress updates so large scans don't flood observers.
/// Transition and final snapshots bypass the throttle via `send`.
struct ProgressEmitter {
    tx: Option<mpsc::UnboundedSender<ScanSnapshot>>,
    last: Option<Instant>,
}

impl ProgressEmitter {
    fn new(tx: Option<mpsc::UnboundedSender<ScanSnapshot>>) -> Self {
        Self { tx, last: None }
    }

    fn should_emit(&self, force: bool) -> bool {
        if self.tx.is_none() {
            return false;
        }
        if force {
            return true;
        }
        match self.last {
            Some(last) => last.elapsed() >= PROGRESS_INTERVAL,
            None => true,
        }
    }

    fn send(&mut self, snapshot: ScanSnapshot) {
        if let Some(tx) = &self.tx {
            self.last = Some(Instant::now());
            let _ = tx.send(snapshot);
        }
    }
}
