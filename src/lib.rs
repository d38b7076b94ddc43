//! Locate groups of identical or near-identical images in a file set,
//! fully offline. Files are fingerprinted one at a time (content digest,
//! block-averaged luma icon, or row-gradient bits), compared against
//! previously scanned files, and folded into clusters in arrival order
//! by a pausable, resumable scan pipeline.

pub mod config;
pub mod core;
pub mod services;
pub mod source;

pub use crate::config::{HashKind, MatchMode, SessionConfig, DEFAULT_MAX_FILE_SIZE};
pub use crate::core::{CandidateFile, Comparator, FileRef, Fingerprint, StreamClusterer};
pub use crate::services::{ScanController, ScanError, ScanService, ScanSnapshot, SearchStatus};
pub use crate::source::{DirectorySource, FileHandle, FileSource};
