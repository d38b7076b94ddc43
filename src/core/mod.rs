pub mod candidate;
pub mod cluster;
pub mod fingerprint;
pub mod jpeg;
pub mod similarity;

pub use candidate::{CandidateFile, FileRef};
pub use cluster::StreamClusterer;
pub use fingerprint::{Fingerprint, GeometryError, IconGeometry, IconVector, ICON_DIM};
pub use jpeg::{locate_thumbnail, EmbeddedThumbnail, THUMB_SCAN_BYTES};
pub use similarity::Comparator;
