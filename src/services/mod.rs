pub mod extractor;
pub mod scanner;

pub use extractor::{ExtractError, FingerprintExtractor, FingerprintStrategy, RasterSurface};
pub use scanner::{ScanController, ScanError, ScanService, ScanSnapshot, SearchStatus};
