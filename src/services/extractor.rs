use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{HashKind, MatchMode, SessionConfig};
use crate::core::candidate::CandidateFile;
use crate::core::fingerprint::{
    box_blur, gradient_bits, luma_plane, normalize, Fingerprint, GeometryError, IconGeometry,
    IconVector, GRADIENT_COLS, GRADIENT_ROWS, ICON_DIM,
};
use crate::core::jpeg::{locate_thumbnail, THUMB_SCAN_BYTES};

/// The raster surface is reset after this many hashed images.
pub const SURFACE_RESET_THRESHOLD: usize = 100;

/// Sources with a side beyond this trigger an immediate surface reset.
pub const LARGE_SOURCE_DIM: u32 = 6000;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// How files are fingerprinted. Resolved from the session configuration
/// once and fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintStrategy {
    Digest,
    AverageIcon { fast_read: bool },
    GradientBits { fast_read: bool },
}

impl FingerprintStrategy {
    pub fn for_config(config: &SessionConfig) -> Self {
        match (config.mode, config.hash) {
            (MatchMode::Exact, _) => Self::Digest,
            (MatchMode::Perceptual, HashKind::Average) => Self::AverageIcon {
                fast_read: config.fast_read,
            },
            (MatchMode::Perceptual, HashKind::Gradient) => Self::GradientBits {
                fast_read: config.fast_read,
            },
        }
    }

    fn fast_read(&self) -> bool {
        match *self {
            Self::Digest => false,
            Self::AverageIcon { fast_read } | Self::GradientBits { fast_read } => fast_read,
        }
    }
}

/// Reusable luma scratch buffer for decode/rescale work. Exclusively
/// owned by the extractor; the sequential pipeline is what makes that
/// safe, no locking involved. Reset drops the allocation so memory
/// retained after large sources stays bounded.
#[derive(Debug, Default)]
pub struct RasterSurface {
    luma: Vec<f32>,
    hashed_since_reset: usize,
}

impl RasterSurface {
    pub fn reset(&mut self) {
        self.luma = Vec::new();
        self.hashed_since_reset = 0;
        log::debug!("raster surface reset");
    }

    fn note_hashed(&mut self, src_width: u32, src_height: u32) {
        self.hashed_since_reset += 1;
        if self.hashed_since_reset >= SURFACE_RESET_THRESHOLD
            || src_width > LARGE_SOURCE_DIM
            || src_height > LARGE_SOURCE_DIM
        {
            self.reset();
        }
    }
}

/// Turns one candidate file into a fingerprint, attaching decoded
/// dimensions along the way. Owns the shared raster surface, so only one
/// extraction may be in flight at a time.
pub struct FingerprintExtractor {
    strategy: FingerprintStrategy,
    geometry: IconGeometry,
    surface: RasterSurface,
}

impl FingerprintExtractor {
    pub fn new(config: &SessionConfig) -> Result<Self, GeometryError> {
        Ok(Self {
            strategy: FingerprintStrategy::for_config(config),
            geometry: IconGeometry::new(ICON_DIM)?,
            surface: RasterSurface::default(),
        })
    }

    pub fn strategy(&self) -> FingerprintStrategy {
        self.strategy
    }

    pub fn surface_mut(&mut self) -> &mut RasterSurface {
        &mut self.surface
    }

    /// Fingerprint `file` and attach the result. Errors are per-file:
    /// the session counts them and moves on.
    pub async fn extract(&mut self, file: &mut CandidateFile) -> Result<(), ExtractError> {
        let fingerprint = match self.strategy {
            FingerprintStrategy::Digest => self.digest(file).await?,
            _ => self.perceptual(file).await?,
        };
        file.fingerprint = Some(fingerprint);
        Ok(())
    }

    async fn digest(&self, file: &CandidateFile) -> Result<Fingerprint, ExtractError> {
        let bytes = file.handle.read_all().await?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Fingerprint::Digest(format!("{:x}", hasher.finalize())))
    }

    async fn perceptual(&mut self, file: &mut CandidateFile) -> Result<Fingerprint, ExtractError> {
        if self.strategy.fast_read() && file.is_jpeg() {
            if let Some(fingerprint) = self.from_embedded_thumbnail(file).await? {
                return Ok(fingerprint);
            }
        }

        let bytes = file.handle.read_all().await?;
        let img = image::load_from_memory(&bytes)?;
        file.width = Some(img.width());
        file.height = Some(img.height());
        Ok(self.hash_image(&img))
    }

    /// Fast path: hash an embedded JPEG preview instead of the full
    /// image. Returns None when no usable thumbnail is found, in which
    /// case the caller falls back to a full decode.
    async fn from_embedded_thumbnail(
        &mut self,
        file: &mut CandidateFile,
    ) -> Result<Option<Fingerprint>, ExtractError> {
        let prefix = file.handle.read_prefix(THUMB_SCAN_BYTES).await?;
        let Some(thumb) = locate_thumbnail(&prefix) else {
            return Ok(None);
        };

        let img = match image::load_from_memory_with_format(
            &prefix[thumb.start..thumb.end],
            image::ImageFormat::Jpeg,
        ) {
            Ok(img) => img,
            Err(err) => {
                log::debug!(
                    "embedded thumbnail unusable for {}: {err}",
                    file.handle.rel_path
                );
                return Ok(None);
            }
        };

        // Frame dimensions come from the SOF0 marker here; the full
        // image is never decoded on this path.
        file.width = Some(thumb.width);
        file.height = Some(thumb.height);
        file.thumb_range = Some((thumb.start, thumb.end));
        Ok(Some(self.hash_image(&img)))
    }

    fn hash_image(&mut self, img: &DynamicImage) -> Fingerprint {
        let fingerprint = match self.strategy {
            FingerprintStrategy::GradientBits { .. } => {
                Fingerprint::Gradient(self.gradient_hash(img))
            }
            _ => Fingerprint::Icon(self.icon_hash(img)),
        };
        self.surface.note_hashed(img.width(), img.height());
        fingerprint
    }

    fn icon_hash(&mut self, img: &DynamicImage) -> IconVector {
        let dim = self.geometry.canvas_dim;
        let rgb = img
            .resize_exact(dim as u32, dim as u32, FilterType::Triangle)
            .to_rgb8();
        luma_plane(&rgb, &mut self.surface.luma);

        let blocks = box_blur(&self.surface.luma, dim, self.geometry.cell_dim, self.geometry.cell_dim);
        let mut samples = box_blur(&blocks, self.geometry.block_dim, 3, 2);
        normalize(&mut samples);
        IconVector { samples }
    }

    fn gradient_hash(&mut self, img: &DynamicImage) -> u64 {
        let rgb = img
            .resize_exact(GRADIENT_COLS, GRADIENT_ROWS, FilterType::Triangle)
            .to_rgb8();
        luma_plane(&rgb, &mut self.surface.luma);
        gradient_bits(&self.surface.luma)
    }
}
