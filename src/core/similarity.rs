use crate::config::MatchMode;
use crate::core::candidate::CandidateFile;
use crate::core::fingerprint::Fingerprint;

/// Aspect ratios may differ by up to this much (relative %) before two
/// images are considered incomparable.
pub const RATIO_TOLERANCE_PCT: i128 = 10;

/// Per-sample squared-distance allowance for the icon hash; the
/// acceptance threshold is this times the sample count (400 * 121 = 48 400).
pub const REJECT_LUMA_DIST: f64 = 400.0;

/// Maximum Hamming distance for the gradient hash.
pub const MAX_HAMMING_DIST: u32 = 5;

/// Decides whether two fingerprints denote the same picture. The mode is
/// fixed when the session starts; fingerprints of mismatched kinds never
/// compare similar.
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    exact: bool,
}

impl Comparator {
    pub fn for_mode(mode: MatchMode) -> Self {
        Self {
            exact: mode == MatchMode::Exact,
        }
    }

    pub fn is_similar(&self, a: &CandidateFile, b: &CandidateFile) -> bool {
        match (&a.fingerprint, &b.fingerprint) {
            (Some(fa), Some(fb)) => {
                self.fingerprints_similar(fa, fb, a.dimensions(), b.dimensions())
            }
            _ => false,
        }
    }

    pub fn fingerprints_similar(
        &self,
        a: &Fingerprint,
        b: &Fingerprint,
        dims_a: Option<(u32, u32)>,
        dims_b: Option<(u32, u32)>,
    ) -> bool {
        if self.exact {
            return matches!((a, b), (Fingerprint::Digest(da), Fingerprint::Digest(db)) if da == db);
        }

        let (Some((w1, h1)), Some((w2, h2))) = (dims_a, dims_b) else {
            return false;
        };
        if !aspect_ratios_compatible(w1, h1, w2, h2) {
            return false;
        }

        match (a, b) {
            (Fingerprint::Icon(ia), Fingerprint::Icon(ib)) => {
                ia.squared_distance(ib) <= REJECT_LUMA_DIST * ia.samples.len() as f64
            }
            (Fingerprint::Gradient(ga), Fingerprint::Gradient(gb)) => {
                (ga ^ gb).count_ones() <= MAX_HAMMING_DIST
            }
            _ => false,
        }
    }
}

/// Relative aspect-ratio check in cross-multiplied integer form, so no
/// floating-point division is involved:
/// `|100*h1*w2 - 100*h2*w1| > tol * max(h1*w2, h2*w1)` rejects.
pub fn aspect_ratios_compatible(w1: u32, h1: u32, w2: u32, h2: u32) -> bool {
    let cross1 = h1 as i128 * w2 as i128;
    let cross2 = h2 as i128 * w1 as i128;
    (100 * cross1 - 100 * cross2).abs() <= RATIO_TOLERANCE_PCT * cross1.max(cross2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::IconVector;

    fn icon(value: f32) -> Fingerprint {
        Fingerprint::Icon(IconVector {
            samples: vec![value; 121],
        })
    }

    const SQUARE: Option<(u32, u32)> = Some((100, 100));

    #[test]
    fn exact_mode_compares_digests_only() {
        let cmp = Comparator::for_mode(MatchMode::Exact);
        let a = Fingerprint::Digest("ab".into());
        let b = Fingerprint::Digest("ab".into());
        let c = Fingerprint::Digest("cd".into());
        assert!(cmp.fingerprints_similar(&a, &b, None, None));
        assert!(!cmp.fingerprints_similar(&a, &c, None, None));
        // Perceptual fingerprints never match in exact mode.
        assert!(!cmp.fingerprints_similar(&icon(0.0), &icon(0.0), SQUARE, SQUARE));
    }

    #[test]
    fn aspect_ratio_prefilter_rejects() {
        // 100x100 vs 100x200 differs by far more than 10%.
        assert!(!aspect_ratios_compatible(100, 100, 100, 200));
        // Identical and near-identical ratios pass.
        assert!(aspect_ratios_compatible(100, 100, 50, 50));
        assert!(aspect_ratios_compatible(1000, 500, 1050, 500));
        // Exactly 10% off is still comparable.
        assert!(aspect_ratios_compatible(100, 100, 100, 110));
        assert!(!aspect_ratios_compatible(100, 100, 100, 112));
    }

    #[test]
    fn prefilter_applies_before_distance() {
        let cmp = Comparator::for_mode(MatchMode::Perceptual);
        let a = icon(0.0);
        let b = icon(0.0);
        // Zero distance, but the shapes are incompatible.
        assert!(!cmp.fingerprints_similar(&a, &b, Some((100, 100)), Some((100, 200))));
        // Unknown dimensions never match.
        assert!(!cmp.fingerprints_similar(&a, &b, None, SQUARE));
    }

    #[test]
    fn icon_distance_threshold_boundary() {
        let cmp = Comparator::for_mode(MatchMode::Perceptual);
        // 121 * 20^2 = 48 400, exactly the acceptance limit.
        assert!(cmp.fingerprints_similar(&icon(0.0), &icon(20.0), SQUARE, SQUARE));
        assert!(!cmp.fingerprints_similar(&icon(0.0), &icon(21.0), SQUARE, SQUARE));
    }

    #[test]
    fn gradient_hamming_threshold_boundary() {
        let cmp = Comparator::for_mode(MatchMode::Perceptual);
        let a = Fingerprint::Gradient(0);
        let five = Fingerprint::Gradient(0b11111);
        let six = Fingerprint::Gradient(0b111111);
        assert!(cmp.fingerprints_similar(&a, &five, SQUARE, SQUARE));
        assert!(!cmp.fingerprints_similar(&a, &six, SQUARE, SQUARE));
    }

    #[test]
    fn mixed_kinds_never_match() {
        let cmp = Comparator::for_mode(MatchMode::Perceptual);
        let a = icon(0.0);
        let b = Fingerprint::Gradient(0);
        assert!(!cmp.fingerprints_similar(&a, &b, SQUARE, SQUARE));
    }
}
