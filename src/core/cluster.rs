use crate::core::candidate::CandidateFile;
use crate::core::similarity::Comparator;

/// Single-pass greedy clustering over arrival order. Each new file is
/// compared against previously scanned files front-to-back and joins the
/// cluster of the first match; there is no transitive closure, so
/// membership can depend on processing order. With an anchor configured,
/// the anchor is the only comparison target, is never a visible member,
/// and every match lands in cluster 0.
#[derive(Debug)]
pub struct StreamClusterer {
    comparator: Comparator,
    anchor: Option<CandidateFile>,
    scanned: Vec<usize>,
    clusters: Vec<Vec<usize>>,
}

impl StreamClusterer {
    pub fn new(comparator: Comparator) -> Self {
        Self {
            comparator,
            anchor: None,
            scanned: Vec::new(),
            clusters: Vec::new(),
        }
    }

    pub fn with_anchor(comparator: Comparator, anchor: CandidateFile) -> Self {
        Self {
            comparator,
            anchor: Some(anchor),
            scanned: Vec::new(),
            clusters: Vec::new(),
        }
    }

    /// Clusters as ordered lists of indices into the session file table.
    /// A cluster's position is its permanent identity and never shrinks.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    pub fn anchor(&self) -> Option<&CandidateFile> {
        self.anchor.as_ref()
    }

    /// Fold the freshly fingerprinted file at `idx` into the cluster set.
    /// Returns the cluster it joined, if any.
    pub fn observe(&mut self, files: &mut [CandidateFile], idx: usize) -> Option<usize> {
        if let Some(anchor) = &self.anchor {
            if !self.comparator.is_similar(&files[idx], anchor) {
                return None;
            }
            if self.clusters.is_empty() {
                self.clusters.push(Vec::new());
            }
            self.clusters[0].push(idx);
            files[idx].cluster = Some(0);
            return Some(0);
        }

        let matched = self
            .scanned
            .iter()
            .copied()
            .find(|&g| self.comparator.is_similar(&files[idx], &files[g]));

        let joined = matched.map(|g| {
            let id = match files[g].cluster {
                Some(id) => {
                    self.clusters[id].push(idx);
                    id
                }
                None => {
                    // Neither file is clustered yet: open a new cluster
                    // with the earlier file first.
                    let id = self.clusters.len();
                    self.clusters.push(vec![g, idx]);
                    files[g].cluster = Some(id);
                    id
                }
            };
            files[idx].cluster = Some(id);
            id
        });

        self.scanned.push(idx);
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMode;
    use crate::core::fingerprint::{Fingerprint, IconVector};
    use crate::source::FileHandle;
    use chrono::{DateTime, Utc};
    use std::path::PathBuf;
    use std::time::UNIX_EPOCH;

    fn candidate(name: &str, icon_value: f32) -> CandidateFile {
        let handle = FileHandle {
            path: PathBuf::from(name),
            rel_path: name.to_string(),
            size: 100,
            modified: DateTime::<Utc>::from(UNIX_EPOCH),
        };
        let mut c = CandidateFile::new(handle, u64::MAX);
        c.width = Some(100);
        c.height = Some(100);
        c.fingerprint = Some(Fingerprint::Icon(IconVector {
            samples: vec![icon_value; 121],
        }));
        c
    }

    fn perceptual() -> Comparator {
        Comparator::for_mode(MatchMode::Perceptual)
    }

    #[test]
    fn pair_forms_cluster_in_discovery_order() {
        // 121 * 20^2 = 48 400: values 20 apart are just similar.
        let mut files = vec![candidate("a.png", 0.0), candidate("b.png", 10.0)];
        let mut clusterer = StreamClusterer::new(perceptual());

        assert_eq!(clusterer.observe(&mut files, 0), None);
        assert_eq!(clusterer.observe(&mut files, 1), Some(0));
        assert_eq!(clusterer.clusters(), &[vec![0, 1]]);
        assert_eq!(files[0].cluster, Some(0));
        assert_eq!(files[1].cluster, Some(0));
    }

    #[test]
    fn later_file_joins_existing_cluster() {
        let mut files = vec![
            candidate("a.png", 0.0),
            candidate("b.png", 10.0),
            candidate("c.png", 5.0),
        ];
        let mut clusterer = StreamClusterer::new(perceptual());
        for idx in 0..files.len() {
            clusterer.observe(&mut files, idx);
        }
        assert_eq!(clusterer.clusters(), &[vec![0, 1, 2]]);
    }

    #[test]
    fn dissimilar_file_stays_unclustered() {
        let mut files = vec![candidate("a.png", 0.0), candidate("b.png", 200.0)];
        let mut clusterer = StreamClusterer::new(perceptual());
        clusterer.observe(&mut files, 0);
        assert_eq!(clusterer.observe(&mut files, 1), None);
        assert!(clusterer.clusters().is_empty());
        assert_eq!(files[1].cluster, None);
    }

    #[test]
    fn clustering_depends_on_arrival_order() {
        // A~B and B~C but not A~C (values 0, 20, 40).
        let make = || {
            vec![
                candidate("a.png", 0.0),
                candidate("b.png", 20.0),
                candidate("c.png", 40.0),
            ]
        };

        // Order A, B, C: B joins A, then C finds B in the scanned set.
        let mut files = make();
        let mut clusterer = StreamClusterer::new(perceptual());
        for idx in [0, 1, 2] {
            clusterer.observe(&mut files, idx);
        }
        assert_eq!(clusterer.clusters(), &[vec![0, 1, 2]]);

        // Order A, C, B: C never matches A, and B's first match is A, so
        // C is left behind. This is the documented first-match behavior,
        // not a defect.
        let mut files = make();
        let mut clusterer = StreamClusterer::new(perceptual());
        for idx in [0, 2, 1] {
            clusterer.observe(&mut files, idx);
        }
        assert_eq!(clusterer.clusters(), &[vec![0, 1]]);
        assert_eq!(files[2].cluster, None);
    }

    #[test]
    fn anchor_mode_clusters_against_anchor_only() {
        let anchor = candidate("anchor.png", 0.0);
        // b and c are similar to each other but only b matches the anchor.
        let mut files = vec![candidate("b.png", 15.0), candidate("c.png", 30.0)];
        let mut clusterer = StreamClusterer::with_anchor(perceptual(), anchor);

        assert_eq!(clusterer.observe(&mut files, 0), Some(0));
        assert_eq!(clusterer.observe(&mut files, 1), None);

        // The anchor itself is never a visible member, and c did not
        // cluster with b despite their similarity.
        assert_eq!(clusterer.clusters(), &[vec![0]]);
        assert_eq!(files[1].cluster, None);
    }

    #[test]
    fn anchor_matches_accumulate_in_cluster_zero() {
        let anchor = candidate("anchor.png", 0.0);
        let mut files = vec![
            candidate("b.png", 5.0),
            candidate("c.png", 200.0),
            candidate("d.png", 10.0),
        ];
        let mut clusterer = StreamClusterer::with_anchor(perceptual(), anchor);
        for idx in 0..files.len() {
            clusterer.observe(&mut files, idx);
        }
        assert_eq!(clusterer.clusters(), &[vec![0, 2]]);
    }
}
