//! Worklist planning and batch sizing.

use std::collections::HashSet;

use crate::catalog::Candidate;
use crate::classify::should_skip;

/// Size assumed for a photo whose catalog entry has no usable size.
pub const PHOTO_SIZE_ESTIMATE: u64 = 5 * 1024 * 1024;
/// Size assumed for a video whose catalog entry has no usable size.
pub const VIDEO_SIZE_ESTIMATE: u64 = 100 * 1024 * 1024;

/// Build the ordered worklist for a run.
///
/// Already-migrated and junk candidates are dropped. Locally available
/// candidates come first in catalog order, followed by remote-only ones;
/// with `local_only` the remote-only ones are discarded.
pub fn plan(
    candidates: Vec<Candidate>,
    migrated_ids: &HashSet<String>,
    local_only: bool,
) -> Vec<Candidate> {
    let (local, remote): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .filter(|c| !migrated_ids.contains(&c.id))
        .filter(|c| !should_skip(&c.filename))
        .partition(Candidate::is_local);

    tracing::debug!(
        local = local.len(),
        remote = remote.len(),
        local_only,
        "Planned worklist"
    );

    if local_only {
        local
    } else {
        let mut worklist = local;
        worklist.extend(remote);
        worklist
    }
}

/// Declared size, or an estimate from the catalog's photo/video flag when the
/// catalog does not know it.
pub fn estimated_size(candidate: &Candidate) -> u64 {
    candidate.declared_size().unwrap_or(if candidate.is_photo {
        PHOTO_SIZE_ESTIMATE
    } else {
        VIDEO_SIZE_ESTIMATE
    })
}

/// Take the next batch off the front of `worklist`.
///
/// Items are taken greedily in order until `max_items` is reached or the next
/// item would push the total estimated size past `max_bytes`. An item larger
/// than `max_bytes` on its own is taken alone so it cannot block the run.
/// A `max_items` of zero means no cap, so a non-empty worklist always yields
/// a non-empty batch.
pub fn build_batch(
    mut worklist: Vec<Candidate>,
    max_bytes: u64,
    max_items: Option<usize>,
) -> (Vec<Candidate>, Vec<Candidate>) {
    let max_items = max_items.filter(|&cap| cap > 0);
    let mut total: u64 = 0;
    let mut take = 0;

    for candidate in &worklist {
        if max_items.is_some_and(|cap| take >= cap) {
            break;
        }
        let size = estimated_size(candidate);
        if take > 0 && total.saturating_add(size) > max_bytes {
            break;
        }
        total = total.saturating_add(size);
        take += 1;
        if total > max_bytes {
            // Oversized first item: alone in its batch.
            break;
        }
    }

    let remaining = worklist.split_off(take);
    (worklist, remaining)
}

/// Catalog breakdown reported by the `progress` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSurvey {
    pub total: usize,
    pub already_migrated: usize,
    pub junk: usize,
    /// Not yet migrated and available on disk.
    pub local: usize,
    /// Not yet migrated and only in iCloud.
    pub remote: usize,
}

impl CatalogSurvey {
    pub fn pending(&self) -> usize {
        self.local + self.remote
    }

    /// Share of migratable items already in the ledger, 0-100.
    pub fn percent_migrated(&self) -> f64 {
        let migratable = self.already_migrated + self.pending();
        if migratable == 0 {
            return 100.0;
        }
        self.already_migrated as f64 / migratable as f64 * 100.0
    }
}

/// Classify every candidate without building a worklist.
pub fn survey(candidates: &[Candidate], migrated_ids: &HashSet<String>) -> CatalogSurvey {
    let mut s = CatalogSurvey {
        total: candidates.len(),
        ..CatalogSurvey::default()
    };
    for c in candidates {
        if migrated_ids.contains(&c.id) {
            s.already_migrated += 1;
        } else if should_skip(&c.filename) {
            s.junk += 1;
        } else if c.is_local() {
            s.local += 1;
        } else {
            s.remote += 1;
        }
    }
    s
}
