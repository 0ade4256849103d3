//! Global counts, offsets, and variable-length gathers.

use crate::communicator::Communicator;
use crate::error::CommError;

/// Per-rank counts with their exclusive prefix sums.
///
/// # Examples
///
/// ```
/// use skewer_comm::GatherLayout;
///
/// let layout = GatherLayout::from_counts(vec![3, 0, 5]);
/// assert_eq!(layout.total(), 8);
/// assert_eq!(layout.offset(2), 3);
/// assert_eq!(layout.offset(1), layout.offset(2));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatherLayout {
    counts: Vec<u64>,
    displs: Vec<u64>,
    total: u64,
}

impl GatherLayout {
    /// Build a layout from known per-rank counts.
    pub fn from_counts(counts: Vec<u64>) -> Self {
        let mut displs = Vec::with_capacity(counts.len());
        let mut total = 0u64;
        for &c in &counts {
            displs.push(total);
            total += c;
        }
        Self {
            counts,
            displs,
            total,
        }
    }

    /// All-gather `local` from every rank and build the layout.
    pub fn exchange<C: Communicator>(comm: &C, local: u64) -> Result<Self, CommError> {
        Ok(Self::from_counts(comm.all_gather(local)?))
    }

    /// Count contributed by `rank`.
    pub fn count(&self, rank: usize) -> u64 {
        self.counts[rank]
    }

    /// Exclusive prefix sum of counts below `rank`.
    pub fn offset(&self, rank: usize) -> u64 {
        self.displs[rank]
    }

    /// Sum over all ranks.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Per-rank counts in rank order.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Per-rank offsets in rank order.
    pub fn displacements(&self) -> &[u64] {
        &self.displs
    }

    /// Number of ranks described.
    pub fn ranks(&self) -> usize {
        self.counts.len()
    }
}

/// Move every rank's records to `root`, concatenated in rank order.
///
/// Each rank passes its local records, whose length must match its
/// entry in `layout`. The root receives `Some` with exactly
/// `layout.total()` records; every other rank receives `None`. Ranks
/// with no records contribute an empty segment.
pub fn gather_records<C, R>(
    comm: &C,
    layout: &GatherLayout,
    local: Vec<R>,
    root: usize,
) -> Result<Option<Vec<R>>, CommError>
where
    C: Communicator,
    R: Clone + Send + Sync + 'static,
{
    let rank = comm.rank();
    let expected = layout.count(rank);
    if local.len() as u64 != expected {
        return Err(CommError::CountMismatch {
            rank,
            expected,
            found: local.len() as u64,
        });
    }
    let Some(segments) = comm.gather(local, root)? else {
        return Ok(None);
    };
    let mut out = Vec::with_capacity(layout.total() as usize);
    for (src, segment) in segments.into_iter().enumerate() {
        let expected = layout.count(src);
        if segment.len() as u64 != expected {
            return Err(CommError::CountMismatch {
                rank: src,
                expected,
                found: segment.len() as u64,
            });
        }
        out.extend(segment);
    }
    Ok(Some(out))
}
