//! The [`Communicator`] contract and its serial implementation.

use crate::error::CommError;

/// Synchronous collectives over a fixed group of ranks.
///
/// Every rank of the group must enter each collective, in the same
/// order and with the same payload type. Payloads are cloned between
/// ranks, so they must be `Clone + Send + Sync + 'static`.
pub trait Communicator {
    /// This rank's index in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Block until every rank has arrived.
    fn barrier(&self) -> Result<(), CommError>;

    /// Distribute the root's value to every rank.
    ///
    /// The root passes `Some(value)`; other ranks pass `None`.
    fn broadcast<T>(&self, value: Option<T>, root: usize) -> Result<T, CommError>
    where
        T: Clone + Send + Sync + 'static;

    /// Collect one value from every rank on every rank, in rank order.
    fn all_gather<T>(&self, value: T) -> Result<Vec<T>, CommError>
    where
        T: Clone + Send + Sync + 'static;

    /// Collect one value from every rank on `root`, in rank order.
    ///
    /// Returns `Some` on the root and `None` elsewhere.
    fn gather<T>(&self, value: T, root: usize) -> Result<Option<Vec<T>>, CommError>
    where
        T: Clone + Send + Sync + 'static;

    /// Whether this rank is rank 0.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// The trivial one-rank communicator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleRank;

impl SingleRank {
    fn check_root(root: usize) -> Result<(), CommError> {
        if root != 0 {
            return Err(CommError::InvalidRoot { root, size: 1 });
        }
        Ok(())
    }
}

impl Communicator for SingleRank {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }

    fn broadcast<T>(&self, value: Option<T>, root: usize) -> Result<T, CommError>
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::check_root(root)?;
        value.ok_or(CommError::MissingRootValue { root })
    }

    fn all_gather<T>(&self, value: T) -> Result<Vec<T>, CommError>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(vec![value])
    }

    fn gather<T>(&self, value: T, root: usize) -> Result<Option<Vec<T>>, CommError>
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::check_root(root)?;
        Ok(Some(vec![value]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank_collectives_are_identity() {
        let c = SingleRank;
        assert!(c.is_root());
        assert_eq!(c.broadcast(Some(5u32), 0).unwrap(), 5);
        assert_eq!(c.all_gather(3u64).unwrap(), vec![3]);
        assert_eq!(c.gather("x", 0).unwrap(), Some(vec!["x"]));
    }

    #[test]
    fn single_rank_rejects_foreign_root() {
        match SingleRank.broadcast(Some(1u8), 1) {
            Err(CommError::InvalidRoot { root: 1, size: 1 }) => {}
            other => panic!("expected InvalidRoot, got {other:?}"),
        }
        assert_eq!(
            SingleRank.broadcast::<u8>(None, 0),
            Err(CommError::MissingRootValue { root: 0 })
        );
    }
}
