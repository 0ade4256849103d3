//! In-process multi-rank execution.
//!
//! [`LocalCluster::run`] starts one scoped thread per rank and hands each
//! a [`LocalRank`] communicator. All ranks share one rendezvous: a mutex
//! guarded round of deposit slots plus a condition variable. The last rank
//! to arrive publishes the round and bumps the generation, which releases
//! the others.
//!
//! A rank whose closure returns an error or panics aborts the rendezvous.
//! Ranks blocked in (or later entering) a collective then fail with
//! [`CommError::Aborted`] instead of waiting forever.

use std::any::Any;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use skewer_core::ConfigError;

use crate::communicator::Communicator;
use crate::error::CommError;

type Payload = Box<dyn Any + Send + Sync>;

// ── Configuration ───────────────────────────────────────────────

/// Configuration for a [`LocalCluster`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Number of ranks. Must be at least 1.
    pub ranks: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { ranks: 1 }
    }
}

impl ClusterConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ranks == 0 {
            return Err(ConfigError::InvalidConfig {
                reason: "cluster needs at least one rank".into(),
            });
        }
        Ok(())
    }
}

// ── Rendezvous ──────────────────────────────────────────────────

struct Round {
    generation: u64,
    arrived: usize,
    slots: Vec<Option<Payload>>,
    published: Arc<Vec<Option<Payload>>>,
    aborted_by: Option<usize>,
}

struct Rendezvous {
    size: usize,
    round: Mutex<Round>,
    released: Condvar,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            size,
            round: Mutex::new(Round {
                generation: 0,
                arrived: 0,
                slots: (0..size).map(|_| None).collect(),
                published: Arc::new(Vec::new()),
                aborted_by: None,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Round> {
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deposit `payload` and wait for every rank to do the same.
    fn exchange(
        &self,
        rank: usize,
        payload: Option<Payload>,
    ) -> Result<Arc<Vec<Option<Payload>>>, CommError> {
        let mut round = self.lock();
        if let Some(by_rank) = round.aborted_by {
            return Err(CommError::Aborted { by_rank });
        }
        round.slots[rank] = payload;
        round.arrived += 1;
        if round.arrived == self.size {
            let slots = std::mem::replace(
                &mut round.slots,
                (0..self.size).map(|_| None).collect(),
            );
            round.published = Arc::new(slots);
            round.arrived = 0;
            round.generation += 1;
            self.released.notify_all();
            return Ok(Arc::clone(&round.published));
        }
        let generation = round.generation;
        while round.generation == generation {
            if let Some(by_rank) = round.aborted_by {
                return Err(CommError::Aborted { by_rank });
            }
            round = self
                .released
                .wait(round)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(Arc::clone(&round.published))
    }

    fn abort(&self, rank: usize) {
        let mut round = self.lock();
        if round.aborted_by.is_none() {
            round.aborted_by = Some(rank);
            tracing::warn!(rank, "rank failed, aborting collectives");
        }
        self.released.notify_all();
    }

    fn aborted_by(&self) -> Option<usize> {
        self.lock().aborted_by
    }
}

/// Aborts the rendezvous when dropped while armed.
struct AbortGuard<'a> {
    shared: &'a Rendezvous,
    rank: usize,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.abort(self.rank);
        }
    }
}

// ── Cluster ─────────────────────────────────────────────────────

/// Runs a closure on several ranks, each on its own thread.
#[derive(Clone, Debug)]
pub struct LocalCluster {
    config: ClusterConfig,
}

impl LocalCluster {
    /// Validate `config` and build a cluster.
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Shorthand for a cluster of `ranks` ranks.
    pub fn with_ranks(ranks: usize) -> Result<Self, ConfigError> {
        Self::new(ClusterConfig { ranks })
    }

    /// Number of ranks.
    pub fn ranks(&self) -> usize {
        self.config.ranks
    }

    /// Run `f` once per rank and collect the per-rank results in rank order.
    ///
    /// If any rank fails, returns the error of the rank that aborted the
    /// run first. If any rank panics, the panic is resumed on the caller.
    pub fn run<T, E, F>(&self, f: F) -> Result<Vec<T>, E>
    where
        F: Fn(&LocalRank<'_>) -> Result<T, E> + Sync,
        T: Send,
        E: Send,
    {
        let size = self.config.ranks;
        let shared = Rendezvous::new(size);
        tracing::debug!(ranks = size, "starting local cluster");

        let joined: Vec<thread::Result<Result<T, E>>> = thread::scope(|s| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let shared = &shared;
                    let f = &f;
                    s.spawn(move || {
                        let mut guard = AbortGuard {
                            shared,
                            rank,
                            armed: true,
                        };
                        let comm = LocalRank { rank, shared };
                        let result = f(&comm);
                        guard.armed = result.is_err();
                        result
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let first_failure = shared.aborted_by();
        let mut results = Vec::with_capacity(size);
        let mut errors: Vec<(usize, E)> = Vec::new();
        for (rank, outcome) in joined.into_iter().enumerate() {
            match outcome {
                Err(panic) => std::panic::resume_unwind(panic),
                Ok(Ok(value)) => results.push(value),
                Ok(Err(e)) => errors.push((rank, e)),
            }
        }
        if errors.is_empty() {
            return Ok(results);
        }
        let pick = errors
            .iter()
            .position(|(rank, _)| Some(*rank) == first_failure)
            .unwrap_or(0);
        Err(errors.swap_remove(pick).1)
    }
}

/// One rank's view of a [`LocalCluster`].
pub struct LocalRank<'a> {
    rank: usize,
    shared: &'a Rendezvous,
}

impl LocalRank<'_> {
    fn check_root(&self, root: usize) -> Result<(), CommError> {
        if root >= self.shared.size {
            return Err(CommError::InvalidRoot {
                root,
                size: self.shared.size,
            });
        }
        Ok(())
    }

    fn read<T: Clone + 'static>(
        published: &[Option<Payload>],
        rank: usize,
    ) -> Result<Option<T>, CommError> {
        match &published[rank] {
            None => Ok(None),
            Some(p) => p
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or(CommError::PayloadType { rank }),
        }
    }

    fn read_all<T: Clone + 'static>(published: &[Option<Payload>]) -> Result<Vec<T>, CommError> {
        (0..published.len())
            .map(|rank| Self::read::<T>(published, rank)?.ok_or(CommError::PayloadType { rank }))
            .collect()
    }
}

impl Communicator for LocalRank<'_> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.shared.exchange(self.rank, None).map(|_| ())
    }

    fn broadcast<T>(&self, value: Option<T>, root: usize) -> Result<T, CommError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.check_root(root)?;
        let payload = if self.rank == root {
            value.map(|v| Box::new(v) as Payload)
        } else {
            None
        };
        let published = self.shared.exchange(self.rank, payload)?;
        Self::read::<T>(&published, root)?.ok_or(CommError::MissingRootValue { root })
    }

    fn all_gather<T>(&self, value: T) -> Result<Vec<T>, CommError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let published = self.shared.exchange(self.rank, Some(Box::new(value) as Payload))?;
        Self::read_all(&published)
    }

    fn gather<T>(&self, value: T, root: usize) -> Result<Option<Vec<T>>, CommError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.check_root(root)?;
        let published = self.shared.exchange(self.rank, Some(Box::new(value) as Payload))?;
        if self.rank != root {
            return Ok(None);
        }
        Self::read_all(&published).map(Some)
    }
}
