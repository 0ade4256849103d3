//! Bounded worker pool for chunked data-parallel counting.
//!
//! Work is split into contiguous chunks sent to scoped workers over a
//! bounded crossbeam channel. Each worker adds its partial results into
//! a shared atomic accumulator, so the combine is commutative and no
//! ordering between chunks is implied.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::bounded;

/// A fixed-size pool of scoped worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    threads: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::available()
    }
}

impl WorkerPool {
    /// Chunks handed out per worker under the automatic policy.
    const CHUNKS_PER_THREAD: usize = 4;

    /// A pool of `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// A pool sized to the machine's available parallelism.
    pub fn available() -> Self {
        Self::new(thread::available_parallelism().map_or(1, |n| n.get()))
    }

    /// Number of workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Chunk size giving each worker a few chunks of `len` items.
    pub fn auto_chunk_size(&self, len: usize) -> usize {
        len.div_ceil(self.threads * Self::CHUNKS_PER_THREAD).max(1)
    }

    /// Apply `f` to contiguous chunks of `items` and sum the results.
    ///
    /// A `chunk` of 0 selects [`auto_chunk_size`](Self::auto_chunk_size).
    pub fn map_chunks<T, F>(&self, items: &[T], chunk: usize, f: F) -> usize
    where
        T: Sync,
        F: Fn(&[T]) -> usize + Sync,
    {
        let chunk = if chunk == 0 {
            self.auto_chunk_size(items.len())
        } else {
            chunk
        };
        if self.threads == 1 || items.len() <= chunk {
            return items.chunks(chunk).map(&f).sum();
        }

        let total = AtomicUsize::new(0);
        let (tx, rx) = bounded::<Range<usize>>(self.threads * 2);
        thread::scope(|s| {
            for _ in 0..self.threads {
                let rx = rx.clone();
                let total = &total;
                let f = &f;
                s.spawn(move || {
                    while let Ok(range) = rx.recv() {
                        total.fetch_add(f(&items[range]), Ordering::Relaxed);
                    }
                });
            }
            drop(rx);
            let mut start = 0;
            while start < items.len() {
                let end = (start + chunk).min(items.len());
                if tx.send(start..end).is_err() {
                    break;
                }
                start = end;
            }
            drop(tx);
        });
        total.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn auto_chunk_is_never_zero() {
        let pool = WorkerPool::new(8);
        assert_eq!(pool.auto_chunk_size(0), 1);
        assert_eq!(pool.auto_chunk_size(3), 1);
        assert_eq!(pool.auto_chunk_size(320), 10);
    }

    #[test]
    fn zero_threads_clamps_to_one() {
        assert_eq!(WorkerPool::new(0).threads(), 1);
    }

    #[test]
    fn empty_input_counts_zero() {
        let pool = WorkerPool::new(4);
        assert_eq!(pool.map_chunks(&[] as &[u32], 0, |c| c.len()), 0);
    }

    proptest! {
        #[test]
        fn parallel_count_matches_serial(
            items in prop::collection::vec(0u32..100, 0..2000),
            threads in 1usize..6,
            chunk in 0usize..300,
        ) {
            let pool = WorkerPool::new(threads);
            let serial = items.iter().filter(|&&x| x % 3 == 0).count();
            let parallel = pool.map_chunks(&items, chunk, |c| c.iter().filter(|&&x| x % 3 == 0).count());
            prop_assert_eq!(parallel, serial);
        }
    }
}
