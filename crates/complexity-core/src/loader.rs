//! Prefetching data loader with ordered output
//!
//! With `num_workers == 0` images are decoded lazily on the calling thread.
//! Otherwise a pool of decoder threads pulls indices from a shared queue and
//! pushes decoded tensors through a channel; the iterator buffers out-of-order
//! arrivals so items are always yielded in dataset order.
//!
//! ```text
//! [index queue] --> [decoder 0..N] --(index, tensor)--> [reorder buffer] --> caller
//! ```
//!
//! Indices are handed out in a sliding window: image `i + window` is only
//! queued once image `i` has been yielded. At most `window` decoded images are
//! held at any time, across the channel and the reorder buffer together.
//!
//! Dropping the iterator closes both channels, which makes every worker stop
//! at its next send or receive.

use crate::error::{ComplexityError, Result};
use complexity_common::{ImageDataset, ImageTensor};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::collections::BTreeMap;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Decoded images in flight per worker
const PREFETCH_PER_WORKER: usize = 2;

type Decoded = (usize, complexity_common::Result<ImageTensor>);

/// Data loader over an image dataset
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: ImageDataset,
    num_workers: usize,
}

impl DataLoader {
    pub fn new(dataset: ImageDataset, num_workers: usize) -> Self {
        Self {
            dataset,
            num_workers,
        }
    }

    /// Number of images the loader will yield
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Iterate over `(index, tensor)` pairs in dataset order
    pub fn iter(&self) -> LoaderIter {
        if self.num_workers == 0 || self.dataset.len() <= 1 {
            return LoaderIter::Sequential {
                dataset: self.dataset.clone(),
                next: 0,
            };
        }

        let workers = self.num_workers.min(self.dataset.len());
        debug!(
            "Starting data loader with {} workers for {} images",
            workers,
            self.dataset.len()
        );

        let window = workers * PREFETCH_PER_WORKER;
        let (index_tx, index_rx) = unbounded::<usize>();
        for index in 0..window.min(self.dataset.len()) {
            // Receiver is alive in this scope, send cannot fail
            let _ = index_tx.send(index);
        }

        let (result_tx, result_rx) = bounded::<Decoded>(window);

        let handles = (0..workers)
            .map(|_| {
                let dataset = self.dataset.clone();
                let index_rx = index_rx.clone();
                let result_tx = result_tx.clone();
                thread::spawn(move || {
                    for index in index_rx.iter() {
                        let decoded = dataset.get(index);
                        if result_tx.send((index, decoded)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        LoaderIter::Parallel {
            indices: Some(index_tx),
            results: result_rx,
            pending: BTreeMap::new(),
            next: 0,
            total: self.dataset.len(),
            window,
            handles,
        }
    }
}

/// Iterator returned by [`DataLoader::iter`]
pub enum LoaderIter {
    Sequential {
        dataset: ImageDataset,
        next: usize,
    },
    Parallel {
        indices: Option<Sender<usize>>,
        results: Receiver<Decoded>,
        pending: BTreeMap<usize, complexity_common::Result<ImageTensor>>,
        next: usize,
        total: usize,
        window: usize,
        handles: Vec<JoinHandle<()>>,
    },
}

impl Iterator for LoaderIter {
    type Item = Result<(usize, ImageTensor)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            LoaderIter::Sequential { dataset, next } => {
                if *next >= dataset.len() {
                    return None;
                }
                let index = *next;
                *next += 1;
                Some(
                    dataset
                        .get(index)
                        .map(|tensor| (index, tensor))
                        .map_err(ComplexityError::from),
                )
            }
            LoaderIter::Parallel {
                indices,
                results,
                pending,
                next,
                total,
                window,
                ..
            } => {
                if *next >= *total {
                    return None;
                }

                while !pending.contains_key(next) {
                    match results.recv() {
                        Ok((index, decoded)) => {
                            pending.insert(index, decoded);
                        }
                        Err(_) => {
                            let missing = *next;
                            *next = *total;
                            return Some(Err(ComplexityError::Loader(format!(
                                "decoder workers exited before image {missing} was produced"
                            ))));
                        }
                    }
                }

                let index = *next;
                *next += 1;

                // Slide the window by one
                let ahead = index + *window;
                if ahead < *total {
                    if let Some(tx) = indices {
                        let _ = tx.send(ahead);
                    }
                }

                pending.remove(&index).map(|decoded| {
                    decoded
                        .map(|tensor| (index, tensor))
                        .map_err(ComplexityError::from)
                })
            }
        }
    }
}

impl Drop for LoaderIter {
    fn drop(&mut self) {
        if let LoaderIter::Parallel {
            indices,
            results,
            handles,
            ..
        } = self
        {
            // Idle workers wake up once the index sender is gone
            drop(indices.take());
            // Swap in a dead receiver so the real one is dropped before joining
            let (_, dead) = bounded::<Decoded>(0);
            drop(std::mem::replace(results, dead));
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
        }
    }
}
