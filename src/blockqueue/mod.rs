//! Provides a queue of ray ranges (chunks) for the worker threads of a
//! staged render. The queue itself is not changed after creation, we
//! simply work through it with an atomic counter to track the index of
//! the next chunk to work on.

// std
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The queue of chunks to be worked on shared immutably between worker
/// threads.
pub struct ChunkQueue {
    /// contiguous, non-overlapping ray ranges in ray order
    chunks: Vec<Range<usize>>,
    /// index of the next chunk to be worked on
    next: AtomicUsize,
}

impl ChunkQueue {
    /// Split `0..n_rays` into chunks of at most `chunk_size` rays.
    pub fn new(n_rays: usize, chunk_size: usize) -> ChunkQueue {
        let chunk_size: usize = chunk_size.max(1);
        let chunks: Vec<Range<usize>> = (0..n_rays)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(n_rays))
            .collect();
        ChunkQueue {
            chunks,
            next: AtomicUsize::new(0),
        }
    }
    /// Get an iterator to work through the queue
    pub fn iter(&self) -> ChunkQueueIterator {
        ChunkQueueIterator { queue: self }
    }
    /// Get the next chunk (with its position in the queue) or None if
    /// the queue is finished
    pub fn next(&self) -> Option<(usize, Range<usize>)> {
        let i = self.next.fetch_add(1, Ordering::AcqRel);
        if i >= self.chunks.len() {
            None
        } else {
            Some((i, self.chunks[i].clone()))
        }
    }
    /// Get the number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
    /// Check if the batch was split into no chunks at all
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Iterator to work through the queue safely
pub struct ChunkQueueIterator<'a> {
    queue: &'a ChunkQueue,
}

impl<'a> Iterator for ChunkQueueIterator<'a> {
    type Item = (usize, Range<usize>);
    fn next(&mut self) -> Option<(usize, Range<usize>)> {
        self.queue.next()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chunks_cover_the_batch() {
        let queue = ChunkQueue::new(10, 4);
        assert_eq!(queue.len(), 3);
        let chunks: Vec<(usize, Range<usize>)> = queue.iter().collect();
        assert_eq!(chunks, vec![(0, 0..4), (1, 4..8), (2, 8..10)]);
        assert!(!queue.is_empty());
        assert!(queue.iter().next().is_none());
    }

    #[test]
    fn empty_batch() {
        let queue = ChunkQueue::new(0, 4);
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
    }
}
