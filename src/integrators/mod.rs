//! Turning ray batches into pixels.
//!
//! - [`volume::VolumeRenderer`]: owns the occupancy grid and dispatches
//!   to the hierarchical, accelerated training or accelerated inference
//!   path.
//! - [`compaction::StreamCompactor`]: the alive ray worklist used for
//!   accelerated inference.
//! - [`render_staged`]: splits large batches into chunks that worker
//!   threads render independently.

pub mod compaction;
pub mod volume;

// std
use std::ops::Range;
// ngp
use crate::blockqueue::ChunkQueue;
use crate::core::error::{NgpError, Result};

/// Render `0..n_rays` in chunks of at most *chunk_size* rays with
/// *num_threads* workers (0 for one per CPU). *render_chunk* receives
/// the ray range of a chunk; the results come back in ray order. The
/// first failing chunk (in ray order) decides the error.
pub fn render_staged<T, F>(
    n_rays: usize,
    chunk_size: usize,
    num_threads: u8,
    render_chunk: F,
) -> Result<Vec<(Range<usize>, T)>>
where
    T: Send,
    F: Fn(Range<usize>) -> Result<T> + Sync,
{
    let num_cores: usize = if num_threads == 0_u8 {
        num_cpus::get()
    } else {
        num_threads as usize
    };
    let chunk_queue = ChunkQueue::new(n_rays, chunk_size);
    if chunk_queue.is_empty() {
        debug!("nothing to render");
        return Ok(Vec::new());
    }
    let n_chunks: usize = chunk_queue.len();
    debug!(
        "rendering {} rays in {} chunks with {} thread(s)",
        n_rays, n_chunks, num_cores
    );
    let mut slots: Vec<Option<(Range<usize>, Result<T>)>> = (0..n_chunks).map(|_| None).collect();
    {
        let cq = &chunk_queue;
        let render_chunk = &render_chunk;
        let slots = &mut slots;
        crossbeam::scope(|scope| {
            let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(num_cores);
            // spawn worker threads
            for _ in 0..num_cores.min(n_chunks) {
                let chunk_tx = chunk_tx.clone();
                scope.spawn(move |_| {
                    for (index, range) in cq.iter() {
                        let result: Result<T> = render_chunk(range.clone());
                        // the collector only stops listening after a panic
                        if chunk_tx.send((index, range, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(chunk_tx);
            // collect chunks until every worker is gone
            for (index, range, result) in chunk_rx.iter() {
                slots[index] = Some((range, result));
            }
        })
        .map_err(|_| NgpError::WorkerPanic)?;
    }
    let mut chunks: Vec<(Range<usize>, T)> = Vec::with_capacity(n_chunks);
    for slot in slots.into_iter() {
        match slot {
            Some((range, Ok(chunk))) => chunks.push((range, chunk)),
            Some((_, Err(e))) => return Err(e),
            None => return Err(NgpError::WorkerPanic),
        }
    }
    Ok(chunks)
}
