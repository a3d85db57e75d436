//! # Generation Pipeline
//!
//! A fixed pool of worker threads draining a priority queue of chunk
//! coordinates.
//!
//! ## Ordering
//!
//! Tasks are popped nearest-first: lowest distance to any region center,
//! then lowest submission sequence. Equal distances therefore run in
//! arrival order. The order is best effort; with several workers, tasks
//! finish in whatever order their work takes.
//!
//! ## Shutdown
//!
//! Dropping the pipeline stops the workers after their current task.
//! Queued tasks are discarded.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::coord::ChunkCoord;
use crate::error::{WorldError, WorldResult};

/// Work run by a pool thread for one coordinate.
pub type GenerationJob = Arc<dyn Fn(ChunkCoord) + Send + Sync>;

/// A queued request to produce one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTask {
    /// Chunk to produce.
    pub coord: ChunkCoord,
    /// Distance to the nearest region center. Lower runs sooner.
    pub priority: u32,
    /// Submission order, breaks priority ties.
    pub seq: u64,
}

impl Ord for GenerationTask {
    /// Reversed so the max-heap pops the nearest, oldest task.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for GenerationTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct TaskQueue {
    heap: BinaryHeap<GenerationTask>,
    /// Tasks popped by a worker and not finished yet.
    in_flight: usize,
    next_seq: u64,
}

impl TaskQueue {
    fn is_idle(&self) -> bool {
        self.heap.is_empty() && self.in_flight == 0
    }
}

struct Shared {
    queue: Mutex<TaskQueue>,
    /// Signalled on submit and on shutdown.
    not_empty: Condvar,
    /// Signalled when the queue drains and no task is running.
    idle: Condvar,
    shutdown: AtomicBool,
    job: GenerationJob,
}

/// Bounded worker pool with a nearest-first queue.
pub struct GenerationPipeline {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl GenerationPipeline {
    /// Starts `worker_threads` workers, each running `job` for the tasks
    /// it pops.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkerSpawn`] if a thread cannot be started.
    /// Workers already started are stopped.
    pub fn new(worker_threads: usize, job: GenerationJob) -> WorldResult<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TaskQueue::default()),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
            shutdown: AtomicBool::new(false),
            job,
        });

        let mut pipeline = Self {
            shared,
            workers: Vec::with_capacity(worker_threads),
        };
        for index in 0..worker_threads {
            let shared = Arc::clone(&pipeline.shared);
            let handle = thread::Builder::new()
                .name(format!("chunk-worker-{index}"))
                .spawn(move || worker_loop(&shared))
                .map_err(|e| WorldError::WorkerSpawn(e.to_string()))?;
            pipeline.workers.push(handle);
        }
        debug!(workers = worker_threads, "generation pipeline started");
        Ok(pipeline)
    }

    /// Queues `coord`. The caller guarantees it is not already queued.
    pub fn submit(&self, coord: ChunkCoord, priority: u32) {
        let mut queue = self.shared.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(GenerationTask { coord, priority, seq });
        trace!(%coord, priority, seq, "generation task queued");
        self.shared.not_empty.notify_one();
    }

    /// Re-keys every queued task with `priority_of`, keeping each task's
    /// submission sequence.
    pub fn reprioritize(&self, priority_of: impl Fn(ChunkCoord) -> u32) {
        let mut queue = self.shared.queue.lock();
        if queue.heap.is_empty() {
            return;
        }
        let tasks: Vec<_> = std::mem::take(&mut queue.heap)
            .into_iter()
            .map(|task| GenerationTask {
                priority: priority_of(task.coord),
                ..task
            })
            .collect();
        queue.heap = BinaryHeap::from(tasks);
    }

    /// Queued plus running tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        let queue = self.shared.queue.lock();
        queue.heap.len() + queue.in_flight
    }

    /// True when nothing is queued or running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.queue.lock().is_idle()
    }

    /// Queued tasks in the order they would run.
    #[must_use]
    pub fn queued(&self) -> Vec<GenerationTask> {
        let mut tasks = self.shared.queue.lock().heap.clone().into_sorted_vec();
        tasks.reverse();
        tasks
    }

    /// Blocks until the pool is idle or `timeout` passes. Returns true if
    /// the pool went idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while !queue.is_idle() {
            if self.shared.idle.wait_until(&mut queue, deadline).timed_out() {
                return queue.is_idle();
            }
        }
        true
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = queue.heap.pop() {
                    queue.in_flight += 1;
                    break task;
                }
                shared.not_empty.wait(&mut queue);
            }
        };

        (shared.job)(task.coord);

        let mut queue = shared.queue.lock();
        queue.in_flight -= 1;
        if queue.is_idle() {
            shared.idle.notify_all();
        }
    }
}

impl Drop for GenerationPipeline {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);

        // Wake every sleeping worker.
        {
            let queue = self.shared.queue.lock();
            self.shared.not_empty.notify_all();
            drop(queue);
        }

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn recording_pipeline(workers: usize) -> (GenerationPipeline, mpsc::Receiver<ChunkCoord>, Arc<Mutex<()>>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let gate = Arc::new(Mutex::new(()));
        let job_gate = Arc::clone(&gate);
        let job: GenerationJob = Arc::new(move |coord| {
            let _pass = job_gate.lock();
            let _ = tx.lock().send(coord);
        });
        (GenerationPipeline::new(workers, job).unwrap(), rx, gate)
    }

    #[test]
    fn test_task_order_is_nearest_then_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(GenerationTask { coord: ChunkCoord::new(0, 0, 0), priority: 3, seq: 0 });
        heap.push(GenerationTask { coord: ChunkCoord::new(1, 0, 0), priority: 1, seq: 1 });
        heap.push(GenerationTask { coord: ChunkCoord::new(2, 0, 0), priority: 1, seq: 2 });
        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|t| t.coord.x).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_single_worker_runs_nearest_first() {
        let (pipeline, rx, gate) = recording_pipeline(1);

        // Hold the worker on a blocker task so the rest queue up.
        let hold = gate.lock();
        pipeline.submit(ChunkCoord::new(99, 0, 0), 0);
        while pipeline.queued().len() == 1 {
            thread::yield_now();
        }
        pipeline.submit(ChunkCoord::new(5, 0, 0), 5);
        pipeline.submit(ChunkCoord::new(1, 0, 0), 1);
        pipeline.submit(ChunkCoord::new(2, 0, 0), 1);
        drop(hold);

        assert!(pipeline.wait_until_idle(Duration::from_secs(5)));
        let order: Vec<_> = rx.try_iter().map(|c| c.x).collect();
        assert_eq!(order, vec![99, 1, 2, 5]);
    }

    #[test]
    fn test_reprioritize_keeps_sequence() {
        let (pipeline, rx, gate) = recording_pipeline(1);
        let hold = gate.lock();
        pipeline.submit(ChunkCoord::new(99, 0, 0), 0);
        while pipeline.queued().len() == 1 {
            thread::yield_now();
        }
        pipeline.submit(ChunkCoord::new(1, 0, 0), 1);
        pipeline.submit(ChunkCoord::new(8, 0, 0), 8);
        pipeline.submit(ChunkCoord::new(9, 0, 0), 9);

        // The observer moved to x = 9.
        pipeline.reprioritize(|c| c.chebyshev_distance(ChunkCoord::new(9, 0, 0)));
        let queued: Vec<_> = pipeline.queued().iter().map(|t| t.coord.x).collect();
        assert_eq!(queued, vec![9, 8, 1]);

        drop(hold);
        assert!(pipeline.wait_until_idle(Duration::from_secs(5)));
        let order: Vec<_> = rx.try_iter().map(|c| c.x).collect();
        assert_eq!(order, vec![99, 9, 8, 1]);
    }

    #[test]
    fn test_wait_until_idle_times_out_while_busy() {
        let (pipeline, _rx, gate) = recording_pipeline(2);
        let hold = gate.lock();
        pipeline.submit(ChunkCoord::ORIGIN, 0);
        assert!(!pipeline.wait_until_idle(Duration::from_millis(20)));
        assert_eq!(pipeline.pending(), 1);
        drop(hold);
        assert!(pipeline.wait_until_idle(Duration::from_secs(5)));
        assert!(pipeline.is_idle());
    }

    #[test]
    fn test_drop_joins_workers() {
        let (pipeline, _rx, _gate) = recording_pipeline(3);
        assert_eq!(pipeline.worker_count(), 3);
        drop(pipeline);
    }
}
