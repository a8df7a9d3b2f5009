use crate::partition::Partition;
use std::collections::VecDeque;
use std::sync::Mutex;

/// FIFO of partitions shared by all workers of a run.
///
/// Seeded once before workers start; workers only pop.
pub struct PartitionQueue {
    inner: Mutex<VecDeque<Partition>>,
}

impl PartitionQueue {
    pub fn new(partitions: Vec<Partition>) -> Self {
        PartitionQueue {
            inner: Mutex::new(partitions.into()),
        }
    }

    /// Next partition, or `None` once the queue is drained
    pub fn pop(&self) -> Option<Partition> {
        // A panicking worker cannot leave the deque half-updated, so poisoning is ignored
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
