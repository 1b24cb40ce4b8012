//! Checkpoint cadence

/// Counts accepted events and signals when a checkpoint is due
#[derive(Debug, Clone)]
pub struct Checkpointer {
    batch_size: usize,
    since_last: usize,
}

impl Checkpointer {
    /// Checkpoint every `batch_size` events; a size of zero is treated as one
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            since_last: 0,
        }
    }

    /// Count one event whose offset has already been applied.
    ///
    /// Returns `true` when a checkpoint must be emitted now.
    pub fn record_event(&mut self) -> bool {
        self.since_last += 1;
        if self.since_last >= self.batch_size {
            self.since_last = 0;
            true
        } else {
            false
        }
    }

    /// Events accepted since the last checkpoint
    pub fn pending(&self) -> usize {
        self.since_last
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
