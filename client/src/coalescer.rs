use pingboard_common::protocol::HostRecord;
use std::time::Duration;
use tokio::time::Instant;

/// Trailing-edge debounce of decoded batches.
///
/// Every non-empty arrival restarts one deadline; nothing is released until
/// traffic has been quiet for a full window. Records are kept in arrival
/// order and are not deduplicated here.
#[derive(Debug)]
pub struct UpdateCoalescer {
    window: Duration,
    buffer: Vec<HostRecord>,
    deadline: Option<Instant>,
}

impl UpdateCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buffer: Vec::new(),
            deadline: None,
        }
    }

    pub fn push(&mut self, batch: Vec<HostRecord>) {
        if batch.is_empty() {
            return;
        }
        self.buffer.extend(batch);
        self.deadline = Some(Instant::now() + self.window);
    }

    /// When the buffered records are due; `None` while the buffer is empty.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Releases everything buffered as one batch and disarms the deadline.
    pub fn flush(&mut self) -> Option<Vec<HostRecord>> {
        self.deadline = None;
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }
}
