use serde::{Deserialize, Serialize};

/// Outcome of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The URL was already accepted by this queue and will not be fetched again.
    Duplicate,
}

/// A URL whose fetch or handling failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub url: String,
    pub error: String,
}

/// Summary of one [`FetchQueue::run`](super::FetchQueue::run).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueReport {
    /// Pages fetched and handled successfully.
    pub completed: usize,
    pub fetch_failures: Vec<FailedJob>,
    pub handler_failures: Vec<FailedJob>,
}

impl QueueReport {
    pub fn failed(&self) -> usize {
        self.fetch_failures.len() + self.handler_failures.len()
    }

    /// Total jobs taken off the queue.
    pub fn processed(&self) -> usize {
        self.completed + self.failed()
    }

    pub fn merge(&mut self, other: QueueReport) {
        self.completed += other.completed;
        self.fetch_failures.extend(other.fetch_failures);
        self.handler_failures.extend(other.handler_failures);
    }
}
