use std::time::{Duration, Instant};

use crate::config::ServerSettings;

/// Default capacity for the job queue
pub const QUEUE_SIZE: usize = 100;

/// Default number of worker tasks
pub const WORKERS: usize = 4;

/// Configuration for the API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Number of worker tasks draining the job queue
    pub workers: usize,

    /// Capacity of the job queue
    pub queue_size: usize,

    /// How long a handler waits for its job's result
    pub request_timeout: Duration,

    /// When the server started, for uptime reporting
    pub started_at: Instant,
}

impl ApiConfig {
    pub fn from_settings(server: &ServerSettings) -> Self {
        Self {
            workers: server.workers,
            queue_size: server.queue_size,
            request_timeout: Duration::from_secs(server.request_timeout_secs),
            started_at: Instant::now(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            workers: WORKERS,
            queue_size: QUEUE_SIZE,
            request_timeout: Duration::from_secs(180),
            started_at: Instant::now(),
        }
    }
}
