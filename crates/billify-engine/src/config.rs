//! # Scheduler Configuration
//!
//! Cadence and timezone settings for the background jobs.

use std::time::Duration;

/// Default dispatch cadence: every 5 minutes.
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(300);

/// Default expiry cadence: every 10 minutes.
pub const DEFAULT_EXPIRY_INTERVAL: Duration = Duration::from_secs(600);

/// Configuration for the dispatch and expiry jobs.
///
/// ## Example
/// ```rust
/// use billify_engine::config::SchedulerConfig;
///
/// let config = SchedulerConfig::default().utc_offset_minutes(300); // UTC+5
/// assert_eq!(config.utc_offset_minutes, 300);
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the dispatch job sweeps for due invoices.
    pub dispatch_interval: Duration,

    /// How often the expiry job sweeps for overdue invoices.
    pub expiry_interval: Duration,

    /// The business timezone's offset from UTC, in minutes (positive east).
    /// Defines what "dated today" means for the dispatch window.
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            utc_offset_minutes: 0,
        }
    }
}

impl SchedulerConfig {
    /// Sets the dispatch sweep cadence.
    pub fn dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    /// Sets the expiry sweep cadence.
    pub fn expiry_interval(mut self, interval: Duration) -> Self {
        self.expiry_interval = interval;
        self
    }

    /// Sets the business timezone offset in minutes.
    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}
