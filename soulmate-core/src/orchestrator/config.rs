use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

fn default_min_reply_delay_ms() -> u64 {
    500
}

fn default_max_reply_delay_ms() -> u64 {
    2000
}

fn default_comment_reply_delay_ms() -> u64 {
    2000
}

/// Artificial latency that makes replies feel typed by a person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacingConfig {
    /// Lower bound (inclusive) of the pause between fanned-out phone messages.
    #[serde(default = "default_min_reply_delay_ms")]
    pub min_reply_delay_ms: u64,
    /// Upper bound (exclusive) of the same pause.
    #[serde(default = "default_max_reply_delay_ms")]
    pub max_reply_delay_ms: u64,
    /// Delay before a character answers a comment on a moment.
    #[serde(default = "default_comment_reply_delay_ms")]
    pub comment_reply_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_reply_delay_ms: default_min_reply_delay_ms(),
            max_reply_delay_ms: default_max_reply_delay_ms(),
            comment_reply_delay_ms: default_comment_reply_delay_ms(),
        }
    }
}

impl PacingConfig {
    /// Uniform draw from `[min, max)`; collapses to `min` on an empty range.
    pub fn reply_delay(&self) -> Duration {
        let ms = if self.max_reply_delay_ms > self.min_reply_delay_ms {
            rand::thread_rng().gen_range(self.min_reply_delay_ms..self.max_reply_delay_ms)
        } else {
            self.min_reply_delay_ms
        };
        Duration::from_millis(ms)
    }

    pub fn comment_reply_delay(&self) -> Duration {
        Duration::from_millis(self.comment_reply_delay_ms)
    }
}
