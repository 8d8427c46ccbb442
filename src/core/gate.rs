//! Completion gate shared by the two relay directions
//!
//! A countdown that fires once. The session waits on it, each direction
//! counts it down when it stops.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// When the session may tear down a relay pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayWait {
    /// Release as soon as either direction ends
    #[default]
    FirstFinisher,
    /// Release only after both directions end
    BothDirections,
}

impl RelayWait {
    /// Number of count-downs needed to release the gate
    pub fn count(&self) -> usize {
        match self {
            RelayWait::FirstFinisher => 1,
            RelayWait::BothDirections => 2,
        }
    }
}

impl FromStr for RelayWait {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(RelayWait::FirstFinisher),
            "both" => Ok(RelayWait::BothDirections),
            other => Err(format!(
                "Invalid relay wait '{}'. Expected 'first' or 'both'",
                other
            )),
        }
    }
}

impl std::fmt::Display for RelayWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayWait::FirstFinisher => write!(f, "first"),
            RelayWait::BothDirections => write!(f, "both"),
        }
    }
}

/// Single-fire countdown gate
#[derive(Debug)]
pub struct CompletionGate {
    remaining: AtomicUsize,
    released: CancellationToken,
}

impl CompletionGate {
    /// Create a gate that opens after `count` count-downs. Zero opens immediately.
    pub fn new(count: usize) -> Self {
        let released = CancellationToken::new();
        if count == 0 {
            released.cancel();
        }
        Self {
            remaining: AtomicUsize::new(count),
            released,
        }
    }

    /// Record one finished party. Extra calls past zero are ignored.
    pub fn count_down(&self) {
        let prev = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if prev == Ok(1) {
            self.released.cancel();
        }
    }

    /// Wait until the gate opens
    pub async fn wait(&self) {
        self.released.cancelled().await;
    }

    pub fn is_released(&self) -> bool {
        self.released.is_cancelled()
    }
}
