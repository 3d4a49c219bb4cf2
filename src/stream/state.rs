use std::fmt;

/// Lifecycle state of a [`ReadStream`](super::ReadStream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Created, no demand yet
    Idle,

    /// Delivering as fast as the cursor produces batches
    Running,

    /// No demand; nothing is delivered or fetched
    Paused,

    /// Delivering a bounded amount requested through `fetch`
    Draining,

    /// Cursor exhausted, end handler invoked
    Ended,

    /// Fetch or decode failed, exception handler invoked
    Failed,

    /// Closed by the consumer before completion
    Closed,
}

impl StreamState {
    /// No further documents or callbacks will be produced.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Ended | StreamState::Failed | StreamState::Closed
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::Running => "running",
            StreamState::Paused => "paused",
            StreamState::Draining => "draining",
            StreamState::Ended => "ended",
            StreamState::Failed => "failed",
            StreamState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How many more documents the consumer is willing to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    Bounded(u64),
    Unbounded,
}

impl Demand {
    pub fn has_remaining(&self) -> bool {
        match self {
            Demand::Bounded(n) => *n > 0,
            Demand::Unbounded => true,
        }
    }

    /// Add `n` to a bounded demand, saturating. Unbounded stays unbounded.
    pub fn add(&mut self, n: u64) {
        if let Demand::Bounded(current) = self {
            *current = current.saturating_add(n);
        }
    }

    /// Account for one delivered document.
    pub fn consume(&mut self) {
        if let Demand::Bounded(current) = self {
            *current = current.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(StreamState::Ended.is_terminal());
        assert!(StreamState::Failed.is_terminal());
        assert!(StreamState::Closed.is_terminal());
        assert!(!StreamState::Paused.is_terminal());
        assert!(!StreamState::Idle.is_terminal());
    }

    #[test]
    fn test_bounded_demand_never_negative() {
        let mut demand = Demand::Bounded(1);
        demand.consume();
        demand.consume();
        assert_eq!(demand, Demand::Bounded(0));
        assert!(!demand.has_remaining());
    }

    #[test]
    fn test_demand_add_saturates() {
        let mut demand = Demand::Bounded(u64::MAX - 1);
        demand.add(10);
        assert_eq!(demand, Demand::Bounded(u64::MAX));

        let mut demand = Demand::Unbounded;
        demand.add(10);
        demand.consume();
        assert_eq!(demand, Demand::Unbounded);
    }
}
