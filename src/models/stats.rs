//! Run statistics.

use std::fmt;

/// Counters of one reconciliation run. Only ever incremented.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStatistics {
    /// Entries that cannot be handled at all (unparsable, IPv6, unknown type).
    pub broken: usize,
    /// Entries not bound to a proper subnet containing their address.
    pub lost: usize,
    /// Lost entries whose repair was actually sent.
    pub fixed: usize,
}

impl RunStatistics {
    /// Problems found, regardless of whether they were fixed.
    pub fn problems(&self) -> usize {
        self.broken + self.lost
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "broken={} lost={} fixed={}",
            self.broken, self.lost, self.fixed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problems() {
        let stats = RunStatistics {
            broken: 2,
            lost: 5,
            fixed: 3,
        };
        assert_eq!(stats.problems(), 7);
        assert_eq!(stats.to_string(), "broken=2 lost=5 fixed=3");
        assert_eq!(RunStatistics::default().problems(), 0);
    }
}
