use std::{
    fmt::{Display, Formatter},
    num::ParseIntError,
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// A point on the simulation clock, in integer ticks from simulation start.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Time(u64);

impl Time {
    pub const ZERO: Time = Time(0);

    #[must_use]
    pub const fn from_ticks(t: u64) -> Time {
        Time(t)
    }

    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }
}

impl Add<TimeSpan> for Time {
    type Output = Time;

    fn add(self, TimeSpan(ts): TimeSpan) -> Self::Output {
        Time(self.0 + ts)
    }
}

impl AddAssign<TimeSpan> for Time {
    fn add_assign(&mut self, TimeSpan(ts): TimeSpan) {
        self.0 += ts;
    }
}

impl Sub<Time> for Time {
    type Output = TimeSpan;

    fn sub(self, Time(t): Time) -> Self::Output {
        TimeSpan(self.0 - t)
    }
}

// forwards so width flags in trace formatting apply to the number
impl Display for Time {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A duration in simulation ticks, e.g. the latency of a link.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
pub struct TimeSpan(u64);

impl TimeSpan {
    #[must_use]
    pub const fn new(ts: u64) -> TimeSpan {
        TimeSpan(ts)
    }

    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }
}

impl Add for TimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        TimeSpan(self.0 + rhs.0)
    }
}

impl Display for TimeSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a node in the simulated network.
///
/// The all-ones value is reserved: as a next-hop it addresses every
/// neighbor of the sender, and in the remaining header fields it stands
/// for "not yet assigned". It can never name a real node or link
/// endpoint.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const BROADCAST: NodeId = NodeId(u32::MAX);

    #[must_use]
    pub const fn new(id: u32) -> NodeId {
        NodeId(id)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(NodeId)
    }
}

/// Process-wide unique packet identity, preserved across replication.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct PacketId(pub(crate) u64);

impl Display for PacketId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, Time, TimeSpan};

    #[test]
    fn clock_arithmetic() {
        let t = Time::from_ticks(20) + TimeSpan::new(10);
        assert_eq!(t, Time::from_ticks(30));
        assert_eq!(t - Time::from_ticks(5), TimeSpan::new(25));
    }

    #[test]
    fn broadcast_is_reserved() {
        assert!(NodeId::BROADCAST.is_broadcast());
        assert!(!NodeId::new(0).is_broadcast());
        assert_eq!(NodeId::BROADCAST.to_string(), u32::MAX.to_string());
    }
}
