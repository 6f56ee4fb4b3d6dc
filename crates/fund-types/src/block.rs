use std::fmt;

use serde::{Deserialize, Serialize};

/// Block index supplied by the hosting ledger.
///
/// Block heights are the only clock the distribution core knows about:
/// voting windows open and close on them and audit records carry them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// The genesis height.
    pub const ZERO: BlockHeight = BlockHeight(0);

    pub const fn new(height: u64) -> Self {
        Self(height)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Height `blocks` after this one, or `None` on overflow.
    pub fn checked_add(self, blocks: u64) -> Option<Self> {
        self.0.checked_add(blocks).map(Self)
    }
}

impl From<u64> for BlockHeight {
    fn from(height: u64) -> Self {
        Self(height)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Half-open block range `[start, end)` during which votes are accepted.
///
/// Invariant: `end > start`. Execution is only possible once the window has
/// closed, i.e. at heights `>= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VotingWindow {
    start: BlockHeight,
    end: BlockHeight,
}

impl VotingWindow {
    /// Open a window of `period` blocks starting at `start`.
    ///
    /// Returns `None` when `period` is zero or `start + period` overflows.
    pub fn open(start: BlockHeight, period: u64) -> Option<Self> {
        if period == 0 {
            return None;
        }
        let end = start.checked_add(period)?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> BlockHeight {
        self.start
    }

    pub fn end(&self) -> BlockHeight {
        self.end
    }

    /// Returns `true` once `now` has reached the end of the window.
    pub fn has_closed_at(&self, now: BlockHeight) -> bool {
        now >= self.end
    }
}
