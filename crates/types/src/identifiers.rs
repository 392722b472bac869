//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence index of a dispatched transaction, unique per campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TxIndex(pub u64);

impl TxIndex {
    /// Position of this index within a round-robin rotation of `n` slots.
    ///
    /// Returns `None` when `n` is zero.
    pub fn slot(self, n: usize) -> Option<usize> {
        if n == 0 {
            None
        } else {
            Some((self.0 % n as u64) as usize)
        }
    }
}

impl fmt::Display for TxIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx({})", self.0)
    }
}

/// Block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// Interpret a height reported by a node, where zero means "not known yet".
    pub fn from_reported(height: u64) -> Option<Self> {
        if height == 0 {
            None
        } else {
            Some(BlockHeight(height))
        }
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}
