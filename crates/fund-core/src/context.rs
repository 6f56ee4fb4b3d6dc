use fund_types::{Address, BlockHeight};

/// Who is calling and at which block height.
///
/// The hosting environment authenticates callers and supplies the current
/// height; the core trusts both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub block_height: BlockHeight,
}

impl CallContext {
    pub fn new(caller: Address, block_height: u64) -> Self {
        Self {
            caller,
            block_height: BlockHeight::new(block_height),
        }
    }
}
