#![allow(dead_code)]

use alloy::{primitives::U256, rpc::types::Log, sol};
use event_feed::{
    ContractEvents, SolEventDecoder,
    test_utils::{MockLogSource, event_log},
};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    event CountIncreased(uint256 newCount);
}

pub type CounterEvents = ContractEvents<MockLogSource, SolEventDecoder<CountIncreased>>;

pub fn count(n: u64) -> CountIncreased {
    CountIncreased { newCount: U256::from(n) }
}

/// A `CountIncreased(n)` log mined in block `n`.
pub fn count_log(n: u64) -> Log {
    event_log(&count(n), n, 0)
}

/// Binds a clone of `source` so the test keeps a handle for inspection.
pub fn counter_events(source: &MockLogSource) -> CounterEvents {
    ContractEvents::new(source.clone(), SolEventDecoder::new())
}
