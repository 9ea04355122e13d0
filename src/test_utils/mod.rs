//! Helpers for testing code built on this crate: a scripted [`LogSource`](crate::LogSource),
//! log builders and assertion macros.

#[macro_use]
pub mod macros;
mod mock;

use alloy::{
    primitives::{Address, B256, LogData},
    rpc::types::Log,
    sol_types::SolEvent,
};

pub use mock::{MockFeed, MockLogSource};

/// Builds a mined log carrying `event`, emitted by the zero address at `block`/`log_index`.
///
/// Block and transaction hashes are derived from the position, so distinct positions give
/// distinct identities.
#[must_use]
pub fn event_log<E: SolEvent>(event: &E, block: u64, log_index: u64) -> Log {
    raw_log(Address::ZERO, event.encode_log_data(), block, log_index)
}

/// Builds a mined log with arbitrary data.
#[must_use]
pub fn raw_log(address: Address, data: LogData, block: u64, log_index: u64) -> Log {
    let position = [block.to_be_bytes(), log_index.to_be_bytes()].concat();
    Log {
        inner: alloy::primitives::Log { address, data },
        block_hash: Some(B256::left_padding_from(&block.to_be_bytes())),
        block_number: Some(block),
        transaction_hash: Some(B256::left_padding_from(&position)),
        log_index: Some(log_index),
        ..Default::default()
    }
}

/// A log whose topic 0 claims to be `E` but whose data cannot be decoded as `E`.
#[must_use]
pub fn undecodable_log<E: SolEvent>(block: u64, log_index: u64) -> Log {
    raw_log(
        Address::ZERO,
        LogData::new_unchecked(vec![E::SIGNATURE_HASH], vec![0xff].into()),
        block,
        log_index,
    )
}
