//! Turning raw logs into typed events.
//!
//! [`EventDecoder`] is the seam between the engine and the ABI. Two implementations ship with
//! the crate:
//!
//! * [`SolEventDecoder`] for a single event known at compile time (anything generated by
//!   [`alloy::sol!`]).
//! * [`AbiDecoder`] for events described by a JSON ABI at runtime; it resolves events by name
//!   and yields [`DecodedEvent`] values.

use std::{fmt, marker::PhantomData};

use alloy::{
    dyn_abi::{DecodedEvent, EventExt},
    json_abi::{Event, JsonAbi},
    primitives::B256,
    rpc::types::Log,
    sol_types::SolEvent,
};

use crate::DecodeError;

/// Decodes raw logs of named events.
///
/// Implementations must be pure: the same log decoded under the same name always yields the
/// same result.
pub trait EventDecoder: Send + Sync + 'static {
    /// The typed value a successfully decoded log becomes.
    type Event: Send + 'static;

    /// Returns the selector of the event called `name`, or `None` if this decoder doesn't know
    /// it.
    fn selector(&self, name: &str) -> Option<B256>;

    /// `true` if the event called `name` is anonymous: its logs don't carry the selector in
    /// topic 0, and its first indexed parameter sits there instead.
    fn is_anonymous(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    /// Decodes `log` as an occurrence of the event called `name`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] identifying the log when it doesn't match the event's layout
    /// or the name is unknown.
    fn decode(&self, name: &str, log: &Log) -> Result<Self::Event, DecodeError>;
}

/// Decoder for exactly one compile-time event type.
pub struct SolEventDecoder<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E: SolEvent> SolEventDecoder<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { _event: PhantomData }
    }

    /// The event name, i.e. its signature up to the parameter list.
    #[must_use]
    pub fn name() -> &'static str {
        E::SIGNATURE.split_once('(').map_or(E::SIGNATURE, |(name, _)| name)
    }
}

impl<E: SolEvent> Default for SolEventDecoder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for SolEventDecoder<E> {
    fn clone(&self) -> Self {
        Self { _event: PhantomData }
    }
}

impl<E: SolEvent> fmt::Debug for SolEventDecoder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolEventDecoder").field("event", &E::SIGNATURE).finish()
    }
}

impl<E: SolEvent + Send + 'static> EventDecoder for SolEventDecoder<E> {
    type Event = E;

    fn selector(&self, name: &str) -> Option<B256> {
        (name == Self::name()).then_some(E::SIGNATURE_HASH)
    }

    fn is_anonymous(&self, name: &str) -> bool {
        E::ANONYMOUS && name == Self::name()
    }

    fn decode(&self, name: &str, log: &Log) -> Result<E, DecodeError> {
        if name != Self::name() {
            let reason = format!("decoder only handles {}", E::SIGNATURE);
            return Err(DecodeError::new(name, log, reason));
        }
        E::decode_log_data(log.data()).map_err(|err| DecodeError::new(name, log, err))
    }
}

/// Decoder over a runtime JSON ABI.
///
/// Overloaded events share a name; the first overload listed in the ABI is the one a name
/// resolves to.
#[derive(Debug, Clone)]
pub struct AbiDecoder {
    abi: JsonAbi,
}

impl AbiDecoder {
    #[must_use]
    pub fn new(abi: JsonAbi) -> Self {
        Self { abi }
    }

    #[must_use]
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    fn event(&self, name: &str) -> Option<&Event> {
        self.abi.event(name).and_then(|overloads| overloads.first())
    }
}

impl From<JsonAbi> for AbiDecoder {
    fn from(abi: JsonAbi) -> Self {
        Self::new(abi)
    }
}

impl EventDecoder for AbiDecoder {
    type Event = DecodedEvent;

    fn selector(&self, name: &str) -> Option<B256> {
        self.event(name).map(Event::selector)
    }

    fn is_anonymous(&self, name: &str) -> bool {
        self.event(name).is_some_and(|event| event.anonymous)
    }

    fn decode(&self, name: &str, log: &Log) -> Result<DecodedEvent, DecodeError> {
        let event =
            self.event(name).ok_or_else(|| DecodeError::new(name, log, "event not in ABI"))?;
        if log.topics().first() != Some(&event.selector()) && !event.anonymous {
            return Err(DecodeError::new(name, log, "topic 0 does not match the event selector"));
        }
        event.decode_log(log.data()).map_err(|err| DecodeError::new(name, log, err))
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        dyn_abi::DynSolValue,
        primitives::{Address, LogData, U256, address},
        sol,
    };

    use super::*;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    fn log_with(data: LogData) -> Log {
        Log {
            inner: alloy::primitives::Log { address: Address::ZERO, data },
            transaction_hash: Some(B256::repeat_byte(9)),
            log_index: Some(4),
            ..Default::default()
        }
    }

    fn transfer() -> Transfer {
        Transfer {
            from: address!("0x00000000000000000000000000000000000000aa"),
            to: address!("0x00000000000000000000000000000000000000bb"),
            value: U256::from(42),
        }
    }

    #[test]
    fn sol_decoder_knows_only_its_event() {
        let decoder = SolEventDecoder::<Transfer>::new();

        assert_eq!(SolEventDecoder::<Transfer>::name(), "Transfer");
        assert_eq!(decoder.selector("Transfer"), Some(Transfer::SIGNATURE_HASH));
        assert_eq!(decoder.selector("Approval"), None);
        assert!(!decoder.is_anonymous("Transfer"));
    }

    #[test]
    fn sol_decoder_round_trips_a_log() {
        let decoder = SolEventDecoder::<Transfer>::new();
        let log = log_with(transfer().encode_log_data());

        assert_eq!(decoder.decode("Transfer", &log), Ok(transfer()));
    }

    #[test]
    fn sol_decoder_failure_identifies_the_log() {
        let decoder = SolEventDecoder::<Transfer>::new();
        let log = log_with(LogData::new_unchecked(vec![B256::ZERO], Default::default()));

        let err = decoder.decode("Transfer", &log).unwrap_err();

        assert_eq!(err.event, "Transfer");
        assert_eq!(err.tx_hash, Some(B256::repeat_byte(9)));
        assert_eq!(err.log_index, Some(4));
    }

    #[test]
    fn abi_decoder_resolves_events_by_name() -> anyhow::Result<()> {
        let abi = JsonAbi::parse([
            "event Transfer(address indexed from, address indexed to, uint256 value)",
        ])?;
        let decoder = AbiDecoder::new(abi);

        assert_eq!(decoder.selector("Transfer"), Some(Transfer::SIGNATURE_HASH));
        assert_eq!(decoder.selector("Approval"), None);

        let decoded = decoder.decode("Transfer", &log_with(transfer().encode_log_data()))?;
        assert_eq!(decoded.indexed, vec![
            DynSolValue::Address(transfer().from),
            DynSolValue::Address(transfer().to),
        ]);
        assert_eq!(decoded.body, vec![DynSolValue::Uint(U256::from(42), 256)]);

        Ok(())
    }

    #[test]
    fn abi_decoder_decodes_anonymous_events() -> anyhow::Result<()> {
        let abi = JsonAbi::parse(["event Ping(uint256 indexed seq) anonymous"])?;
        let decoder = AbiDecoder::new(abi);
        let seq = B256::with_last_byte(7);
        let log = log_with(LogData::new_unchecked(vec![seq], Default::default()));

        assert!(decoder.is_anonymous("Ping"));
        assert!(!decoder.is_anonymous("Pong"));
        let decoded = decoder.decode("Ping", &log)?;
        assert_eq!(decoded.indexed, vec![DynSolValue::Uint(U256::from(7), 256)]);

        Ok(())
    }

    #[test]
    fn abi_decoder_rejects_foreign_selector() -> anyhow::Result<()> {
        let abi = JsonAbi::parse(["event Approval(address indexed owner, uint256 value)"])?;
        let decoder = AbiDecoder::new(abi);

        let err = decoder.decode("Approval", &log_with(transfer().encode_log_data())).unwrap_err();

        assert!(err.reason.contains("topic 0"));
        Ok(())
    }
}
