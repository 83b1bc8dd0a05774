//! This module defines [`PrecompileError`].

use alloy_primitives::{Address, Selector};
use ibc_precompile_codec::CodecError;
use ibc_precompile_light_client::LightClientError;

use crate::connection::ConnectionError;

/// Failure of a precompile call.
///
/// Every variant surfaces to the invoking EVM bytecode as a call failure and
/// reverts the call's state changes; nothing here is retried.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum PrecompileError {
    /// The input did not carry a full 4-byte function selector.
    #[error("input shorter than a function selector")]
    InputTooShort,

    /// The selector does not match any precompile operation.
    #[error("unknown function selector {0}")]
    UnknownSelector(Selector),

    /// A mutating operation was invoked from a static (read-only) call.
    #[error("write protection: cannot mutate state in a static call")]
    WriteProtection,

    /// The caller does not hold an allow-list role admitting this operation.
    #[error("caller {caller} is not authorized to call this function")]
    Unauthorized {
        /// The rejected caller address.
        caller: Address,
    },

    /// The operation payload did not decode against its field layout.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The light-client module rejected the operation.
    #[error(transparent)]
    Client(#[from] LightClientError),

    /// The connection handshake rejected the operation.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
