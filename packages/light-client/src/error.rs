//! This module defines [`LightClientError`].

use ibc_core_client::types::Height;

/// Failures surfaced by a light-client module.
///
/// These are protocol errors in the dispatcher's taxonomy: they propagate
/// verbatim as the call's failure result and no state written by the failed
/// operation survives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum LightClientError {
    /// No client state is stored under the given identifier.
    #[error("client `{client_id}` not found")]
    ClientNotFound {
        /// The client identifier.
        client_id: String,
    },

    /// No consensus state is stored for the client at the given height.
    #[error("consensus state for client `{client_id}` at height {height} not found")]
    ConsensusStateNotFound {
        /// The client identifier.
        client_id: String,
        /// The missing height.
        height: Height,
    },

    /// The client has been frozen by misbehaviour and rejects updates.
    #[error("client `{client_id}` is frozen")]
    Frozen {
        /// The client identifier.
        client_id: String,
    },

    /// A serialized record could not be decoded.
    #[error("failed to decode {0}")]
    Decode(&'static str),

    /// Header verification against the trusted consensus state failed.
    #[error("header verification failed: {0}")]
    HeaderVerification(String),

    /// A Merkle membership proof did not verify against the consensus root.
    #[error("membership verification failed for `{path}`: {reason}")]
    MembershipVerification {
        /// The proven store path on the counterparty.
        path: String,
        /// Verifier failure description.
        reason: String,
    },

    /// The proof height is newer than the client's latest trusted height.
    #[error(
        "client state height {latest} < proof height {proof_height}, \
        ensure the client has been updated"
    )]
    ProofHeightTooHigh {
        /// The client's latest height.
        latest: Height,
        /// The supplied proof height.
        proof_height: Height,
    },

    /// The client state carries no upgrade path.
    #[error("cannot upgrade client, no upgrade path set")]
    NoUpgradePath,

    /// The upgraded client does not advance the latest height.
    #[error("upgraded client height {upgraded} must be greater than current height {current}")]
    UpgradeHeightNotNewer {
        /// Height carried by the upgraded client state.
        upgraded: Height,
        /// The client's current latest height.
        current: Height,
    },

    /// A height field was out of range (zero revision height).
    #[error("invalid height: {0}")]
    InvalidHeight(String),
}
