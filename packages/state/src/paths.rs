//! IBC store paths and their backend key derivation.
//!
//! Paths follow the ICS-24 host conventions so that counterparty chains can
//! prove our records under the same keys `ibc-go` would use. The backend key
//! for a path is the keccak-256 hash of its bytes; hashing (rather than
//! truncating to an address width) keeps distinct paths from aliasing.

use alloy_primitives::{keccak256, B256};

/// Store path of the client sequence counter.
pub const NEXT_CLIENT_SEQ: &str = "nextClientSeq";

/// Store path of the connection sequence counter.
pub const NEXT_CONNECTION_SEQ: &str = "nextConnSeq";

/// The commitment prefix under which counterparty chains publish IBC state.
pub const COMMITMENT_PREFIX: &[u8] = b"ibc";

/// Backend slot key for a store path.
#[must_use]
pub fn key(path: &str) -> B256 {
    keccak256(path.as_bytes())
}

/// `clients/{client_id}/clientState`
#[must_use]
pub fn client_state(client_id: &str) -> String {
    format!("clients/{client_id}/clientState")
}

/// `clients/{client_id}/consensusStates/{revision}-{height}`
#[must_use]
pub fn consensus_state(client_id: &str, revision_number: u64, revision_height: u64) -> String {
    format!("clients/{client_id}/consensusStates/{revision_number}-{revision_height}")
}

/// `connections/{connection_id}`
#[must_use]
pub fn connection(connection_id: &str) -> String {
    format!("connections/{connection_id}")
}

#[cfg(test)]
mod tests {
    use super::{client_state, connection, consensus_state, key};

    #[test]
    fn path_layout() {
        assert_eq!("clients/07-tendermint-0/clientState", client_state("07-tendermint-0"));
        assert_eq!(
            "clients/07-tendermint-0/consensusStates/1-42",
            consensus_state("07-tendermint-0", 1, 42)
        );
        assert_eq!("connections/connection-3", connection("connection-3"));
    }

    #[test]
    fn distinct_paths_get_distinct_keys() {
        // The truncation scheme this replaces could alias long paths that
        // share a prefix; the hash must not.
        let a = key(&consensus_state("07-tendermint-0", 0, 1));
        let b = key(&consensus_state("07-tendermint-0", 0, 2));
        assert_ne!(a, b);
    }
}
