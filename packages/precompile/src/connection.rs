//! Connection handshake operations: init, try, ack, and confirm.

use ibc_core_client::types::Height;
use ibc_precompile_codec::{CodecError, Decoder, Encoder};
use ibc_precompile_light_client::LightClientModule;
use ibc_precompile_state::{paths, PrecompileStore, StateDb, StoreReader, StoreWriter};
use ibc_proto::ibc::core::client::v1::Height as RawHeight;
use ibc_proto::ibc::core::commitment::v1::MerklePrefix;
use ibc_proto::ibc::core::connection::v1::{ConnectionEnd, Counterparty, State, Version};
use prost::Message;

use crate::{sequence, version, PrecompileError};

/// Failures of the connection handshake state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConnectionError {
    /// No connection record exists under the given identifier.
    #[error("connection `{connection_id}` not found")]
    NotFound {
        /// The connection identifier.
        connection_id: String,
    },

    /// A serialized handshake record could not be decoded.
    #[error("failed to decode {0}")]
    Decode(&'static str),

    /// The stored connection is not in the state this handshake step expects.
    #[error("connection state is not {expected} (got {got})")]
    InvalidState {
        /// State the handshake step requires.
        expected: &'static str,
        /// State found in the store.
        got: &'static str,
    },

    /// The proposed version is not among those agreed on earlier.
    #[error("version is not supported")]
    UnsupportedVersion,

    /// No version overlaps with the counterparty's offer.
    #[error("no common version with the counterparty")]
    NoCommonVersion,

    /// The claimed consensus height has not been reached by the client.
    #[error(
        "consensus height {consensus_height} must be below the client's \
        latest height {latest_height}"
    )]
    InvalidConsensusHeight {
        /// Height claimed by the counterparty.
        consensus_height: Height,
        /// The client's latest height.
        latest_height: Height,
    },
}

/// Arguments of `connOpenInit(string,bytes,bytes,uint64)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnOpenInitInput {
    /// Local client standing in for the counterparty chain.
    pub client_id: String,
    /// Protobuf counterparty descriptor (client id, connection id, prefix).
    pub counterparty: Vec<u8>,
    /// Optional protobuf version; empty selects all compatible versions.
    pub version: Vec<u8>,
    /// Packet delay period in nanoseconds.
    pub delay_period: u64,
}

impl ConnOpenInitInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            client_id: decoder.read_string()?,
            counterparty: decoder.read_bytes()?.to_vec(),
            version: decoder.read_bytes()?.to_vec(),
            delay_period: decoder.read_u64()?,
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .string(&self.client_id)
            .bytes(&self.counterparty)
            .bytes(&self.version)
            .u64(self.delay_period)
            .build()
    }
}

/// Arguments of
/// `connOpenTry(bytes,uint64,string,bytes,bytes,bytes,bytes,bytes,bytes,bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnOpenTryInput {
    /// Protobuf counterparty descriptor; its connection id is the INIT end.
    pub counterparty: Vec<u8>,
    /// Packet delay period in nanoseconds.
    pub delay_period: u64,
    /// Local client standing in for the counterparty chain.
    pub client_id: String,
    /// `Any`-encoded client state the counterparty stores for this chain.
    pub client_state: Vec<u8>,
    /// JSON list of the versions the counterparty offered at INIT.
    pub counterparty_versions: Vec<u8>,
    /// Proof of the counterparty's INIT connection record.
    pub proof_init: Vec<u8>,
    /// Proof of the client state the counterparty stores for this chain.
    pub proof_client: Vec<u8>,
    /// Proof of the consensus state the counterparty stores for this chain.
    pub proof_consensus: Vec<u8>,
    /// Protobuf height the proofs were generated at.
    pub proof_height: Vec<u8>,
    /// Protobuf height of this chain the counterparty client has reached.
    pub consensus_height: Vec<u8>,
}

impl ConnOpenTryInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            counterparty: decoder.read_bytes()?.to_vec(),
            delay_period: decoder.read_u64()?,
            client_id: decoder.read_string()?,
            client_state: decoder.read_bytes()?.to_vec(),
            counterparty_versions: decoder.read_bytes()?.to_vec(),
            proof_init: decoder.read_bytes()?.to_vec(),
            proof_client: decoder.read_bytes()?.to_vec(),
            proof_consensus: decoder.read_bytes()?.to_vec(),
            proof_height: decoder.read_bytes()?.to_vec(),
            consensus_height: decoder.read_bytes()?.to_vec(),
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .bytes(&self.counterparty)
            .u64(self.delay_period)
            .string(&self.client_id)
            .bytes(&self.client_state)
            .bytes(&self.counterparty_versions)
            .bytes(&self.proof_init)
            .bytes(&self.proof_client)
            .bytes(&self.proof_consensus)
            .bytes(&self.proof_height)
            .bytes(&self.consensus_height)
            .build()
    }
}

/// Arguments of
/// `connOpenAck(string,bytes,bytes,string,bytes,bytes,bytes,bytes,bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnOpenAckInput {
    /// Local connection opened at INIT.
    pub connection_id: String,
    /// `Any`-encoded client state the counterparty stores for this chain.
    pub client_state: Vec<u8>,
    /// Protobuf version the counterparty selected at TRYOPEN.
    pub version: Vec<u8>,
    /// The counterparty's connection identifier.
    pub counterparty_connection_id: String,
    /// Proof of the counterparty's TRYOPEN connection record.
    pub proof_try: Vec<u8>,
    /// Proof of the client state the counterparty stores for this chain.
    pub proof_client: Vec<u8>,
    /// Proof of the consensus state the counterparty stores for this chain.
    pub proof_consensus: Vec<u8>,
    /// Protobuf height the proofs were generated at.
    pub proof_height: Vec<u8>,
    /// Protobuf height of this chain the counterparty client has reached.
    pub consensus_height: Vec<u8>,
}

impl ConnOpenAckInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            connection_id: decoder.read_string()?,
            client_state: decoder.read_bytes()?.to_vec(),
            version: decoder.read_bytes()?.to_vec(),
            counterparty_connection_id: decoder.read_string()?,
            proof_try: decoder.read_bytes()?.to_vec(),
            proof_client: decoder.read_bytes()?.to_vec(),
            proof_consensus: decoder.read_bytes()?.to_vec(),
            proof_height: decoder.read_bytes()?.to_vec(),
            consensus_height: decoder.read_bytes()?.to_vec(),
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .string(&self.connection_id)
            .bytes(&self.client_state)
            .bytes(&self.version)
            .string(&self.counterparty_connection_id)
            .bytes(&self.proof_try)
            .bytes(&self.proof_client)
            .bytes(&self.proof_consensus)
            .bytes(&self.proof_height)
            .bytes(&self.consensus_height)
            .build()
    }
}

/// Arguments of `connOpenConfirm(string,bytes,bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnOpenConfirmInput {
    /// Local connection opened at TRYOPEN.
    pub connection_id: String,
    /// Proof of the counterparty's OPEN connection record.
    pub proof_ack: Vec<u8>,
    /// Protobuf height the proof was generated at.
    pub proof_height: Vec<u8>,
}

impl ConnOpenConfirmInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            connection_id: decoder.read_string()?,
            proof_ack: decoder.read_bytes()?.to_vec(),
            proof_height: decoder.read_bytes()?.to_vec(),
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .string(&self.connection_id)
            .bytes(&self.proof_ack)
            .bytes(&self.proof_height)
            .build()
    }
}

fn merkle_prefix() -> MerklePrefix {
    MerklePrefix {
        key_prefix: paths::COMMITMENT_PREFIX.to_vec(),
    }
}

fn decode_counterparty(bytes: &[u8]) -> Result<Counterparty, ConnectionError> {
    Counterparty::decode(bytes).map_err(|_| ConnectionError::Decode("counterparty"))
}

fn decode_consensus_height(bytes: &[u8]) -> Result<Height, ConnectionError> {
    let raw = RawHeight::decode(bytes).map_err(|_| ConnectionError::Decode("consensus height"))?;
    Height::try_from(raw).map_err(|_| ConnectionError::Decode("consensus height"))
}

fn state_name(state: i32) -> &'static str {
    match State::try_from(state) {
        Ok(State::Init) => "INIT",
        Ok(State::Tryopen) => "TRYOPEN",
        Ok(State::Open) => "OPEN",
        _ => "UNINITIALIZED",
    }
}

fn read_connection(
    store: &dyn StoreReader,
    connection_id: &str,
) -> Result<ConnectionEnd, ConnectionError> {
    let bytes = store
        .get(&paths::connection(connection_id))
        .ok_or_else(|| ConnectionError::NotFound {
            connection_id: connection_id.to_string(),
        })?;
    ConnectionEnd::decode(bytes.as_slice()).map_err(|_| ConnectionError::Decode("connection end"))
}

fn write_connection(store: &mut dyn StoreWriter, connection_id: &str, connection: &ConnectionEnd) {
    store.set(&paths::connection(connection_id), connection.encode_to_vec());
}

/// Starts the handshake: records an INIT connection end against an existing
/// client and returns the assigned `connection-<n>` identifier.
pub(crate) fn conn_open_init<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
) -> Result<Vec<u8>, PrecompileError> {
    let input = ConnOpenInitInput::decode(payload)?;
    let counterparty = decode_counterparty(&input.counterparty)?;

    let versions = if input.version.is_empty() {
        version::compatible_versions()
    } else {
        let proposed = Version::decode(input.version.as_slice())
            .map_err(|_| ConnectionError::Decode("version"))?;
        if !version::is_supported_version(&version::compatible_versions(), &proposed) {
            return Err(ConnectionError::UnsupportedVersion.into());
        }
        vec![proposed]
    };

    // The client must exist before a connection can reference it.
    module.latest_height(store, &input.client_id)?;

    let seq = sequence::peek(store, paths::NEXT_CONNECTION_SEQ);
    let connection_id = format!("connection-{seq}");

    let connection = ConnectionEnd {
        client_id: input.client_id.clone(),
        versions,
        state: State::Init as i32,
        counterparty: Some(counterparty),
        delay_period: input.delay_period,
    };
    sequence::bump(store, paths::NEXT_CONNECTION_SEQ, seq);
    write_connection(store, &connection_id, &connection);

    tracing::info!(connection_id, client_id = %input.client_id, "connection handshake INIT");
    Ok(connection_id.into_bytes())
}

/// Answers a counterparty's INIT: verifies the INIT record and the client
/// state it advertises, then records a TRYOPEN end under a fresh identifier.
pub(crate) fn conn_open_try<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
) -> Result<Vec<u8>, PrecompileError> {
    let input = ConnOpenTryInput::decode(payload)?;
    let counterparty = decode_counterparty(&input.counterparty)?;
    let counterparty_versions = version::decode_version_list(&input.counterparty_versions)?;
    let picked = version::pick_version(&version::compatible_versions(), &counterparty_versions)?;

    // What the counterparty committed at INIT: its own end, pointing back at
    // us with an unset connection id.
    let expected_counterparty = Counterparty {
        client_id: input.client_id.clone(),
        connection_id: String::new(),
        prefix: Some(merkle_prefix()),
    };
    let expected_connection = ConnectionEnd {
        client_id: counterparty.client_id.clone(),
        versions: counterparty_versions,
        state: State::Init as i32,
        counterparty: Some(expected_counterparty),
        delay_period: input.delay_period,
    };

    module.verify_client_state(
        store,
        &input.client_id,
        &input.proof_height,
        &counterparty.client_id,
        &input.proof_client,
        &input.client_state,
    )?;
    module.verify_connection_state(
        store,
        &input.client_id,
        &input.proof_height,
        &counterparty.connection_id,
        &input.proof_init,
        &expected_connection.encode_to_vec(),
    )?;

    let seq = sequence::peek(store, paths::NEXT_CONNECTION_SEQ);
    let connection_id = format!("connection-{seq}");

    let connection = ConnectionEnd {
        client_id: input.client_id.clone(),
        versions: vec![picked],
        state: State::Tryopen as i32,
        counterparty: Some(counterparty),
        delay_period: input.delay_period,
    };
    sequence::bump(store, paths::NEXT_CONNECTION_SEQ, seq);
    write_connection(store, &connection_id, &connection);

    tracing::info!(connection_id, client_id = %input.client_id, "connection handshake TRYOPEN");
    Ok(connection_id.into_bytes())
}

/// Completes the handshake on the INIT side: verifies the counterparty's
/// TRYOPEN record and opens the local end.
pub(crate) fn conn_open_ack<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
) -> Result<Vec<u8>, PrecompileError> {
    let input = ConnOpenAckInput::decode(payload)?;
    let mut connection = read_connection(store, &input.connection_id)?;

    if connection.state != State::Init as i32 {
        return Err(ConnectionError::InvalidState {
            expected: "INIT",
            got: state_name(connection.state),
        }
        .into());
    }

    let selected = Version::decode(input.version.as_slice())
        .map_err(|_| ConnectionError::Decode("version"))?;
    if !version::is_supported_version(&connection.versions, &selected) {
        return Err(ConnectionError::UnsupportedVersion.into());
    }

    let consensus_height = decode_consensus_height(&input.consensus_height)?;
    let latest_height = module.latest_height(store, &connection.client_id)?;
    if consensus_height >= latest_height {
        return Err(ConnectionError::InvalidConsensusHeight {
            consensus_height,
            latest_height,
        }
        .into());
    }

    let counterparty = connection
        .counterparty
        .clone()
        .ok_or(ConnectionError::Decode("connection counterparty"))?;

    // What the counterparty committed at TRYOPEN: its own end, pointing back
    // at this connection.
    let expected_counterparty = Counterparty {
        client_id: connection.client_id.clone(),
        connection_id: input.connection_id.clone(),
        prefix: Some(merkle_prefix()),
    };
    let expected_connection = ConnectionEnd {
        client_id: counterparty.client_id.clone(),
        versions: vec![selected.clone()],
        state: State::Tryopen as i32,
        counterparty: Some(expected_counterparty),
        delay_period: connection.delay_period,
    };

    module.verify_connection_state(
        store,
        &connection.client_id,
        &input.proof_height,
        &input.counterparty_connection_id,
        &input.proof_try,
        &expected_connection.encode_to_vec(),
    )?;
    module.verify_client_state(
        store,
        &connection.client_id,
        &input.proof_height,
        &counterparty.client_id,
        &input.proof_client,
        &input.client_state,
    )?;

    connection.state = State::Open as i32;
    connection.versions = vec![selected];
    if let Some(counterparty) = connection.counterparty.as_mut() {
        counterparty.connection_id = input.counterparty_connection_id.clone();
    }
    write_connection(store, &input.connection_id, &connection);

    tracing::info!(connection_id = %input.connection_id, "connection handshake OPEN (ack)");
    Ok(Vec::new())
}

/// Completes the handshake on the TRYOPEN side: verifies the counterparty's
/// OPEN record and opens the local end.
pub(crate) fn conn_open_confirm<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
) -> Result<Vec<u8>, PrecompileError> {
    let input = ConnOpenConfirmInput::decode(payload)?;
    let mut connection = read_connection(store, &input.connection_id)?;

    if connection.state != State::Tryopen as i32 {
        return Err(ConnectionError::InvalidState {
            expected: "TRYOPEN",
            got: state_name(connection.state),
        }
        .into());
    }

    let counterparty = connection
        .counterparty
        .clone()
        .ok_or(ConnectionError::Decode("connection counterparty"))?;

    let expected_counterparty = Counterparty {
        client_id: connection.client_id.clone(),
        connection_id: input.connection_id.clone(),
        prefix: Some(merkle_prefix()),
    };
    let expected_connection = ConnectionEnd {
        client_id: counterparty.client_id.clone(),
        versions: connection.versions.clone(),
        state: State::Open as i32,
        counterparty: Some(expected_counterparty),
        delay_period: connection.delay_period,
    };

    module.verify_connection_state(
        store,
        &connection.client_id,
        &input.proof_height,
        &counterparty.connection_id,
        &input.proof_ack,
        &expected_connection.encode_to_vec(),
    )?;

    connection.state = State::Open as i32;
    write_connection(store, &input.connection_id, &connection);

    tracing::info!(connection_id = %input.connection_id, "connection handshake OPEN (confirm)");
    Ok(Vec::new())
}
