//! Client lifecycle operations: create, update, and upgrade.

use ibc_precompile_codec::{CodecError, Decoder, Encoder};
use ibc_precompile_light_client::LightClientModule;
use ibc_precompile_state::{paths, PrecompileStore, StateDb};

use crate::{sequence, PrecompileError};

/// Arguments of `createClient(bytes,bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateClientInput {
    /// Serialized client state in the module's native encoding.
    pub client_state: Vec<u8>,
    /// Serialized consensus state at the client state's latest height.
    pub consensus_state: Vec<u8>,
}

impl CreateClientInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            client_state: decoder.read_bytes()?.to_vec(),
            consensus_state: decoder.read_bytes()?.to_vec(),
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .bytes(&self.client_state)
            .bytes(&self.consensus_state)
            .build()
    }
}

/// Arguments of `updateClient(string,bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateClientInput {
    /// Identifier of the client to update.
    pub client_id: String,
    /// Serialized client message (header).
    pub client_message: Vec<u8>,
}

impl UpdateClientInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            client_id: decoder.read_string()?,
            client_message: decoder.read_bytes()?.to_vec(),
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .string(&self.client_id)
            .bytes(&self.client_message)
            .build()
    }
}

/// Arguments of `upgradeClient(string,bytes,bytes,bytes,bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeClientInput {
    /// Identifier of the client to upgrade.
    pub client_id: String,
    /// Serialized upgraded client state.
    pub upgraded_client_state: Vec<u8>,
    /// Serialized upgraded consensus state.
    pub upgraded_consensus_state: Vec<u8>,
    /// Proof that the counterparty committed the upgraded client state.
    pub proof_upgrade_client: Vec<u8>,
    /// Proof that the counterparty committed the upgraded consensus state.
    pub proof_upgrade_consensus_state: Vec<u8>,
}

impl UpgradeClientInput {
    /// Decodes the payload following the selector.
    ///
    /// # Errors
    /// Returns a [`CodecError`] on truncated, trailing, or malformed input.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(payload);
        let input = Self {
            client_id: decoder.read_string()?,
            upgraded_client_state: decoder.read_bytes()?.to_vec(),
            upgraded_consensus_state: decoder.read_bytes()?.to_vec(),
            proof_upgrade_client: decoder.read_bytes()?.to_vec(),
            proof_upgrade_consensus_state: decoder.read_bytes()?.to_vec(),
        };
        decoder.finish()?;
        Ok(input)
    }

    /// Encodes the arguments into the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Encoder::new()
            .string(&self.client_id)
            .bytes(&self.upgraded_client_state)
            .bytes(&self.upgraded_consensus_state)
            .bytes(&self.proof_upgrade_client)
            .bytes(&self.proof_upgrade_consensus_state)
            .build()
    }
}

/// Creates a light client: validates the initial record pair, assigns the
/// next `<client_type>-<seq>` identifier, and persists both records.
/// Returns the identifier as UTF-8 bytes.
pub(crate) fn create_client<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
) -> Result<Vec<u8>, PrecompileError> {
    let input = CreateClientInput::decode(payload)?;

    let seq = sequence::peek(store, paths::NEXT_CLIENT_SEQ);
    let client_id = format!("{}-{seq}", module.client_type());

    module.initialise(store, &client_id, &input.client_state, &input.consensus_state)?;
    sequence::bump(store, paths::NEXT_CLIENT_SEQ, seq);

    tracing::info!(client_id, "created client");
    Ok(client_id.into_bytes())
}

/// Updates a client with a verified client message. A message that evidences
/// misbehaviour freezes the client instead of advancing it.
pub(crate) fn update_client<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
    now_nanos: u128,
) -> Result<Vec<u8>, PrecompileError> {
    let input = UpdateClientInput::decode(payload)?;

    module.verify_client_message(store, &input.client_id, &input.client_message, now_nanos)?;

    if module.check_for_misbehaviour(store, &input.client_id, &input.client_message)? {
        module.update_state_on_misbehaviour(store, &input.client_id, &input.client_message)?;
        tracing::warn!(client_id = %input.client_id, "froze client on misbehaviour");
    } else {
        let height = module.update_state(store, &input.client_id, &input.client_message)?;
        tracing::info!(client_id = %input.client_id, %height, "updated client");
    }

    Ok(Vec::new())
}

/// Upgrades a client to the counterparty chain's committed upgrade records.
pub(crate) fn upgrade_client<M: LightClientModule, S: StateDb>(
    module: &M,
    store: &mut PrecompileStore<'_, S>,
    payload: &[u8],
) -> Result<Vec<u8>, PrecompileError> {
    let input = UpgradeClientInput::decode(payload)?;

    module.verify_upgrade_and_update_state(
        store,
        &input.client_id,
        &input.upgraded_client_state,
        &input.upgraded_consensus_state,
        &input.proof_upgrade_client,
        &input.proof_upgrade_consensus_state,
    )?;

    tracing::info!(client_id = %input.client_id, "upgraded client");
    Ok(Vec::new())
}
