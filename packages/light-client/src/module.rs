//! The trait the precompile dispatcher drives.

use ibc_core_client::types::Height;
use ibc_precompile_state::{StoreReader, StoreWriter};

use crate::LightClientError;

/// A pluggable light-client implementation.
///
/// Every method takes serialized protocol records plus a store capability
/// bound to the current call's state context; implementations own the wire
/// formats of their records and the store layout under `clients/{id}/`.
/// Methods that mutate the store must validate their full input before the
/// first write so that a failure leaves every slot untouched.
#[allow(clippy::module_name_repetitions)]
pub trait LightClientModule {
    /// The client-type prefix of identifiers created for this module,
    /// e.g. `07-tendermint`.
    fn client_type(&self) -> &'static str;

    /// Validates an initial client/consensus state pair and persists both
    /// under `client_id`.
    ///
    /// # Errors
    /// Fails if either record does not decode as this module's client or
    /// consensus state.
    fn initialise(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        client_state: &[u8],
        consensus_state: &[u8],
    ) -> Result<(), LightClientError>;

    /// The latest height trusted by the stored client.
    ///
    /// # Errors
    /// Fails if the client does not exist or its state does not decode.
    fn latest_height(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
    ) -> Result<Height, LightClientError>;

    /// Verifies a client message (header) against the stored client and its
    /// trusted consensus state, without mutating anything.
    ///
    /// `now_nanos` is the host block timestamp, used for trusting-period
    /// checks.
    ///
    /// # Errors
    /// Fails on a frozen client, an undecodable message, a missing trusted
    /// consensus state, or failed verification.
    fn verify_client_message(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        message: &[u8],
        now_nanos: u128,
    ) -> Result<(), LightClientError>;

    /// Reports whether an already-verified client message evidences
    /// misbehaviour (a conflicting consensus state at its height).
    ///
    /// # Errors
    /// Fails if the stored records or the message do not decode.
    fn check_for_misbehaviour(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        message: &[u8],
    ) -> Result<bool, LightClientError>;

    /// Applies an already-verified client message, persisting the new
    /// consensus state and advancing the client's latest height; returns the
    /// update height.
    ///
    /// # Errors
    /// Fails if the stored records or the message do not decode.
    fn update_state(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        message: &[u8],
    ) -> Result<Height, LightClientError>;

    /// Freezes the client after verified misbehaviour.
    ///
    /// # Errors
    /// Fails if the stored client state does not decode.
    fn update_state_on_misbehaviour(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        message: &[u8],
    ) -> Result<(), LightClientError>;

    /// Verifies an upgrade of the client against the committed upgrade
    /// records of the counterparty chain and, on success, persists the
    /// upgraded client and consensus states.
    ///
    /// # Errors
    /// Fails if the client has no upgrade path, the upgraded height does not
    /// advance, or either upgrade proof does not verify.
    fn verify_upgrade_and_update_state(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        upgraded_client_state: &[u8],
        upgraded_consensus_state: &[u8],
        proof_upgrade_client: &[u8],
        proof_upgrade_consensus_state: &[u8],
    ) -> Result<(), LightClientError>;

    /// Verifies that the counterparty chain committed `expected_client_state`
    /// (an `Any`-encoded client state) under its client path for
    /// `counterparty_client_id`.
    ///
    /// # Errors
    /// Fails if the proof height is beyond the client's latest height or the
    /// membership proof does not verify.
    fn verify_client_state(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        proof_height: &[u8],
        counterparty_client_id: &str,
        proof: &[u8],
        expected_client_state: &[u8],
    ) -> Result<(), LightClientError>;

    /// Verifies that the counterparty chain committed `expected_connection`
    /// (a protobuf `ConnectionEnd`) under its connection path for
    /// `counterparty_connection_id`.
    ///
    /// # Errors
    /// Fails if the proof height is beyond the client's latest height or the
    /// membership proof does not verify.
    fn verify_connection_state(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        proof_height: &[u8],
        counterparty_connection_id: &str,
        proof: &[u8],
        expected_connection: &[u8],
    ) -> Result<(), LightClientError>;
}
