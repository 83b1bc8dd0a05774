//! Tendermint (ICS-07) implementation of the light-client module.

use ibc_client_tendermint::client_state::verify_header;
use ibc_client_tendermint::types::{
    ClientState as ClientStateType, ConsensusState as ConsensusStateType, Header,
    TENDERMINT_CLIENT_TYPE,
};
use ibc_core_client::types::Height;
use ibc_core_commitment_types::{
    commitment::CommitmentRoot,
    merkle::{MerklePath, MerkleProof},
    proto::ics23::HostFunctionsManager,
    specs::ProofSpecs,
};
use ibc_core_host_types::identifiers::ClientId;
use ibc_core_host_types::path::PathBytes;
use ibc_precompile_state::{paths, StoreReader, StoreWriter};
use ibc_proto::google::protobuf::Any;
use ibc_proto::ibc::core::client::v1::Height as RawHeight;
use ibc_proto::ibc::core::commitment::v1::MerkleProof as RawMerkleProof;
use ibc_proto::ibc::lightclients::tendermint::v1::{
    ClientState as RawClientState, ConsensusState as RawConsensusState, Header as RawHeader,
};
use ibc_proto::Protobuf;
use prost::Message;
use tendermint::trust_threshold::TrustThresholdFraction;
use tendermint_light_client_verifier::{options::Options, ProdVerifier};

use crate::validation::ClientValidationCtx;
use crate::{LightClientError, LightClientModule};

/// The root committed for the consensus state installed by an upgrade; the
/// first header after the upgrade replaces it (ibc-go's sentinel).
const SENTINEL_ROOT: &str = "sentinel_root";

/// Store key suffix of the upgraded client state on the counterparty.
const KEY_UPGRADED_CLIENT: &str = "upgradedClient";

/// Store key suffix of the upgraded consensus state on the counterparty.
const KEY_UPGRADED_CONS_STATE: &str = "upgradedConsState";

/// ICS-07 Tendermint light clients over the precompile store.
#[derive(Debug, Default, Clone, Copy)]
pub struct TendermintLightClient;

fn read_client_state(
    store: &dyn StoreReader,
    client_id: &str,
) -> Result<ClientStateType, LightClientError> {
    let bytes = store
        .get(&paths::client_state(client_id))
        .ok_or_else(|| LightClientError::ClientNotFound {
            client_id: client_id.to_string(),
        })?;
    <ClientStateType as Protobuf<RawClientState>>::decode_vec(&bytes)
        .map_err(|_| LightClientError::Decode("client state"))
}

fn read_consensus_state(
    store: &dyn StoreReader,
    client_id: &str,
    height: Height,
) -> Result<ConsensusStateType, LightClientError> {
    let path =
        paths::consensus_state(client_id, height.revision_number(), height.revision_height());
    let bytes = store
        .get(&path)
        .ok_or_else(|| LightClientError::ConsensusStateNotFound {
            client_id: client_id.to_string(),
            height,
        })?;
    <ConsensusStateType as Protobuf<RawConsensusState>>::decode_vec(&bytes)
        .map_err(|_| LightClientError::Decode("consensus state"))
}

fn write_client_state(store: &mut dyn StoreWriter, client_id: &str, state: ClientStateType) {
    store.set(
        &paths::client_state(client_id),
        Protobuf::<RawClientState>::encode_vec(state),
    );
}

fn write_consensus_state(
    store: &mut dyn StoreWriter,
    client_id: &str,
    height: Height,
    state: ConsensusStateType,
) {
    store.set(
        &paths::consensus_state(client_id, height.revision_number(), height.revision_height()),
        Protobuf::<RawConsensusState>::encode_vec(state),
    );
}

fn decode_header(message: &[u8]) -> Result<Header, LightClientError> {
    <Header as Protobuf<RawHeader>>::decode_vec(message)
        .map_err(|_| LightClientError::Decode("header"))
}

fn decode_height(bytes: &[u8]) -> Result<Height, LightClientError> {
    let raw = RawHeight::decode(bytes).map_err(|_| LightClientError::Decode("height"))?;
    Height::try_from(raw).map_err(|e| LightClientError::InvalidHeight(e.to_string()))
}

fn light_client_options(client_state: &ClientStateType) -> Result<Options, LightClientError> {
    Ok(Options {
        trust_threshold: TrustThresholdFraction::new(
            client_state.trust_level.numerator(),
            client_state.trust_level.denominator(),
        )
        .map_err(|e| LightClientError::HeaderVerification(e.to_string()))?,
        trusting_period: client_state.trusting_period,
        clock_drift: client_state.max_clock_drift,
    })
}

/// Strips the chain-specific trust parameters before matching the upgraded
/// client against the counterparty's upgrade commitment, which is made over
/// the zeroed form.
fn zero_custom_fields(client_state: &ClientStateType) -> ClientStateType {
    ClientStateType {
        chain_id: client_state.chain_id.clone(),
        trust_level: ibc_client_tendermint::types::TrustThreshold::ZERO,
        trusting_period: core::time::Duration::ZERO,
        unbonding_period: client_state.unbonding_period,
        max_clock_drift: core::time::Duration::ZERO,
        latest_height: client_state.latest_height,
        proof_specs: client_state.proof_specs.clone(),
        upgrade_path: client_state.upgrade_path.clone(),
        frozen_height: None,
        allow_update: ibc_client_tendermint::types::AllowUpdate {
            after_expiry: false,
            after_misbehaviour: false,
        },
    }
}

/// Verifies a membership proof of `value` at `path` under the counterparty's
/// `ibc` commitment prefix.
fn verify_membership(
    specs: &ProofSpecs,
    root: &CommitmentRoot,
    path: String,
    proof: &[u8],
    value: Vec<u8>,
) -> Result<(), LightClientError> {
    let merkle_path = MerklePath::new(vec![
        PathBytes::from_bytes(paths::COMMITMENT_PREFIX.to_vec()),
        PathBytes::from_bytes(path.clone().into_bytes()),
    ]);
    verify_membership_at(specs, root, merkle_path, path, proof, value)
}

fn verify_membership_at(
    specs: &ProofSpecs,
    root: &CommitmentRoot,
    merkle_path: MerklePath,
    display_path: String,
    proof: &[u8],
    value: Vec<u8>,
) -> Result<(), LightClientError> {
    let merkle_proof = <MerkleProof as Protobuf<RawMerkleProof>>::decode_vec(proof)
        .map_err(|_| LightClientError::Decode("merkle proof"))?;
    merkle_proof
        .verify_membership::<HostFunctionsManager>(
            specs,
            root.clone().into(),
            merkle_path,
            value,
            0,
        )
        .map_err(|e| LightClientError::MembershipVerification {
            path: display_path,
            reason: e.to_string(),
        })
}

/// The IAVL key under which the counterparty commits its upgraded records:
/// all upgrade-path segments but the last, then
/// `{last}/{height}/{record key}`.
fn upgrade_merkle_path(upgrade_path: &[String], height: Height, key: &str) -> MerklePath {
    let mut segments: Vec<PathBytes> = upgrade_path[..upgrade_path.len() - 1]
        .iter()
        .map(|segment| PathBytes::from_bytes(segment.clone().into_bytes()))
        .collect();
    let last = &upgrade_path[upgrade_path.len() - 1];
    let appended = format!("{last}/{}/{key}", height.revision_height());
    segments.push(PathBytes::from_bytes(appended.into_bytes()));
    MerklePath::new(segments)
}

fn ensure_proof_height(
    client_state: &ClientStateType,
    proof_height: Height,
) -> Result<(), LightClientError> {
    if client_state.latest_height < proof_height {
        return Err(LightClientError::ProofHeightTooHigh {
            latest: client_state.latest_height,
            proof_height,
        });
    }
    Ok(())
}

impl LightClientModule for TendermintLightClient {
    fn client_type(&self) -> &'static str {
        TENDERMINT_CLIENT_TYPE
    }

    fn initialise(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        client_state: &[u8],
        consensus_state: &[u8],
    ) -> Result<(), LightClientError> {
        let client_state = <ClientStateType as Protobuf<RawClientState>>::decode_vec(client_state)
            .map_err(|_| LightClientError::Decode("client state"))?;
        let consensus_state =
            <ConsensusStateType as Protobuf<RawConsensusState>>::decode_vec(consensus_state)
                .map_err(|_| LightClientError::Decode("consensus state"))?;

        let latest_height = client_state.latest_height;
        tracing::debug!(client_id, %latest_height, "initialising tendermint client");
        write_consensus_state(store, client_id, latest_height, consensus_state);
        write_client_state(store, client_id, client_state);
        Ok(())
    }

    fn latest_height(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
    ) -> Result<Height, LightClientError> {
        Ok(read_client_state(store, client_id)?.latest_height)
    }

    fn verify_client_message(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        message: &[u8],
        now_nanos: u128,
    ) -> Result<(), LightClientError> {
        let client_state = read_client_state(store, client_id)?;
        if client_state.frozen_height.is_some() {
            return Err(LightClientError::Frozen {
                client_id: client_id.to_string(),
            });
        }

        let header = decode_header(message)?;
        let trusted_consensus_state =
            read_consensus_state(store, client_id, header.trusted_height)?;

        let ibc_client_id = ClientId::new(TENDERMINT_CLIENT_TYPE, 0)
            .map_err(|e| LightClientError::HeaderVerification(e.to_string()))?;
        let options = light_client_options(&client_state)?;

        let mut ctx = ClientValidationCtx::new(now_nanos);
        ctx.insert_trusted_consensus_state(
            ibc_client_id.clone(),
            header.trusted_height.revision_number(),
            header.trusted_height.revision_height(),
            &trusted_consensus_state,
        );

        verify_header::<_, sha2::Sha256>(
            &ctx,
            &header,
            &ibc_client_id,
            &client_state.chain_id,
            &options,
            &ProdVerifier::default(),
        )
        .map_err(|e| LightClientError::HeaderVerification(e.to_string()))
    }

    fn check_for_misbehaviour(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        message: &[u8],
    ) -> Result<bool, LightClientError> {
        let header = decode_header(message)?;
        let height = header.height();
        let path =
            paths::consensus_state(client_id, height.revision_number(), height.revision_height());
        let Some(existing) = store.get(&path) else {
            return Ok(false);
        };
        let existing = <ConsensusStateType as Protobuf<RawConsensusState>>::decode_vec(&existing)
            .map_err(|_| LightClientError::Decode("consensus state"))?;

        // A verified header whose consensus state conflicts with the one
        // already stored at its height is proof of a fork.
        Ok(existing != ConsensusStateType::from(header))
    }

    fn update_state(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        message: &[u8],
    ) -> Result<Height, LightClientError> {
        let mut client_state = read_client_state(store, client_id)?;
        let header = decode_header(message)?;
        let height = header.height();

        tracing::debug!(client_id, %height, "updating tendermint client");
        write_consensus_state(store, client_id, height, ConsensusStateType::from(header));
        if height > client_state.latest_height {
            client_state.latest_height = height;
            write_client_state(store, client_id, client_state);
        }
        Ok(height)
    }

    fn update_state_on_misbehaviour(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        _message: &[u8],
    ) -> Result<(), LightClientError> {
        let mut client_state = read_client_state(store, client_id)?;
        let frozen_height =
            Height::new(0, 1).map_err(|e| LightClientError::InvalidHeight(e.to_string()))?;
        client_state.frozen_height = Some(frozen_height);
        tracing::warn!(client_id, "freezing tendermint client on misbehaviour");
        write_client_state(store, client_id, client_state);
        Ok(())
    }

    fn verify_upgrade_and_update_state(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        upgraded_client_state: &[u8],
        upgraded_consensus_state: &[u8],
        proof_upgrade_client: &[u8],
        proof_upgrade_consensus_state: &[u8],
    ) -> Result<(), LightClientError> {
        let upgraded_client =
            <ClientStateType as Protobuf<RawClientState>>::decode_vec(upgraded_client_state)
                .map_err(|_| LightClientError::Decode("upgraded client state"))?;
        let upgraded_cons = <ConsensusStateType as Protobuf<RawConsensusState>>::decode_vec(
            upgraded_consensus_state,
        )
        .map_err(|_| LightClientError::Decode("upgraded consensus state"))?;

        let client_state = read_client_state(store, client_id)?;
        let last_height = client_state.latest_height;
        let consensus_state = read_consensus_state(store, client_id, last_height)?;

        if client_state.upgrade_path.is_empty() {
            return Err(LightClientError::NoUpgradePath);
        }
        // The counterparty commits its upgrade at its final pre-upgrade
        // height, which must be the client's latest trusted height.
        if upgraded_client.latest_height <= last_height {
            return Err(LightClientError::UpgradeHeightNotNewer {
                upgraded: upgraded_client.latest_height,
                current: last_height,
            });
        }

        let client_value = Any::from(zero_custom_fields(&upgraded_client)).encode_to_vec();
        verify_membership_at(
            &client_state.proof_specs,
            &consensus_state.root,
            upgrade_merkle_path(&client_state.upgrade_path, last_height, KEY_UPGRADED_CLIENT),
            KEY_UPGRADED_CLIENT.to_string(),
            proof_upgrade_client,
            client_value,
        )?;

        let cons_value = Any::from(upgraded_cons.clone()).encode_to_vec();
        verify_membership_at(
            &client_state.proof_specs,
            &consensus_state.root,
            upgrade_merkle_path(
                &client_state.upgrade_path,
                last_height,
                KEY_UPGRADED_CONS_STATE,
            ),
            KEY_UPGRADED_CONS_STATE.to_string(),
            proof_upgrade_consensus_state,
            cons_value,
        )?;

        // Trust-level parameters are chain-local and survive the upgrade;
        // everything consensus-critical comes from the upgraded records.
        let new_height = upgraded_client.latest_height;
        let new_client_state = ClientStateType {
            chain_id: upgraded_client.chain_id.clone(),
            trust_level: client_state.trust_level,
            trusting_period: client_state.trusting_period,
            unbonding_period: upgraded_client.unbonding_period,
            max_clock_drift: client_state.max_clock_drift,
            latest_height: new_height,
            proof_specs: upgraded_client.proof_specs.clone(),
            upgrade_path: upgraded_client.upgrade_path.clone(),
            frozen_height: None,
            allow_update: client_state.allow_update,
        };
        let new_consensus_state = ConsensusStateType {
            timestamp: upgraded_cons.timestamp,
            root: CommitmentRoot::from_bytes(SENTINEL_ROOT.as_bytes()),
            next_validators_hash: upgraded_cons.next_validators_hash,
        };

        tracing::debug!(client_id, %new_height, "upgrading tendermint client");
        write_consensus_state(store, client_id, new_height, new_consensus_state);
        write_client_state(store, client_id, new_client_state);
        Ok(())
    }

    fn verify_client_state(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        proof_height: &[u8],
        counterparty_client_id: &str,
        proof: &[u8],
        expected_client_state: &[u8],
    ) -> Result<(), LightClientError> {
        // The expected value travels `Any`-encoded; reject bytes that are
        // not a Tendermint client state before proving them.
        let any = Any::decode(expected_client_state)
            .map_err(|_| LightClientError::Decode("client state"))?;
        RawClientState::decode(any.value.as_slice())
            .map_err(|_| LightClientError::Decode("client state"))?;

        let client_state = read_client_state(store, client_id)?;
        let proof_height = decode_height(proof_height)?;
        ensure_proof_height(&client_state, proof_height)?;
        let consensus_state = read_consensus_state(store, client_id, client_state.latest_height)?;

        verify_membership(
            &client_state.proof_specs,
            &consensus_state.root,
            paths::client_state(counterparty_client_id),
            proof,
            expected_client_state.to_vec(),
        )
    }

    fn verify_connection_state(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        proof_height: &[u8],
        counterparty_connection_id: &str,
        proof: &[u8],
        expected_connection: &[u8],
    ) -> Result<(), LightClientError> {
        let client_state = read_client_state(store, client_id)?;
        let proof_height = decode_height(proof_height)?;
        ensure_proof_height(&client_state, proof_height)?;
        let consensus_state = read_consensus_state(store, client_id, client_state.latest_height)?;

        verify_membership(
            &client_state.proof_specs,
            &consensus_state.root,
            paths::connection(counterparty_connection_id),
            proof,
            expected_connection.to_vec(),
        )
    }
}
