//! The selector-routed precompile entry point.

use alloy_primitives::{keccak256, Address, Selector};
use ibc_precompile_light_client::{LightClientModule, TendermintLightClient};
use ibc_precompile_state::{allowlist, PrecompileStore, StateDb};

use crate::{client, connection, PrecompileError};

/// Host-supplied context of a single precompile call.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    /// Address that invoked the precompile.
    pub caller: Address,
    /// Block timestamp in nanoseconds, used for trusting-period checks.
    pub now_nanos: u128,
    /// Whether the call is static; every operation here mutates state, so a
    /// static call is rejected outright.
    pub read_only: bool,
}

/// Width of a function selector in bytes.
const SELECTOR_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    CreateClient,
    UpdateClient,
    UpgradeClient,
    ConnOpenInit,
    ConnOpenTry,
    ConnOpenAck,
    ConnOpenConfirm,
}

impl Operation {
    const ALL: [Self; 7] = [
        Self::CreateClient,
        Self::UpdateClient,
        Self::UpgradeClient,
        Self::ConnOpenInit,
        Self::ConnOpenTry,
        Self::ConnOpenAck,
        Self::ConnOpenConfirm,
    ];

    /// The solidity-style signature the selector is derived from. The types
    /// describe the logical arguments; the wire format is the codec's
    /// length-prefixed layout, not ABI encoding.
    const fn signature(self) -> &'static str {
        match self {
            Self::CreateClient => "createClient(bytes,bytes)",
            Self::UpdateClient => "updateClient(string,bytes)",
            Self::UpgradeClient => "upgradeClient(string,bytes,bytes,bytes,bytes)",
            Self::ConnOpenInit => "connOpenInit(string,bytes,bytes,uint64)",
            Self::ConnOpenTry => {
                "connOpenTry(bytes,uint64,string,bytes,bytes,bytes,bytes,bytes,bytes,bytes)"
            }
            Self::ConnOpenAck => {
                "connOpenAck(string,bytes,bytes,string,bytes,bytes,bytes,bytes,bytes)"
            }
            Self::ConnOpenConfirm => "connOpenConfirm(string,bytes,bytes)",
        }
    }
}

/// First four bytes of the keccak-256 hash of `signature`.
fn compute_selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..SELECTOR_LEN])
}

/// The IBC precompile contract.
///
/// One instance serves every call; it owns no state beyond the dispatch
/// table and the light-client module it drives. All persistence goes through
/// the [`StateDb`] handed to [`Precompile::run`].
#[derive(Debug)]
pub struct Precompile<M> {
    module: M,
    table: Vec<(Selector, Operation)>,
}

impl Precompile<TendermintLightClient> {
    /// A precompile backed by the Tendermint light-client module.
    #[must_use]
    pub fn tendermint() -> Self {
        Self::new(TendermintLightClient)
    }
}

impl<M: LightClientModule> Precompile<M> {
    /// Builds the dispatch table around `module`.
    #[must_use]
    pub fn new(module: M) -> Self {
        let table = Operation::ALL
            .iter()
            .map(|operation| (compute_selector(operation.signature()), *operation))
            .collect();
        Self { module, table }
    }

    /// Executes one precompile call.
    ///
    /// `input` is `[4-byte selector][operation payload]`. On success the
    /// returned bytes are the operation's output (a UTF-8 identifier for the
    /// creating operations, empty otherwise).
    ///
    /// # Errors
    /// Fails without touching state on an unknown or truncated selector, a
    /// static call, or a caller without an allow-list role; afterwards,
    /// decode and protocol errors surface verbatim and the handler will not
    /// have written anything.
    pub fn run<S: StateDb>(
        &self,
        db: &mut S,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, PrecompileError> {
        if input.len() < SELECTOR_LEN {
            return Err(PrecompileError::InputTooShort);
        }
        let (selector_bytes, payload) = input.split_at(SELECTOR_LEN);
        let selector = Selector::from_slice(selector_bytes);
        let operation = self
            .table
            .iter()
            .find(|(candidate, _)| *candidate == selector)
            .map(|(_, operation)| *operation)
            .ok_or(PrecompileError::UnknownSelector(selector))?;

        if ctx.read_only {
            return Err(PrecompileError::WriteProtection);
        }

        let mut store = PrecompileStore::new(db);
        // Resolved before any payload decoding so unauthorized input never
        // reaches the protocol module.
        let role = allowlist::get_role(&store, ctx.caller);
        if !role.is_enabled() {
            return Err(PrecompileError::Unauthorized { caller: ctx.caller });
        }

        tracing::debug!(%selector, ?operation, caller = %ctx.caller, "precompile call");
        match operation {
            Operation::CreateClient => client::create_client(&self.module, &mut store, payload),
            Operation::UpdateClient => {
                client::update_client(&self.module, &mut store, payload, ctx.now_nanos)
            }
            Operation::UpgradeClient => client::upgrade_client(&self.module, &mut store, payload),
            Operation::ConnOpenInit => {
                connection::conn_open_init(&self.module, &mut store, payload)
            }
            Operation::ConnOpenTry => connection::conn_open_try(&self.module, &mut store, payload),
            Operation::ConnOpenAck => connection::conn_open_ack(&self.module, &mut store, payload),
            Operation::ConnOpenConfirm => {
                connection::conn_open_confirm(&self.module, &mut store, payload)
            }
        }
    }

}

/// Function selectors of the precompile operations, for callers assembling
/// inputs.
pub mod selectors {
    use alloy_primitives::Selector;

    use super::{compute_selector, Operation};

    /// `createClient(bytes,bytes)`
    #[must_use]
    pub fn create_client() -> Selector {
        compute_selector(Operation::CreateClient.signature())
    }

    /// `updateClient(string,bytes)`
    #[must_use]
    pub fn update_client() -> Selector {
        compute_selector(Operation::UpdateClient.signature())
    }

    /// `upgradeClient(string,bytes,bytes,bytes,bytes)`
    #[must_use]
    pub fn upgrade_client() -> Selector {
        compute_selector(Operation::UpgradeClient.signature())
    }

    /// `connOpenInit(string,bytes,bytes,uint64)`
    #[must_use]
    pub fn conn_open_init() -> Selector {
        compute_selector(Operation::ConnOpenInit.signature())
    }

    /// `connOpenTry(bytes,uint64,string,bytes,bytes,bytes,bytes,bytes,bytes,bytes)`
    #[must_use]
    pub fn conn_open_try() -> Selector {
        compute_selector(Operation::ConnOpenTry.signature())
    }

    /// `connOpenAck(string,bytes,bytes,string,bytes,bytes,bytes,bytes,bytes)`
    #[must_use]
    pub fn conn_open_ack() -> Selector {
        compute_selector(Operation::ConnOpenAck.signature())
    }

    /// `connOpenConfirm(string,bytes,bytes)`
    #[must_use]
    pub fn conn_open_confirm() -> Selector {
        compute_selector(Operation::ConnOpenConfirm.signature())
    }
}

#[cfg(test)]
mod tests {
    use ibc_precompile_state::memory::InMemoryStateDb;
    use ibc_precompile_state::{paths, PrecompileStore, StoreReader, StoreWriter};

    use super::{selectors, CallContext, Operation, Precompile};
    use crate::client::{CreateClientInput, UpdateClientInput, UpgradeClientInput};
    use crate::testing::{call_ctx, enabled_db, with_selector, StubLightClient, CALLER};
    use crate::PrecompileError;

    fn precompile() -> Precompile<StubLightClient> {
        Precompile::new(StubLightClient::default())
    }

    fn create_client_input() -> Vec<u8> {
        let payload = CreateClientInput {
            client_state: b"client state".to_vec(),
            consensus_state: b"consensus state".to_vec(),
        }
        .encode();
        with_selector(selectors::create_client(), &payload)
    }

    fn seed_counter(db: &mut InMemoryStateDb, path: &str, value: u64) {
        let mut store = PrecompileStore::new(db);
        store.set(path, value.to_be_bytes().to_vec());
    }

    fn read_counter(db: &mut InMemoryStateDb, path: &str) -> Option<u64> {
        let store = PrecompileStore::new(db);
        store
            .get(path)
            .map(|bytes| u64::from_be_bytes(bytes.as_slice().try_into().unwrap()))
    }

    #[test]
    fn selectors_are_distinct() {
        let mut seen = Vec::new();
        for operation in Operation::ALL {
            let selector = super::compute_selector(operation.signature());
            assert!(!seen.contains(&selector), "{operation:?} collides");
            seen.push(selector);
        }
    }

    #[test]
    fn input_shorter_than_a_selector_is_rejected() {
        let mut db = enabled_db();
        let err = precompile()
            .run(&mut db, &call_ctx(), &[0x01, 0x02, 0x03])
            .unwrap_err();
        assert!(matches!(err, PrecompileError::InputTooShort));
    }

    #[test]
    fn unknown_selector_touches_nothing() {
        let mut db = enabled_db();
        let err = precompile()
            .run(&mut db, &call_ctx(), &[0xde, 0xad, 0xbe, 0xef, 0x00])
            .unwrap_err();
        assert!(matches!(err, PrecompileError::UnknownSelector(_)));
        assert_eq!(None, read_counter(&mut db, paths::NEXT_CLIENT_SEQ));
    }

    #[test]
    fn static_calls_are_write_protected() {
        let mut db = enabled_db();
        let ctx = CallContext {
            read_only: true,
            ..call_ctx()
        };
        let err = precompile()
            .run(&mut db, &ctx, &create_client_input())
            .unwrap_err();
        assert!(matches!(err, PrecompileError::WriteProtection));
    }

    #[test]
    fn callers_without_a_role_are_rejected_before_decoding() {
        // No role granted at all; even a valid payload must bounce without
        // leaving a trace in the store.
        let mut db = InMemoryStateDb::default();
        let err = precompile()
            .run(&mut db, &call_ctx(), &create_client_input())
            .unwrap_err();
        assert!(
            matches!(err, PrecompileError::Unauthorized { caller } if caller == CALLER),
            "{err:?}"
        );
        assert_eq!(None, read_counter(&mut db, paths::NEXT_CLIENT_SEQ));
        let store = PrecompileStore::new(&mut db);
        assert!(!store.exists(&paths::client_state("07-tendermint-0")));
    }

    #[test]
    fn create_client_formats_identifier_from_the_counter() {
        let mut db = enabled_db();
        seed_counter(&mut db, paths::NEXT_CLIENT_SEQ, 3454);

        let output = precompile()
            .run(&mut db, &call_ctx(), &create_client_input())
            .unwrap();

        assert_eq!(b"07-tendermint-3454".to_vec(), output);
        assert_eq!(Some(3455), read_counter(&mut db, paths::NEXT_CLIENT_SEQ));
        let store = PrecompileStore::new(&mut db);
        assert_eq!(
            Some(b"client state".to_vec()),
            store.get(&paths::client_state("07-tendermint-3454"))
        );
        assert_eq!(
            Some(b"consensus state".to_vec()),
            store.get(&paths::consensus_state("07-tendermint-3454", 0, 100))
        );
    }

    #[test]
    fn repeated_creates_assign_gapless_identifiers() {
        let mut db = enabled_db();
        let contract = precompile();

        for expected in ["07-tendermint-0", "07-tendermint-1", "07-tendermint-2"] {
            let output = contract
                .run(&mut db, &call_ctx(), &create_client_input())
                .unwrap();
            assert_eq!(expected.as_bytes().to_vec(), output);
        }
        assert_eq!(Some(3), read_counter(&mut db, paths::NEXT_CLIENT_SEQ));
    }

    #[test]
    fn failed_create_does_not_burn_a_sequence_number() {
        let mut db = enabled_db();
        // The stub rejects an empty client state.
        let payload = CreateClientInput {
            client_state: Vec::new(),
            consensus_state: b"consensus state".to_vec(),
        }
        .encode();
        let err = precompile()
            .run(
                &mut db,
                &call_ctx(),
                &with_selector(selectors::create_client(), &payload),
            )
            .unwrap_err();
        assert!(matches!(err, PrecompileError::Client(_)));
        assert_eq!(None, read_counter(&mut db, paths::NEXT_CLIENT_SEQ));
    }

    #[test]
    fn update_of_unknown_client_writes_no_consensus_state() {
        let mut db = enabled_db();
        let payload = UpdateClientInput {
            client_id: "07-tendermint-9".to_string(),
            client_message: b"header".to_vec(),
        }
        .encode();

        let err = precompile()
            .run(
                &mut db,
                &call_ctx(),
                &with_selector(selectors::update_client(), &payload),
            )
            .unwrap_err();
        assert!(matches!(err, PrecompileError::Client(_)));

        let store = PrecompileStore::new(&mut db);
        assert!(!store.exists(&paths::consensus_state("07-tendermint-9", 0, 101)));
    }

    #[test]
    fn update_client_persists_the_new_consensus_state() {
        let mut db = enabled_db();
        let contract = precompile();
        contract
            .run(&mut db, &call_ctx(), &create_client_input())
            .unwrap();

        let payload = UpdateClientInput {
            client_id: "07-tendermint-0".to_string(),
            client_message: b"header".to_vec(),
        }
        .encode();
        let output = contract
            .run(
                &mut db,
                &call_ctx(),
                &with_selector(selectors::update_client(), &payload),
            )
            .unwrap();
        assert!(output.is_empty());

        let store = PrecompileStore::new(&mut db);
        assert_eq!(
            Some(b"header".to_vec()),
            store.get(&paths::consensus_state("07-tendermint-0", 0, 101))
        );
    }

    #[test]
    fn misbehaving_update_freezes_instead_of_advancing() {
        let mut db = enabled_db();
        let contract = Precompile::new(StubLightClient {
            misbehaviour: true,
            ..StubLightClient::default()
        });
        contract
            .run(&mut db, &call_ctx(), &create_client_input())
            .unwrap();

        let payload = UpdateClientInput {
            client_id: "07-tendermint-0".to_string(),
            client_message: b"conflicting header".to_vec(),
        }
        .encode();
        contract
            .run(
                &mut db,
                &call_ctx(),
                &with_selector(selectors::update_client(), &payload),
            )
            .unwrap();

        let store = PrecompileStore::new(&mut db);
        assert_eq!(
            Some(b"frozen".to_vec()),
            store.get(&paths::client_state("07-tendermint-0"))
        );
        assert!(!store.exists(&paths::consensus_state("07-tendermint-0", 0, 101)));
    }

    #[test]
    fn upgrade_client_replaces_the_stored_records() {
        let mut db = enabled_db();
        let contract = precompile();
        contract
            .run(&mut db, &call_ctx(), &create_client_input())
            .unwrap();

        let payload = UpgradeClientInput {
            client_id: "07-tendermint-0".to_string(),
            upgraded_client_state: b"upgraded client".to_vec(),
            upgraded_consensus_state: b"upgraded consensus".to_vec(),
            proof_upgrade_client: b"proof".to_vec(),
            proof_upgrade_consensus_state: b"proof".to_vec(),
        }
        .encode();
        contract
            .run(
                &mut db,
                &call_ctx(),
                &with_selector(selectors::upgrade_client(), &payload),
            )
            .unwrap();

        let store = PrecompileStore::new(&mut db);
        assert_eq!(
            Some(b"upgraded client".to_vec()),
            store.get(&paths::client_state("07-tendermint-0"))
        );
    }

    mod tendermint_integration {
        use ibc_client_tendermint::types::{
            AllowUpdate, ClientState as ClientStateType, ConsensusState as ConsensusStateType,
            TrustThreshold,
        };
        use ibc_core_client::types::Height;
        use ibc_core_commitment_types::commitment::CommitmentRoot;
        use ibc_core_commitment_types::specs::ProofSpecs;
        use ibc_core_host_types::identifiers::ChainId;
        use ibc_proto::ibc::lightclients::tendermint::v1::{
            ClientState as RawClientState, ConsensusState as RawConsensusState,
        };
        use ibc_proto::Protobuf;

        use super::super::Precompile;
        use crate::client::{CreateClientInput, UpdateClientInput};
        use crate::connection::ConnOpenInitInput;
        use crate::testing::{call_ctx, enabled_db, with_selector};
        use crate::{selectors, PrecompileError};

        fn tendermint_client_state() -> Vec<u8> {
            Protobuf::<RawClientState>::encode_vec(ClientStateType {
                chain_id: ChainId::new("testchain-1").unwrap(),
                trust_level: TrustThreshold::ONE_THIRD,
                trusting_period: core::time::Duration::from_secs(1_209_600),
                unbonding_period: core::time::Duration::from_secs(1_814_400),
                max_clock_drift: core::time::Duration::from_secs(40),
                latest_height: Height::new(1, 10).unwrap(),
                proof_specs: ProofSpecs::cosmos(),
                upgrade_path: vec!["upgrade".to_string(), "upgradedIBCState".to_string()],
                frozen_height: None,
                allow_update: AllowUpdate {
                    after_expiry: true,
                    after_misbehaviour: true,
                },
            })
        }

        fn tendermint_consensus_state() -> Vec<u8> {
            Protobuf::<RawConsensusState>::encode_vec(ConsensusStateType {
                timestamp: tendermint::Time::from_unix_timestamp(1_700_000_000, 0).unwrap(),
                root: CommitmentRoot::from_bytes(&[0xaa; 32]),
                next_validators_hash: tendermint::Hash::Sha256([0xbb; 32]),
            })
        }

        #[test]
        fn create_client_and_open_init_against_the_real_module() {
            let mut db = enabled_db();
            let contract = Precompile::tendermint();

            let payload = CreateClientInput {
                client_state: tendermint_client_state(),
                consensus_state: tendermint_consensus_state(),
            }
            .encode();
            let client_id = contract
                .run(
                    &mut db,
                    &call_ctx(),
                    &with_selector(selectors::create_client(), &payload),
                )
                .unwrap();
            assert_eq!(b"07-tendermint-0".to_vec(), client_id);

            let counterparty =
                prost::Message::encode_to_vec(&ibc_proto::ibc::core::connection::v1::Counterparty {
                    client_id: "07-tendermint-4".to_string(),
                    connection_id: String::new(),
                    prefix: Some(ibc_proto::ibc::core::commitment::v1::MerklePrefix {
                        key_prefix: b"ibc".to_vec(),
                    }),
                });
            let payload = ConnOpenInitInput {
                client_id: "07-tendermint-0".to_string(),
                counterparty,
                version: Vec::new(),
                delay_period: 0,
            }
            .encode();
            let connection_id = contract
                .run(
                    &mut db,
                    &call_ctx(),
                    &with_selector(selectors::conn_open_init(), &payload),
                )
                .unwrap();
            assert_eq!(b"connection-0".to_vec(), connection_id);
        }

        #[test]
        fn garbage_client_message_is_a_protocol_error() {
            let mut db = enabled_db();
            let contract = Precompile::tendermint();

            let payload = CreateClientInput {
                client_state: tendermint_client_state(),
                consensus_state: tendermint_consensus_state(),
            }
            .encode();
            contract
                .run(
                    &mut db,
                    &call_ctx(),
                    &with_selector(selectors::create_client(), &payload),
                )
                .unwrap();

            let payload = UpdateClientInput {
                client_id: "07-tendermint-0".to_string(),
                client_message: vec![0xff; 16],
            }
            .encode();
            let err = contract
                .run(
                    &mut db,
                    &call_ctx(),
                    &with_selector(selectors::update_client(), &payload),
                )
                .unwrap_err();
            assert!(matches!(err, PrecompileError::Client(_)));
        }
    }
}
