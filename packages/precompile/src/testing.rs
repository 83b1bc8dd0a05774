//! Test doubles shared across the crate's unit tests.

use alloy_primitives::Address;
use ibc_core_client::types::Height;
use ibc_precompile_light_client::{LightClientError, LightClientModule};
use ibc_precompile_state::memory::InMemoryStateDb;
use ibc_precompile_state::{allowlist, paths, PrecompileStore, StoreReader, StoreWriter};

use crate::CallContext;

/// The enabled caller used by the tests.
pub(crate) const CALLER: Address = Address::repeat_byte(0x11);

/// A light-client module with scriptable outcomes, so dispatcher tests do
/// not need real headers or proofs.
pub(crate) struct StubLightClient {
    pub fail_verification: bool,
    pub misbehaviour: bool,
    pub latest: Height,
}

impl Default for StubLightClient {
    fn default() -> Self {
        Self {
            fail_verification: false,
            misbehaviour: false,
            latest: Height::new(0, 100).unwrap(),
        }
    }
}

impl StubLightClient {
    fn require_client(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
    ) -> Result<(), LightClientError> {
        if store.exists(&paths::client_state(client_id)) {
            Ok(())
        } else {
            Err(LightClientError::ClientNotFound {
                client_id: client_id.to_string(),
            })
        }
    }

    fn stubbed_verification(&self, path: &str) -> Result<(), LightClientError> {
        if self.fail_verification {
            Err(LightClientError::MembershipVerification {
                path: path.to_string(),
                reason: "stubbed failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl LightClientModule for StubLightClient {
    fn client_type(&self) -> &'static str {
        "07-tendermint"
    }

    fn initialise(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        client_state: &[u8],
        consensus_state: &[u8],
    ) -> Result<(), LightClientError> {
        if client_state.is_empty() {
            return Err(LightClientError::Decode("client state"));
        }
        store.set(
            &paths::consensus_state(
                client_id,
                self.latest.revision_number(),
                self.latest.revision_height(),
            ),
            consensus_state.to_vec(),
        );
        store.set(&paths::client_state(client_id), client_state.to_vec());
        Ok(())
    }

    fn latest_height(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
    ) -> Result<Height, LightClientError> {
        self.require_client(store, client_id)?;
        Ok(self.latest)
    }

    fn verify_client_message(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        _message: &[u8],
        _now_nanos: u128,
    ) -> Result<(), LightClientError> {
        self.require_client(store, client_id)?;
        if self.fail_verification {
            return Err(LightClientError::HeaderVerification(
                "stubbed failure".to_string(),
            ));
        }
        Ok(())
    }

    fn check_for_misbehaviour(
        &self,
        _store: &dyn StoreReader,
        _client_id: &str,
        _message: &[u8],
    ) -> Result<bool, LightClientError> {
        Ok(self.misbehaviour)
    }

    fn update_state(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        message: &[u8],
    ) -> Result<Height, LightClientError> {
        let height = Height::new(
            self.latest.revision_number(),
            self.latest.revision_height() + 1,
        )
        .unwrap();
        store.set(
            &paths::consensus_state(client_id, height.revision_number(), height.revision_height()),
            message.to_vec(),
        );
        Ok(height)
    }

    fn update_state_on_misbehaviour(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        _message: &[u8],
    ) -> Result<(), LightClientError> {
        store.set(&paths::client_state(client_id), b"frozen".to_vec());
        Ok(())
    }

    fn verify_upgrade_and_update_state(
        &self,
        store: &mut dyn StoreWriter,
        client_id: &str,
        upgraded_client_state: &[u8],
        upgraded_consensus_state: &[u8],
        _proof_upgrade_client: &[u8],
        _proof_upgrade_consensus_state: &[u8],
    ) -> Result<(), LightClientError> {
        self.require_client(store, client_id)?;
        self.stubbed_verification("upgradedClient")?;
        let height = Height::new(
            self.latest.revision_number(),
            self.latest.revision_height() + 1,
        )
        .unwrap();
        store.set(
            &paths::consensus_state(client_id, height.revision_number(), height.revision_height()),
            upgraded_consensus_state.to_vec(),
        );
        store.set(&paths::client_state(client_id), upgraded_client_state.to_vec());
        Ok(())
    }

    fn verify_client_state(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        _proof_height: &[u8],
        counterparty_client_id: &str,
        _proof: &[u8],
        _expected_client_state: &[u8],
    ) -> Result<(), LightClientError> {
        self.require_client(store, client_id)?;
        self.stubbed_verification(&paths::client_state(counterparty_client_id))
    }

    fn verify_connection_state(
        &self,
        store: &dyn StoreReader,
        client_id: &str,
        _proof_height: &[u8],
        counterparty_connection_id: &str,
        _proof: &[u8],
        _expected_connection: &[u8],
    ) -> Result<(), LightClientError> {
        self.require_client(store, client_id)?;
        self.stubbed_verification(&paths::connection(counterparty_connection_id))
    }
}

/// A state database with [`CALLER`] already granted the `Enabled` role.
pub(crate) fn enabled_db() -> InMemoryStateDb {
    let mut db = InMemoryStateDb::default();
    let mut store = PrecompileStore::new(&mut db);
    allowlist::set_role(&mut store, CALLER, allowlist::Role::Enabled);
    db
}

/// A call context for [`CALLER`].
pub(crate) const fn call_ctx() -> CallContext {
    CallContext {
        caller: CALLER,
        now_nanos: 0,
        read_only: false,
    }
}

/// Prepends `selector` to `payload`.
pub(crate) fn with_selector(selector: alloy_primitives::Selector, payload: &[u8]) -> Vec<u8> {
    let mut input = selector.to_vec();
    input.extend_from_slice(payload);
    input
}
