//! Caller allow list for mutating precompile operations.
//!
//! Roles live in the same backend as the protocol records, one slot per
//! caller address. Role management itself (granting and revoking) is exposed
//! through a separate administrative precompile and is not part of this
//! workspace; tests seed roles directly through [`set_role`].

use alloy_primitives::Address;

use crate::{StoreReader, StoreWriter};

/// Role held by a caller address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    /// No role; mutating operations are rejected.
    #[default]
    None,
    /// May invoke mutating precompile operations.
    Enabled,
    /// May invoke mutating operations and manage the allow list.
    Admin,
}

impl Role {
    /// Whether the role clears the bar for mutating operations.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::Admin)
    }

    const fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Enabled => 1,
            Self::Admin => 2,
        }
    }

    const fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Enabled,
            2 => Self::Admin,
            _ => Self::None,
        }
    }
}

/// Store path of `address`'s role slot.
#[must_use]
pub fn role_path(address: Address) -> String {
    format!("allowList/{address}")
}

/// Resolves the role held by `address`; absent slots read as [`Role::None`].
#[must_use]
pub fn get_role(store: &dyn StoreReader, address: Address) -> Role {
    store
        .get(&role_path(address))
        .and_then(|value| value.first().copied())
        .map_or(Role::None, Role::from_byte)
}

/// Persists `role` for `address`.
pub fn set_role(store: &mut dyn StoreWriter, address: Address, role: Role) {
    tracing::debug!(%address, ?role, "allow list update");
    store.set(&role_path(address), vec![role.to_byte()]);
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::{get_role, set_role, Role};
    use crate::memory::InMemoryStateDb;
    use crate::PrecompileStore;

    #[test]
    fn unknown_callers_have_no_role() {
        let mut db = InMemoryStateDb::default();
        let store = PrecompileStore::new(&mut db);
        let role = get_role(&store, Address::repeat_byte(0x11));
        assert_eq!(Role::None, role);
        assert!(!role.is_enabled());
    }

    #[test]
    fn roles_round_trip_per_address() {
        let mut db = InMemoryStateDb::default();
        let mut store = PrecompileStore::new(&mut db);
        let admin = Address::repeat_byte(0x11);
        let enabled = Address::repeat_byte(0x22);

        set_role(&mut store, admin, Role::Admin);
        set_role(&mut store, enabled, Role::Enabled);

        assert_eq!(Role::Admin, get_role(&store, admin));
        assert_eq!(Role::Enabled, get_role(&store, enabled));
        assert_eq!(Role::None, get_role(&store, Address::repeat_byte(0x33)));
        assert!(get_role(&store, enabled).is_enabled());
    }

    #[test]
    fn revocation_overwrites() {
        let mut db = InMemoryStateDb::default();
        let mut store = PrecompileStore::new(&mut db);
        let caller = Address::repeat_byte(0x44);

        set_role(&mut store, caller, Role::Enabled);
        set_role(&mut store, caller, Role::None);
        assert!(!get_role(&store, caller).is_enabled());
    }
}
