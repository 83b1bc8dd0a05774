//! State access for the IBC precompile.
//!
//! Protocol records are addressed by IBC store paths (`clients/{id}/...`,
//! `connections/{id}`) while the EVM backend only understands fixed-width
//! slot keys. This crate maps one onto the other and exposes the narrow
//! read/write capabilities the rest of the workspace consumes, plus the
//! caller allow list gating mutating precompile operations.
#![deny(missing_docs, clippy::nursery, clippy::pedantic, warnings)]

pub mod allowlist;
pub mod memory;
pub mod paths;
mod store;

pub use store::{PrecompileStore, StoreReader, StoreWriter};

use alloy_primitives::B256;

/// Raw slot access offered by the host EVM state backend.
///
/// Mutations are confined to the current execution context; if the
/// enclosing call or transaction reverts, the host undoes them. Nothing in
/// this workspace implements rollback itself.
pub trait StateDb {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: B256) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&mut self, key: B256, value: Vec<u8>);

    /// Returns whether a value exists under `key`.
    fn exists(&self, key: B256) -> bool {
        self.get(key).is_some()
    }
}
