//! The light-client module boundary of the IBC precompile.
//!
//! The dispatcher never inspects consensus mathematics; it drives the
//! [`LightClientModule`] trait with serialized protocol records and a store
//! capability scoped to the current call. The Tendermint implementation in
//! this crate delegates header verification to `tendermint-light-client-verifier`
//! via `ibc-client-tendermint` and proof checking to
//! `ibc-core-commitment-types`; swapping it for a stub leaves the dispatcher
//! untouched.
#![deny(missing_docs, clippy::nursery, clippy::pedantic, warnings)]

mod error;
mod module;
mod tendermint_client;
mod validation;

pub use error::LightClientError;
pub use module::LightClientModule;
pub use tendermint_client::TendermintLightClient;
