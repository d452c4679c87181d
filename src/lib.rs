//! entity-index library
//!
//! Indexes directory trees whose file names encode key/value entities, and
//! resolves which JSON sidecars apply to each file. The [`layout`] module
//! holds the walk and the resolver; [`db`] persists their records in SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod layout;
pub mod store;
pub mod types;
