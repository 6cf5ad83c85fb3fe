//! # MedSplit Core
//!
//! Pure logic shared by the MedSplit CLI and HTTP server: document and
//! grant models, the fuzzy document search, micro-grant rules, chat
//! transcript helpers, and the storage abstraction.
//!
//! This crate performs no file or network I/O and pulls in no async
//! runtime. Everything here is deterministic given its inputs.

pub mod chat;
pub mod grants;
pub mod models;
pub mod search;
pub mod store;
