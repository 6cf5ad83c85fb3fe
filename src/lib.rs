//! # MedSplit
//!
//! Backend for a community medicine-access app: a personal medical document
//! library with fuzzy search, micro grants that neighbours fund in small
//! pieces, free-text entries, and a relay to a chat assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐      ┌───────────────┐
//! │ medsplit-core│◀─────│  data.json     │
//! │ search/grants│      │  (DataFile)    │
//! │ chat/models  │      └───────┬───────┘
//! └──────┬───────┘              │
//!        │          ┌───────────┤
//!        ▼          ▼           ▼
//!   ┌──────────┐ ┌──────────┐ ┌──────────────┐
//!   │   CLI    │ │   HTTP   │ │ chat backend │
//!   │(medsplit)│ │  (axum)  │ │  (reqwest)   │
//!   └──────────┘ └──────────┘ └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medsplit init
//! medsplit documents add --name "Metformin Prescription" --type prescription --file-type pdf
//! medsplit search "met"
//! medsplit serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`data`] | The JSON data file and its [`Store`](medsplit_core::store::Store) impl |
//! | [`search`] | `search` command output |
//! | [`documents`] | Document library commands |
//! | [`grants`] | Micro grants over the data file |
//! | [`entries`] | Free-text entries |
//! | [`chat`] | Chat backend client |
//! | [`server`] | HTTP API |

pub mod chat;
pub mod config;
pub mod data;
pub mod documents;
pub mod entries;
pub mod grants;
pub mod search;
pub mod server;
