//! # Repo Docstore
//!
//! A JSON document store whose database is a Git repository.
//!
//! Collections of documents live as JSON arrays in files on one branch of a
//! hosted repository. Reads decode the file through the hosted Git contents
//! API; writes read the collection, change it in memory and commit the
//! result back, touching every file of the change in a single commit.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP request
//!       │
//!       ▼
//! ┌────────────┐   ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   server   │──▶│ DocumentStore │──▶│    commit    │──▶│    remote    │
//! │ (+ auth)   │   │    facade     │   │ 6-step write │   │ git data API │
//! └────────────┘   └──────┬────────┘   └──────────────┘   └──────────────┘
//!                         │
//!                         ▼
//!                  ┌──────────────┐
//!                  │    mirror    │  local dev: db/ + public/data/
//!                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=...            # bearer credential for the repository
//! export ADMIN_PASSWORD=...          # shared secret for writes
//! docstore serve remote              # API backed by the repository
//! docstore serve local               # API backed by ./db and ./public/data
//! docstore client list events
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Collections, revisions, file formatting |
//! | [`error`] | Error taxonomy and HTTP status mapping |
//! | [`remote`] | Hosted Git API client |
//! | [`commit`] | Atomic multi-file commit |
//! | [`documents`] | Id assignment and lookup rules |
//! | [`store`] | Document store trait and repository backend |
//! | [`mirror`] | Local two-directory backend |
//! | [`auth`] | Shared-secret gate for writes |
//! | [`server`] | HTTP API |
//! | [`client`] | API client with static fallback |

pub mod auth;
pub mod client;
pub mod commit;
pub mod config;
pub mod documents;
pub mod error;
pub mod mirror;
pub mod models;
pub mod remote;
pub mod server;
pub mod store;
