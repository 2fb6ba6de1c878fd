//! # kgorm
//!
//! Client side of the Knowledge Graph ORM: the kg-core HTTP client, the
//! `Store` performing ORM operations over it, configuration and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    apps/kgorm (THE CLIENT)                  │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────────┐  │
//! │  │   CLI       │───▶│   Store     │───▶│  KgApi         │  │
//! │  │  (clap)     │    │ cache + log │    │  (reqwest)     │  │
//! │  └─────────────┘    └──────┬──────┘    └────────────────┘  │
//! │                            ▼                               │
//! │                    ┌───────────────┐                       │
//! │                    │  kgorm-core   │                       │
//! │                    │  (THE MODEL)  │                       │
//! │                    └───────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod store;

pub use client::{ClientError, KgApi, KgClient, QueryParams, ResultPage};
pub use config::KgConfig;
pub use error::OrmError;
pub use store::{ListOptions, Store};
