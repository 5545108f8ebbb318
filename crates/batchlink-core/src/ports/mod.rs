//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ISessionStore`] - Persistent storage for batch sessions
//! - [`IMatchQueryService`] - Batched "value IN (...)" lookups
//! - [`ITokenService`] - Upload credential reservation
//! - [`IAssetStore`] - File byte storage
//! - [`IRecordService`] - Base record fetch/save with version checks
//! - [`ILocalFiles`] - Reading selected local files

pub mod asset_store;
pub mod local_files;
pub mod match_query;
pub mod record_service;
pub mod session_store;
pub mod token_service;

pub use asset_store::IAssetStore;
pub use local_files::ILocalFiles;
pub use match_query::{IMatchQueryService, MatchQuery, MatchRow};
pub use record_service::IRecordService;
pub use session_store::ISessionStore;
pub use token_service::ITokenService;
