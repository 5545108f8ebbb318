//! Batchlink Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `WorkItem`, `WorkBatch`, `BatchSession`, `BaseRecord`
//! - **Use cases** - `Matcher`, `TokenReservation`, `UploadOperation`, `DeleteOperation`, `Reconciler`
//! - **Port definitions** - Traits for adapters: `ISessionStore`, `IMatchQueryService`,
//!   `ITokenService`, `IAssetStore`, `IRecordService`, `ILocalFiles`
//! - **Status taxonomy** - Per-item eligibility, success and cancellation reasons
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
