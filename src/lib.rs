//! Car Lease Analysis Client Library
//!
//! Client for a lease analysis backend: authenticate, upload a lease PDF,
//! poll a background analysis job, read the loosely structured results,
//! compare saved contracts and chat about them.
//!
//! # Modules
//!
//! - `api_client`: HTTP client for the backend endpoints.
//! - `chat`: Chat transcript bound to one analysis job.
//! - `cli`: Command line and REPL argument definitions.
//! - `comparison`: Ranking of saved contracts by payment, cost and rating.
//! - `config`: Configuration management.
//! - `contracts`: In-memory shelf of saved contracts.
//! - `errors`: Error handling types.
//! - `models`: Core data models.
//! - `normalize`: Variant-key lookups and display defaults.
//! - `orchestrator`: Upload and polling workflow.
//! - `session`: Bearer credential for the running process.

pub mod api_client;
pub mod chat;
pub mod cli;
pub mod comparison;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod session;

pub use api_client::LeaseApiClient;
pub use config::Config;
pub use errors::AppError;
pub use models::{AnalysisResult, StoredContract};
pub use orchestrator::{Orchestrator, PollOutcome, PollSettings};
pub use session::Session;
