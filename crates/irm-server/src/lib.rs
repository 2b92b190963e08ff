//! IRM Server Library
//!
//! Change-capture backend for the IRM platform: every create, update, and
//! delete that goes through a unit of work is recorded in an append-only
//! audit trail, in the same database transaction as the change itself.
//!
//! # Overview
//!
//! - **Unit of work**: stage entity mutations, commit them atomically
//! - **Change capture**: a pre-commit interceptor turns pending changes into
//!   minimal before/after audit records; call sites cannot opt out
//! - **Actor attribution**: task-local actor context installed per request
//!   by [`audit::middleware::ActorLayer`], overridable per unit of work
//! - **Read API**: filtered audit listing and per-record history
//!
//! ## Audit record shape
//!
//! Each row in `audit_log` carries the logical table name, the operation
//! (CREATE, UPDATE, DELETE), the target's primary key (as JSON, plus a
//! queryable integer shortcut for single integer keys), the acting
//! principal, and the before/after attribute maps. Creates store a full
//! `after` snapshot; updates store only the attributes that actually
//! changed; deletes store the full prior state as `before`.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing and middleware
//! - **SQLx**: PostgreSQL access and migrations
//! - **Tower**: the actor-context layer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use irm_server::{api, config::Config, domain};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let registry = Arc::new(domain::build_registry()?);
//!     let db = sqlx::PgPool::connect(&config.database.url).await?;
//!     api::serve(config, api::AppState { db, registry }).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod uow;

// Re-export commonly used types
pub use error::AppError;
pub use uow::{UnitOfWork, UowError};
