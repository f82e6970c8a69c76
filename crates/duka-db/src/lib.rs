//! # duka-db: Persistence Collaborator for Duka POS
//!
//! Durable home for the records duka-core produces. Every record is stored
//! as JSON under a `(collection, id)` key; a unit of work is written inside
//! one SQLite transaction so a failed step leaves nothing behind.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Duka POS Data Flow                              │
//! │                                                                         │
//! │  duka-core operation ──► Outcome { record, UnitOfWork }                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     duka-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐    ┌─────────────┐  │   │
//! │  │   │   Database    │    │ CollectionStore │    │ Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  get / save /   │    │ (embedded)  │  │   │
//! │  │   │               │◄───│  delete / all   │    │             │  │   │
//! │  │   │ persist(uow)  │    └─────────────────┘    │ 001_...sql  │  │   │
//! │  │   │ load_state()  │                           └─────────────┘  │   │
//! │  │   └───────────────┘                                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Collection store and unit-of-work persistence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_core::{SaleEngine, SharedPos};
//! use duka_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/duka.db")).await?;
//! let settings = db.load_settings().await?;
//! let pos = SharedPos::new(db.load_state().await?);
//!
//! let outcome = pos.transact(|state| SaleEngine::new(&settings).complete_sale(state, request))?;
//! db.persist(&outcome.changes).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::collection::{CollectionStore, Record};
