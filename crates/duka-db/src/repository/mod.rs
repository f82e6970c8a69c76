//! # Repository Module
//!
//! Collection-oriented access to the store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.collection::<Product>()            db.persist(&unit_of_work)        │
//! │  ├── get_all()                         └── one SQLite transaction,      │
//! │  ├── get(id) / find(id)                    fixed collection order       │
//! │  ├── save(&record)                                                      │
//! │  └── delete(id)                        db.load_state()                  │
//! │       │                                └── PosState snapshot            │
//! │       ▼                                                                 │
//! │  records (collection, id, payload, updated_at)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`collection::CollectionStore`] - get/save/delete for one record type
//! - [`unit_of_work`] - ordered, transactional writes and state loading
//! - [`settings`] - validated store configuration

pub mod collection;
pub mod settings;
pub mod unit_of_work;

#[cfg(test)]
mod test_support;
