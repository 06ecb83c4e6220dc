//! recordstore: typed record persistence behind one interface.
//!
//! Entities are read, written, queried and deleted without knowing whether
//! they live in a SQLite document database or in a directory of JSON files.
//!
//! # Architecture
//!
//! ## Backends
//!
//! - **Database** (`sqlite://<path>`): one table per collection, JSON documents keyed
//!   by `_id`, a revision counter per document
//! - **File** (any other storage string): `<root>/<collection>/<id>.json`, two-space
//!   pretty-printed
//!
//! The storage string in [`core::config::StoreConfig`] picks the backend on every
//! call, so a running [`core::store::Store`] follows configuration changes.
//!
//! ## Entities
//!
//! Entity types implement [`core::model::Model`]: a collection name, an optional
//! read projection, and `to_object`, which produces the persisted form. Fields
//! marked [`core::record::Field::Absent`] are never written.
//!
//! - `Supporter`: patrons and the guilds they back
//! - `GuildProfile`: per-guild settings
//!
//! # Examples
//!
//! ```no_run
//! use recordstore::core::config::StoreConfig;
//! use recordstore::core::store::Store;
//! use recordstore::entities::Supporter;
//!
//! let store = Store::new(StoreConfig::with_uri("data"));
//! let mut supporter = Supporter::new("user-1");
//! supporter.add_guild("guild-1");
//! store.save(&mut supporter)?;
//!
//! let loaded = store.get::<Supporter>("user-1")?.expect("saved above");
//! assert_eq!(loaded.guilds(), vec!["guild-1"]);
//! # Ok::<(), recordstore::core::error::StoreError>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: record model, backends, configuration, store entry point
//! - [`entities`]: concrete entity types
//! - [`cli`]: the `recordstore` command line

pub mod cli;
pub mod core;
pub mod entities;

pub use crate::core::error::StoreError;
pub use crate::core::model::Model;
pub use crate::core::record::{Field, Object, Record};
pub use crate::core::store::Store;
