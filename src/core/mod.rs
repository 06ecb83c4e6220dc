//! Core of the record store: the record model, the backend strategies and
//! the `Store` entry point that dispatches between them.

pub mod audit;
pub mod backend;
pub mod config;
pub mod database;
pub mod db;
pub mod error;
pub mod files;
pub mod model;
pub mod pool;
pub mod record;
pub mod store;
pub mod time;
