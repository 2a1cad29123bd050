//! # PCAT Common Library
//!
//! Shared code for the product catalog:
//! - Catalog models (items, tags, relations, audit entries)
//! - Containment matrix between catalog levels
//! - Level inference heuristics
//! - CSV import/export/validation engine
//! - Store interface with SQLite and remote RPC implementations
//! - Catalog facade and configuration loading

pub mod catalog;
pub mod classify;
pub mod config;
pub mod containment;
pub mod csv;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod text;

pub use catalog::{Catalog, CatalogOptions};
pub use error::{Error, Result};
pub use models::{CatalogItem, CatalogTag, ItemDraft, Level};
pub use store::CatalogStore;
