//! Domain model for the quote catalog.
//!
//! # Responsibility
//! - Define the records stored by core (quotes, tags, sources, source types).
//! - Own input validation rules that do not need storage access.
//!
//! # Invariants
//! - Every stored record is identified by a storage-assigned integer id.
//! - A quote's tag set is fixed when the quote is created.

pub mod catalog;
pub mod quote;
