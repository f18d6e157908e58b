//! Federated substring search entry points.
//!
//! # Responsibility
//! - Search every catalogued entity by free text in one query.
//! - Keep result shaping (grouping by origin table) inside core.

pub mod federated;
