//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep adapter/CLI layers decoupled from storage details.

pub mod quote_service;
