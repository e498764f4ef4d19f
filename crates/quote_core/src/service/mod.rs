//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own connection lifecycle so callers never touch the store directly.

pub mod quote_service;
