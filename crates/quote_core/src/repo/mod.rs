//! Repository layer over the document store.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Keep document layout and view names out of service code.
//!
//! # Invariants
//! - Repository APIs distinguish "not found" (`Ok(None)`) from store
//!   failures (`Err`).

pub mod quote_repo;
