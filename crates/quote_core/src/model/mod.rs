//! Domain model for stored quotes.
//!
//! # Invariants
//! - A quote's `name` doubles as its document key; renaming is not modeled.

pub mod quote;
