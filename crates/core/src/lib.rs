//! Counterline Core - domain types and business rules.
//!
//! This crate is shared by every Counterline component:
//! - `server` - JSON API backing the catalog, POS and settings screens
//! - `cli` - Command-line tools for migrations, demo data and store management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database access,
//! no HTTP clients. The server loads state, hands it to these rules, and persists
//! whatever they decide.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers, contact details and status enums
//! - [`cash`] - Cash-session (till) ledger: open, record sales, close, X/Z reports
//! - [`checkout`] - Sale validation and settlement (payments, change, credit)
//! - [`matching`] - Resolving the pending order a sale fulfils
//! - [`images`] - Product image set rules (limits, ordering, primary image)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cash;
pub mod checkout;
pub mod images;
pub mod matching;
pub mod types;

pub use types::*;
