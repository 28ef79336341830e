//! Core types for Counterline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod money;
pub mod status;

pub use contact::{ContactError, Email, PhoneNumber};
pub use id::*;
pub use money::{
    CurrencyCode, CurrencyCodeError, MAX_MONEY, MAX_QUANTITY, MONEY_SCALE, QUANTITY_SCALE,
    checked_line_total, checked_sum_money, is_storable_money, is_storable_quantity, round_money,
};
pub use status::*;
