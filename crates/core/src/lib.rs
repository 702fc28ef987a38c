//! Core types and utilities for the cross-rate price feed
//!
//! This crate provides shared pieces used across all components:
//! - Round data and reading types
//! - Fixed-point scaling and cross-rate math
//! - The price feed error taxonomy and its ABI encoding
//! - Feed configuration

pub mod types;
pub mod math;
pub mod abi;
pub mod config;
pub mod errors;

pub use types::*;
pub use math::*;
pub use config::*;
pub use errors::*;

pub use alloy_primitives::{Address, Bytes, I256, U256};
