//! SchemaPact engine - contract validation
//!
//! This crate implements the diff between what a transformation project
//! provides (source) and what API models require (target):
//! - Missing tables and missing required columns (critical)
//! - Missing optional columns (warning)
//! - Typo suggestions for the missing names

pub mod contract_diff;
pub mod suggest;

pub use contract_diff::{validate, ContractDiff, NO_TABLE};
pub use suggest::{similar_columns, similar_tables};
