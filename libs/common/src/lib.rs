//! Common library for the Snapframe application
//!
//! This crate provides shared functionality used across the Snapframe
//! services, including database connectivity and error handling.

pub mod database;
pub mod error;
