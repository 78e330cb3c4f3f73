//! Shared models and utilities

pub mod cancel;
pub mod models;
pub mod testkit;

pub use cancel::CancelToken;
