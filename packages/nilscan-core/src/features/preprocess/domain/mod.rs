//! Preprocessor domain types

pub mod comp_token;

pub use comp_token::CompToken;
