//! Feature modules
//!
//! Each feature is one sub-analysis or a vocabulary they share; the
//! pipeline module wires them together per package.

pub mod affiliation;
pub mod assertion;
pub mod backprop;
pub mod contracts;
pub mod diagnostics;
pub mod functions;
pub mod globals;
pub mod inference;
pub mod preprocess;
