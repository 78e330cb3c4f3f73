//! Pipeline orchestration
//!
//! The sub-analyzer DAG, the per-package pass context, and the coordinator
//! that executes stages in dependency order with panic containment.

pub mod dag;
pub mod orchestrator;
pub mod pass;
pub mod result;

pub use dag::{StageDag, StageId, StageState};
pub use orchestrator::run_package;
pub use pass::{FactStore, MemoryFactStore, Pass};
pub use result::{PackageResult, StageResult};
