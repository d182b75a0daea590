// src/history/mod.rs
//! Persisted run state: which inner archives are done, and when the outer archive was last handled.

pub mod last_run;
pub mod processed;

pub use last_run::LastRun;
pub use processed::ProcessedLedger;
