//! Background jobs executed by the job scheduler service.
//!
//! Jobs are idempotent and fault-tolerant: each work item is wrapped so one
//! failure never cancels the rest of the run, and re-running a job only
//! fills in whatever a previous run missed.

pub mod snapshot_job;
