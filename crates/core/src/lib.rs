//! `linereport-core` — domain foundation for the line-worker reporting client.
//!
//! This crate contains **pure domain** primitives (no storage or network
//! concerns): strongly-typed identifiers, the report payload model, and the
//! persisted shape of a queued submission.

pub mod error;
pub mod id;
pub mod report;

pub use error::{DomainError, DomainResult};
pub use id::{ErrorCodeId, LineId, ReportId, UserId};
pub use report::{ErrorCodeRef, PhotoRef, QueuedReport, ReportDraft, ReportPayload};
