//! Audit trail: entity snapshots, field diffs and the action log.
//!
//! Snapshots only contain allow-listed fields rendered as text, so a diff of two
//! snapshots is stable across serializations. Entries are written through an
//! [`AuditStore`] inside the caller's unit of work.

pub mod diff;
pub mod models;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use diff::{diff, FieldChange, FieldDiff};
pub use models::{ActionKind, ActorActivity, AuditLogEntry, AuditStatistics, NewAuditEntry};
pub use snapshot::{serialize, serialize_at, tracked_fields, Auditable, EntityKind, EntityRef, FieldValue, Snapshot};
pub use store::AuditStore;
pub use writer::{AuditTrail, LinkOrigin};
