//! Reconciliation of provider change-sets against local records.
//!
//! One sync run produces three ordered lists of records: added, removed,
//! and modified. This module owns the decisions the pipeline makes about
//! them before any row is written:
//! - `changeset` - the change-set container and its apply-order contract
//! - `pending` - pairing added records with the pending rows they replace
//! - `dedup` - the duplicate predicate over existing rows
//! - `import` - validation of flat-file import records

pub mod changeset;
pub mod dedup;
pub mod import;
pub mod pending;

pub use changeset::{ApplyPhase, ChangeSet, IncomingRecord, RemovedRecord};
pub use dedup::{DuplicateProbe, ExistingRow, is_duplicate};
pub use import::{ImportRecord, ImportSkip, ParsedImport, parse_import};
pub use pending::{PendingPairs, pending_pairs};
