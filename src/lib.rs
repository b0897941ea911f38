//! Partitioned compression and deduplication for structured formats whose
//! bytes belong to more than one principal.
//!
//! Compressing unrelated principals' data in one zlib stream lets an
//! attacker who controls one principal's input (and can observe the
//! compressed output size) infer facts about another principal's data
//! through the compressed size — the class of attack behind CRIME and
//! BREACH. This crate splits such input along principal boundaries first,
//! then compresses each principal's share in its own independent stream via
//! the [`msc`] codec, and reassembles a single self-delimiting blob.
//!
//! Three format-aware partitioners turn structured input into the
//! `(bucket, bytes)` fragments the codec expects:
//! - [`partition::filesystem`] — a directory tree, one fragment per file
//! - [`partition::xml`] — an XML document, one fragment per element or run
//!   of inter-element text
//! - [`partition::sqlite`] — a SQLite database file, one fragment per row
//!   (plus page-structure metadata, always attributed to the null bucket)
//!
//! [`dedup`] deduplicates files, but only within a single bucket: two files
//! that happen to be byte-identical must never collapse into one copy if
//! they belong to different principals, since which principal's bytes
//! survive the collapse is an access-control decision this crate will not
//! make on the caller's behalf.
//!
//! [`end_to_end`] wires the pieces above into the shapes most callers want:
//! compress a whole SQLite database, compress a whole XML document, or
//! deduplicate a whole directory tree.

#![warn(missing_docs)]

#[cfg(feature = "filesystem")]
pub mod dedup;
pub mod end_to_end;
pub mod error;
pub mod msc;
pub mod partition;
pub mod principal;
pub mod stream;

pub use error::{Error, Result};
pub use principal::{AccessControlPolicy, BucketLabel, PartitionPolicy, Principal};
