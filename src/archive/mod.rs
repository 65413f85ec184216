//! Download archive assembly
//!
//! A download batch streams each fetched document into one zip archive as it
//! completes. Entry names come from the documents' display names and are made
//! unique within the archive; see [`naming`].

mod builder;
pub mod naming;

pub use builder::{ArchiveBuilder, BuiltArchive};
pub use naming::{NameRegistry, sanitize_entry_name};
