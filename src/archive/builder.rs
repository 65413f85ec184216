use std::io::{Cursor, Read, Seek, Write};

use tracing::{debug, error, warn};
use zip::result::ZipResult;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::naming::NameRegistry;
use crate::config::{ArchiveCompression, ArchiveConfig};
use crate::error::{Error, ItemFailure, Result};
use crate::types::{ArchivedEntry, DocumentContent, ItemOutcome};

/// Produces the buffers an [`ArchiveBuilder`] writes into
type BufferFactory<W> = Box<dyn FnMut() -> W + Send>;

/// Incrementally assembles the zip archive of one download batch.
///
/// Fed from the batch's single reader in completion order. Each successful
/// outcome becomes one entry; failed outcomes pass through untouched.
///
/// Every entry is compressed into a staging buffer of its own and only
/// appended to the shared archive once staging completed, so a document that
/// fails to compress never leaves a partial entry behind. The archive and the
/// staging buffers all come from the same factory; [`ArchiveBuilder::new`]
/// keeps everything in memory.
pub struct ArchiveBuilder<W: Read + Write + Seek = Cursor<Vec<u8>>> {
    writer: ZipWriter<W>,
    make_buffer: BufferFactory<W>,
    compression: CompressionMethod,
    names: NameRegistry,
    entries: usize,
    /// Set once appending to the shared archive failed; the archive can no longer be finalized
    broken: Option<String>,
}

/// Output of [`ArchiveBuilder::build`]
#[derive(Debug)]
pub struct BuiltArchive {
    /// Archive bytes; `None` when no entry was written
    pub archive: Option<Vec<u8>>,
    /// Entries written
    pub success_count: usize,
    /// Items that failed before or while being written
    pub failure_count: usize,
}

impl ArchiveBuilder {
    /// Start an empty in-memory archive
    pub fn new(config: &ArchiveConfig) -> Self {
        Self::with_buffers(config, || Cursor::new(Vec::new()))
    }

    /// Assemble a whole archive from already-collected outcomes
    pub fn build(
        config: &ArchiveConfig,
        outcomes: impl IntoIterator<Item = ItemOutcome<DocumentContent>>,
    ) -> Result<BuiltArchive> {
        let mut builder = Self::new(config);
        let mut success_count = 0;
        let mut failure_count = 0;

        for outcome in outcomes {
            if builder.add(outcome).is_success() {
                success_count += 1;
            } else {
                failure_count += 1;
            }
        }

        Ok(BuiltArchive {
            archive: builder.finish()?,
            success_count,
            failure_count,
        })
    }

    /// Finalize the archive and return its bytes.
    ///
    /// Returns `Ok(None)` when no entry was written, so an all-failed batch
    /// never produces an empty archive. Failing to finalize is a batch-level
    /// error.
    pub fn finish(self) -> Result<Option<Vec<u8>>> {
        Ok(self.into_inner()?.map(Cursor::into_inner))
    }
}

impl<W: Read + Write + Seek> ArchiveBuilder<W> {
    /// Start an empty archive whose output and staging buffers come from `make_buffer`.
    ///
    /// The first buffer produced holds the archive itself; every entry then
    /// asks for one more to stage in.
    pub fn with_buffers<F>(config: &ArchiveConfig, mut make_buffer: F) -> Self
    where
        F: FnMut() -> W + Send + 'static,
    {
        let compression = match config.compression {
            ArchiveCompression::Stored => CompressionMethod::Stored,
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
        };

        Self {
            writer: ZipWriter::new(make_buffer()),
            make_buffer: Box::new(make_buffer),
            compression,
            names: NameRegistry::new(),
            entries: 0,
            broken: None,
        }
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Write a successful outcome as an entry; failed outcomes are passed through
    pub fn add(&mut self, outcome: ItemOutcome<DocumentContent>) -> ItemOutcome<ArchivedEntry> {
        let ItemOutcome {
            index,
            identifier,
            result,
        } = outcome;

        let result = result.and_then(|content| self.write_entry(index, &content));
        ItemOutcome {
            index,
            identifier,
            result,
        }
    }

    /// Write one document under a unique entry name.
    ///
    /// If staging fails the name is released and the archive stays usable for
    /// the remaining documents. If appending the staged entry fails, the
    /// shared archive is left inconsistent: this and every later entry fail
    /// and [`ArchiveBuilder::into_inner`] reports [`Error::Archive`].
    pub fn write_entry(
        &mut self,
        source_index: usize,
        content: &DocumentContent,
    ) -> std::result::Result<ArchivedEntry, ItemFailure> {
        if let Some(reason) = &self.broken {
            return Err(ItemFailure::internal(format!(
                "archive unavailable after earlier write failure: {}",
                reason
            )));
        }

        let name = self.names.claim(&content.name);
        let size_bytes = content.bytes.len() as u64;

        let staged = match self.stage(&name, content) {
            Ok(staged) => staged,
            Err(e) => {
                warn!(
                    source_index,
                    entry = %name,
                    error = %e,
                    "Failed to stage archive entry"
                );
                self.names.release(&name);
                return Err(ItemFailure::internal(format!(
                    "failed to write archive entry '{}': {}",
                    name, e
                )));
            }
        };

        if let Err(e) = self.append(staged) {
            error!(
                source_index,
                entry = %name,
                error = %e,
                "Failed to append archive entry, archive is no longer usable"
            );
            self.broken = Some(e.to_string());
            return Err(ItemFailure::internal(format!(
                "failed to write archive entry '{}': {}",
                name, e
            )));
        }

        self.entries += 1;
        debug!(source_index, entry = %name, size_bytes, "Wrote archive entry");

        Ok(ArchivedEntry {
            name,
            size_bytes,
            source_index,
        })
    }

    /// Compress one document into a single-entry archive of its own
    fn stage(&mut self, name: &str, content: &DocumentContent) -> ZipResult<W> {
        let options = FileOptions::default()
            .compression_method(self.compression)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644)
            .large_file(content.bytes.len() as u64 >= u64::from(u32::MAX));

        let mut stage = ZipWriter::new((self.make_buffer)());
        stage.start_file(name, options)?;
        stage.write_all(&content.bytes)?;
        stage.finish()
    }

    /// Copy the staged entry's compressed bytes into the shared archive
    fn append(&mut self, staged: W) -> ZipResult<()> {
        let mut staged = ZipArchive::new(staged)?;
        let entry = staged.by_index_raw(0)?;
        self.writer.raw_copy_file(entry)
    }

    /// Finalize the archive and return the underlying writer.
    ///
    /// Returns `Ok(None)` when no entry was written.
    pub fn into_inner(mut self) -> Result<Option<W>> {
        if let Some(reason) = self.broken.take() {
            error!(entries = self.entries, error = %reason, "Archive was left incomplete");
            return Err(Error::Archive(format!(
                "archive left incomplete by a failed entry write: {}",
                reason
            )));
        }

        if self.entries == 0 {
            debug!("No entries written, skipping archive finalization");
            return Ok(None);
        }

        let inner = self.writer.finish().map_err(|e| {
            error!(entries = self.entries, error = %e, "Failed to finalize archive");
            Error::Archive(format!("failed to finalize archive: {}", e))
        })?;

        Ok(Some(inner))
    }
}
