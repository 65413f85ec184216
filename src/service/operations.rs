//! Per-item operations for the three batch kinds.
//!
//! Uploads and deletes change the store, so once one has started it runs to
//! completion and its outcome matches what the store holds; the deadline only
//! keeps new ones from starting. Downloads only read and are cut short when
//! the deadline passes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::batch::{DeadlineContext, ItemOperation};
use crate::error::ItemFailure;
use crate::store::DocumentStore;
use crate::types::{DocumentContent, DocumentId, StoredDocument, UploadItem};

/// Store one uploaded file
pub struct UploadOperation {
    store: Arc<dyn DocumentStore>,
}

impl UploadOperation {
    /// Operation writing into `store`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemOperation for UploadOperation {
    type Item = UploadItem;
    type Output = StoredDocument;

    async fn execute(
        &self,
        ctx: &DeadlineContext,
        item: UploadItem,
    ) -> Result<StoredDocument, ItemFailure> {
        ctx.check()?;
        self.store.store(item).await.map_err(ItemFailure::from)
    }
}

/// Delete one document by id
pub struct DeleteOperation {
    store: Arc<dyn DocumentStore>,
}

impl DeleteOperation {
    /// Operation deleting from `store`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemOperation for DeleteOperation {
    type Item = String;
    type Output = DocumentId;

    async fn execute(
        &self,
        ctx: &DeadlineContext,
        raw_id: String,
    ) -> Result<DocumentId, ItemFailure> {
        let id = DocumentId::parse(&raw_id)?;
        ctx.check()?;
        self.store.delete(id).await.map_err(ItemFailure::from)?;
        Ok(id)
    }
}

/// Fetch one document's content for the archive
pub struct DownloadOperation {
    store: Arc<dyn DocumentStore>,
}

impl DownloadOperation {
    /// Operation reading from `store`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemOperation for DownloadOperation {
    type Item = String;
    type Output = DocumentContent;

    async fn execute(
        &self,
        ctx: &DeadlineContext,
        raw_id: String,
    ) -> Result<DocumentContent, ItemFailure> {
        let id = DocumentId::parse(&raw_id)?;
        ctx.bound(async move { self.store.fetch(id).await.map_err(ItemFailure::from) })
            .await
    }
}
