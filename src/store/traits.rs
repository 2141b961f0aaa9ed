//! `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::content::model::{ContentItem, ContentKind};
use crate::error::DatabaseError;
use crate::leads::model::{ContactMessage, Lead, LeadStatus};

/// Backend-agnostic database trait covering leads, contact messages and content.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Leads ───────────────────────────────────────────────────────

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError>;

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError>;

    /// Newest first.
    async fn list_leads(&self, limit: i64) -> Result<Vec<Lead>, DatabaseError>;

    /// Returns `NotFound` if no lead has this id.
    async fn update_lead_status(&self, id: Uuid, status: LeadStatus) -> Result<(), DatabaseError>;

    // ── Contact messages ────────────────────────────────────────────

    async fn insert_contact(&self, message: &ContactMessage) -> Result<(), DatabaseError>;

    /// Newest first.
    async fn list_contacts(&self, limit: i64) -> Result<Vec<ContactMessage>, DatabaseError>;

    // ── Content ─────────────────────────────────────────────────────

    async fn insert_content(&self, item: &ContentItem) -> Result<(), DatabaseError>;

    async fn get_content(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, DatabaseError>;

    /// Items of one kind, ordered by `position` then `created_at`, at most
    /// `limit` of them when given.
    async fn list_content(
        &self,
        kind: ContentKind,
        published_only: bool,
        limit: Option<i64>,
    ) -> Result<Vec<ContentItem>, DatabaseError>;

    /// Replace position, published flag and document. Returns `NotFound` if missing.
    async fn update_content(&self, item: &ContentItem) -> Result<(), DatabaseError>;

    /// Returns `true` if a row was deleted.
    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<bool, DatabaseError>;

    /// Items whose document has `field` equal to `value`.
    async fn find_content_by_field(
        &self,
        kind: ContentKind,
        field: &str,
        value: &str,
    ) -> Result<Vec<ContentItem>, DatabaseError>;

    /// Delete items whose document has `field` equal to `value`. Returns the count.
    async fn delete_content_by_field(
        &self,
        kind: ContentKind,
        field: &str,
        value: &str,
    ) -> Result<u64, DatabaseError>;
}
