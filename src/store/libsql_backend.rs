//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::content::model::{ContentItem, ContentKind};
use crate::error::DatabaseError;
use crate::leads::model::{ContactMessage, Lead, LeadSource, LeadStatus};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn row_err(op: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::Query(format!("{op} row parse: {e}"))
}

const LEAD_COLUMNS: &str = "id, name, email, phone, company, service_interest, budget, message, \
     conversation, page_url, source, status, created_at";

/// Map a libsql Row to a Lead. Column order matches LEAD_COLUMNS.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let err = row_err("lead");
    let id: String = row.get(0).map_err(&err)?;
    let conversation: String = row.get(8).map_err(&err)?;
    let source: String = row.get(10).map_err(&err)?;
    let status: String = row.get(11).map_err(&err)?;
    let created: String = row.get(12).map_err(&err)?;

    Ok(Lead {
        id: parse_uuid(&id),
        name: row.get(1).map_err(&err)?,
        email: row.get(2).map_err(&err)?,
        phone: row.get(3).map_err(&err)?,
        company: row.get(4).map_err(&err)?,
        service_interest: row.get(5).map_err(&err)?,
        budget: row.get(6).map_err(&err)?,
        message: row.get(7).map_err(&err)?,
        conversation: serde_json::from_str(&conversation)
            .map_err(|e| DatabaseError::Serialization(format!("lead conversation: {e}")))?,
        page_url: row.get(9).ok(),
        source: source.parse().unwrap_or(LeadSource::Form),
        status: status.parse().unwrap_or_default(),
        created_at: parse_datetime(&created),
    })
}

fn row_to_contact(row: &libsql::Row) -> Result<ContactMessage, DatabaseError> {
    let err = row_err("contact");
    let id: String = row.get(0).map_err(&err)?;
    let created: String = row.get(5).map_err(&err)?;
    Ok(ContactMessage {
        id: parse_uuid(&id),
        name: row.get(1).map_err(&err)?,
        email: row.get(2).map_err(&err)?,
        subject: row.get(3).ok(),
        message: row.get(4).map_err(&err)?,
        created_at: parse_datetime(&created),
    })
}

const CONTENT_COLUMNS: &str = "id, kind, position, published, data, created_at, updated_at";

fn row_to_content(row: &libsql::Row) -> Result<ContentItem, DatabaseError> {
    let err = row_err("content");
    let id: String = row.get(0).map_err(&err)?;
    let kind: String = row.get(1).map_err(&err)?;
    let published: i64 = row.get(3).map_err(&err)?;
    let data: String = row.get(4).map_err(&err)?;
    let created: String = row.get(5).map_err(&err)?;
    let updated: String = row.get(6).map_err(&err)?;

    Ok(ContentItem {
        id: parse_uuid(&id),
        kind: kind.parse().map_err(DatabaseError::Serialization)?,
        position: row.get(2).map_err(&err)?,
        published: published != 0,
        data: serde_json::from_str(&data)
            .map_err(|e| DatabaseError::Serialization(format!("content data: {e}")))?,
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

async fn collect<T>(
    mut rows: libsql::Rows,
    op: &str,
    map: fn(&libsql::Row) -> Result<T, DatabaseError>,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
    {
        out.push(map(&row)?);
    }
    Ok(out)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Leads ───────────────────────────────────────────────────────

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        let conversation = serde_json::to_string(&lead.conversation)
            .map_err(|e| DatabaseError::Serialization(format!("lead conversation: {e}")))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO leads ({LEAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    lead.id.to_string(),
                    lead.name.clone(),
                    lead.email.clone(),
                    lead.phone.clone(),
                    lead.company.clone(),
                    lead.service_interest.clone(),
                    lead.budget.clone(),
                    lead.message.clone(),
                    conversation,
                    opt_text(lead.page_url.as_deref()),
                    lead.source.to_string(),
                    lead.status.to_string(),
                    lead.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_lead: {e}")))?;

        debug!(lead_id = %lead.id, source = %lead.source, "Lead inserted into DB");
        Ok(())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_lead: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_lead(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_lead: {e}"))),
        }
    }

    async fn list_leads(&self, limit: i64) -> Result<Vec<Lead>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC LIMIT ?1"),
                params![limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_leads: {e}")))?;
        collect(rows, "list_leads", row_to_lead).await
    }

    async fn update_lead_status(&self, id: Uuid, status: LeadStatus) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE leads SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_lead_status: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "lead".into(),
                id: id.to_string(),
            });
        }
        debug!(lead_id = %id, status = %status, "Lead status updated");
        Ok(())
    }

    // ── Contact messages ────────────────────────────────────────────

    async fn insert_contact(&self, message: &ContactMessage) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO contact_messages (id, name, email, subject, message, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id.to_string(),
                    message.name.clone(),
                    message.email.clone(),
                    opt_text(message.subject.as_deref()),
                    message.message.clone(),
                    message.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_contact: {e}")))?;

        debug!(contact_id = %message.id, "Contact message inserted into DB");
        Ok(())
    }

    async fn list_contacts(&self, limit: i64) -> Result<Vec<ContactMessage>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                "SELECT id, name, email, subject, message, created_at FROM contact_messages ORDER BY created_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_contacts: {e}")))?;
        collect(rows, "list_contacts", row_to_contact).await
    }

    // ── Content ─────────────────────────────────────────────────────

    async fn insert_content(&self, item: &ContentItem) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO content_items ({CONTENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    item.id.to_string(),
                    item.kind.as_str(),
                    item.position,
                    item.published as i64,
                    item.data.to_string(),
                    item.created_at.to_rfc3339(),
                    item.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_content: {e}")))?;

        debug!(content_id = %item.id, kind = %item.kind, "Content item inserted into DB");
        Ok(())
    }

    async fn get_content(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONTENT_COLUMNS} FROM content_items WHERE kind = ?1 AND id = ?2"),
                params![kind.as_str(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_content: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_content(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_content: {e}"))),
        }
    }

    async fn list_content(
        &self,
        kind: ContentKind,
        published_only: bool,
        limit: Option<i64>,
    ) -> Result<Vec<ContentItem>, DatabaseError> {
        let filter = if published_only { " AND published = 1" } else { "" };
        // SQLite reads a negative LIMIT as no limit.
        let limit = limit.unwrap_or(-1);
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CONTENT_COLUMNS} FROM content_items WHERE kind = ?1{filter} ORDER BY position ASC, created_at ASC LIMIT ?2"
                ),
                params![kind.as_str(), limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_content: {e}")))?;
        collect(rows, "list_content", row_to_content).await
    }

    async fn update_content(&self, item: &ContentItem) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE content_items SET position = ?1, published = ?2, data = ?3, updated_at = ?4 WHERE kind = ?5 AND id = ?6",
                params![
                    item.position,
                    item.published as i64,
                    item.data.to_string(),
                    item.updated_at.to_rfc3339(),
                    item.kind.as_str(),
                    item.id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_content: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: item.kind.to_string(),
                id: item.id.to_string(),
            });
        }
        debug!(content_id = %item.id, kind = %item.kind, "Content item updated");
        Ok(())
    }

    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "DELETE FROM content_items WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_content: {e}")))?;
        Ok(changed > 0)
    }

    async fn find_content_by_field(
        &self,
        kind: ContentKind,
        field: &str,
        value: &str,
    ) -> Result<Vec<ContentItem>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CONTENT_COLUMNS} FROM content_items WHERE kind = ?1 AND json_extract(data, '$.' || ?2) = ?3 ORDER BY position ASC, created_at ASC"
                ),
                params![kind.as_str(), field, value],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_content_by_field: {e}")))?;
        collect(rows, "find_content_by_field", row_to_content).await
    }

    async fn delete_content_by_field(
        &self,
        kind: ContentKind,
        field: &str,
        value: &str,
    ) -> Result<u64, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "DELETE FROM content_items WHERE kind = ?1 AND json_extract(data, '$.' || ?2) = ?3",
                params![kind.as_str(), field, value],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_content_by_field: {e}")))?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chat::model::{LeadPayload, Role, TranscriptEntry};

    async fn db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn chat_lead() -> Lead {
        Lead::from_payload(LeadPayload {
            name: "Alex".into(),
            email: "alex@example.com".into(),
            service_interest: "Web Development".into(),
            budget: "$5,000 - $10,000".into(),
            message: "Need a new storefront".into(),
            conversation: vec![TranscriptEntry {
                role: Role::User,
                content: "Alex".into(),
            }],
            page_url: "https://folio.dev/services".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn lead_round_trip() {
        let db = db().await;
        let lead = chat_lead();
        db.insert_lead(&lead).await.unwrap();

        let stored = db.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Alex");
        assert_eq!(stored.source, LeadSource::ChatWidget);
        assert_eq!(stored.status, LeadStatus::New);
        assert_eq!(stored.conversation.len(), 1);
        assert_eq!(stored.page_url.as_deref(), Some("https://folio.dev/services"));

        assert!(db.get_lead(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_lead_status_reports_missing() {
        let db = db().await;
        let lead = chat_lead();
        db.insert_lead(&lead).await.unwrap();

        db.update_lead_status(lead.id, LeadStatus::Contacted).await.unwrap();
        let stored = db.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Contacted);

        let err = db
            .update_lead_status(Uuid::new_v4(), LeadStatus::Closed)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn contacts_listed_newest_first() {
        let db = db().await;
        let mut first = ContactMessage {
            id: Uuid::new_v4(),
            name: "Sam".into(),
            email: "sam@studio.io".into(),
            subject: None,
            message: "First".into(),
            created_at: Utc::now() - chrono::Duration::minutes(5),
        };
        db.insert_contact(&first).await.unwrap();
        first.id = Uuid::new_v4();
        first.message = "Second".into();
        first.subject = Some("Hello".into());
        first.created_at = Utc::now();
        db.insert_contact(&first).await.unwrap();

        let contacts = db.list_contacts(10).await.unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].message, "Second");
        assert_eq!(contacts[0].subject.as_deref(), Some("Hello"));
        assert!(contacts[1].subject.is_none());
    }

    #[tokio::test]
    async fn content_ordering_and_publish_filter() {
        let db = db().await;
        let mut a = ContentItem::new(ContentKind::Slides, json!({"title": "A", "image_url": "/a.png"}));
        a.position = 2;
        let mut b = ContentItem::new(ContentKind::Slides, json!({"title": "B", "image_url": "/b.png"}));
        b.position = 1;
        let mut hidden = ContentItem::new(ContentKind::Slides, json!({"title": "C", "image_url": "/c.png"}));
        hidden.published = false;
        for item in [&a, &b, &hidden] {
            db.insert_content(item).await.unwrap();
        }
        db.insert_content(&ContentItem::new(ContentKind::Services, json!({"title": "S", "summary": "s"})))
            .await
            .unwrap();

        let public = db.list_content(ContentKind::Slides, true, None).await.unwrap();
        let titles: Vec<_> = public.iter().filter_map(|i| i.field("title")).collect();
        assert_eq!(titles, ["B", "A"]);

        let all = db.list_content(ContentKind::Slides, false, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].field("title"), Some("C"));

        let first_two = db.list_content(ContentKind::Slides, false, Some(2)).await.unwrap();
        let titles: Vec<_> = first_two.iter().filter_map(|i| i.field("title")).collect();
        assert_eq!(titles, ["C", "B"]);
    }

    #[tokio::test]
    async fn update_and_delete_content() {
        let db = db().await;
        let mut item = ContentItem::new(ContentKind::Services, json!({"title": "Old", "summary": "s"}));
        db.insert_content(&item).await.unwrap();

        item.data = json!({"title": "New", "summary": "s"});
        item.published = false;
        db.update_content(&item).await.unwrap();
        let stored = db.get_content(ContentKind::Services, item.id).await.unwrap().unwrap();
        assert_eq!(stored.field("title"), Some("New"));
        assert!(!stored.published);

        // Same id under another kind is not visible.
        assert!(db.get_content(ContentKind::Slides, item.id).await.unwrap().is_none());

        assert!(db.delete_content(ContentKind::Services, item.id).await.unwrap());
        assert!(!db.delete_content(ContentKind::Services, item.id).await.unwrap());
        assert!(matches!(
            db.update_content(&item).await.unwrap_err(),
            DatabaseError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn content_lookup_by_document_field() {
        let db = db().await;
        let category = ContentItem::new(ContentKind::SkillCategories, json!({"name": "Frontend"}));
        db.insert_content(&category).await.unwrap();
        let cid = category.id.to_string();
        for name in ["React", "CSS"] {
            db.insert_content(&ContentItem::new(
                ContentKind::Skills,
                json!({"category_id": cid, "name": name}),
            ))
            .await
            .unwrap();
        }

        let skills = db
            .find_content_by_field(ContentKind::Skills, "category_id", &cid)
            .await
            .unwrap();
        assert_eq!(skills.len(), 2);

        let removed = db
            .delete_content_by_field(ContentKind::Skills, "category_id", &cid)
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(db.list_content(ContentKind::Skills, false, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("site.db");
        let lead = chat_lead();
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.insert_lead(&lead).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.list_leads(10).await.unwrap().len(), 1);
    }
}
