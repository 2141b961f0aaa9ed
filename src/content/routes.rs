//! Public content routes and admin content CRUD.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::model::{ContentInput, ContentItem, ContentKind};
use crate::error::{ApiError, ValidationError};
use crate::server::ListQuery;
use crate::store::Database;

/// How many posts the home page shows.
const HOME_BLOG_COUNT: usize = 3;

/// Shared state for content routes.
#[derive(Clone)]
pub struct ContentRouteState {
    pub db: Arc<dyn Database>,
}

fn parse_kind(raw: &str) -> Result<ContentKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown content kind: {raw}")))
}

fn missing(kind: ContentKind, id: Uuid) -> ApiError {
    ApiError::not_found(format!("No {kind} item with id {id}"))
}

/// A skill category with its skills nested.
#[derive(Debug, Serialize)]
pub struct SkillGroup {
    #[serde(flatten)]
    pub category: ContentItem,
    pub skills: Vec<ContentItem>,
}

async fn skill_groups(db: &dyn Database) -> Result<Vec<SkillGroup>, ApiError> {
    let categories = db.list_content(ContentKind::SkillCategories, true, None).await?;
    let mut skills = db.list_content(ContentKind::Skills, true, None).await?;

    Ok(categories
        .into_iter()
        .map(|category| {
            let id = category.id.to_string();
            let (mine, rest): (Vec<_>, Vec<_>) = skills
                .drain(..)
                .partition(|s| s.field("category_id") == Some(id.as_str()));
            skills = rest;
            SkillGroup {
                category,
                skills: mine,
            }
        })
        .collect())
}

// ── Public ──────────────────────────────────────────────────────────

/// GET /api/content/{kind}
async fn list_published(
    State(state): State<ContentRouteState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.db.list_content(kind, true, None).await?))
}

/// GET /api/content/{kind}/{id}
async fn get_published(
    State(state): State<ContentRouteState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<ContentItem>, ApiError> {
    let kind = parse_kind(&kind)?;
    match state.db.get_content(kind, id).await? {
        Some(item) if item.published => Ok(Json(item)),
        _ => Err(missing(kind, id)),
    }
}

/// GET /api/blogs/{slug}
async fn blog_by_slug(
    State(state): State<ContentRouteState>,
    Path(slug): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    state
        .db
        .find_content_by_field(ContentKind::Blogs, "slug", &slug)
        .await?
        .into_iter()
        .find(|item| item.published)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No blog post with slug {slug}")))
}

/// GET /api/skills
async fn list_skills(
    State(state): State<ContentRouteState>,
) -> Result<Json<Vec<SkillGroup>>, ApiError> {
    Ok(Json(skill_groups(state.db.as_ref()).await?))
}

#[derive(Serialize)]
struct Resume {
    education: Vec<ContentItem>,
    certifications: Vec<ContentItem>,
    skills: Vec<SkillGroup>,
}

/// GET /api/resume
async fn resume(State(state): State<ContentRouteState>) -> Result<Json<Resume>, ApiError> {
    let db = state.db.as_ref();
    Ok(Json(Resume {
        education: db.list_content(ContentKind::Education, true, None).await?,
        certifications: db.list_content(ContentKind::Certifications, true, None).await?,
        skills: skill_groups(db).await?,
    }))
}

#[derive(Serialize)]
struct Home {
    slides: Vec<ContentItem>,
    services: Vec<ContentItem>,
    reviews: Vec<ContentItem>,
    latest_blogs: Vec<ContentItem>,
}

/// GET /api/home
async fn home(State(state): State<ContentRouteState>) -> Result<Json<Home>, ApiError> {
    let db = state.db.as_ref();
    let mut blogs = db.list_content(ContentKind::Blogs, true, None).await?;
    blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    blogs.truncate(HOME_BLOG_COUNT);

    Ok(Json(Home {
        slides: db.list_content(ContentKind::Slides, true, None).await?,
        services: db.list_content(ContentKind::Services, true, None).await?,
        reviews: db.list_content(ContentKind::Reviews, true, None).await?,
        latest_blogs: blogs,
    }))
}

/// Build the public content routes.
pub fn content_routes(state: ContentRouteState) -> Router {
    Router::new()
        .route("/api/content/{kind}", get(list_published))
        .route("/api/content/{kind}/{id}", get(get_published))
        .route("/api/blogs/{slug}", get(blog_by_slug))
        .route("/api/skills", get(list_skills))
        .route("/api/resume", get(resume))
        .route("/api/home", get(home))
        .with_state(state)
}

// ── Admin ───────────────────────────────────────────────────────────

/// Checks that need the store: skill categories must exist and blog slugs
/// must be unique.
async fn check_references(
    db: &dyn Database,
    kind: ContentKind,
    data: &serde_json::Value,
    own_id: Option<Uuid>,
) -> Result<(), ApiError> {
    match kind {
        ContentKind::Skills => {
            let category = data
                .get("category_id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or(ValidationError::MissingField("category_id"))?;
            if db
                .get_content(ContentKind::SkillCategories, category)
                .await?
                .is_none()
            {
                return Err(ValidationError::InvalidField {
                    field: "category_id",
                    reason: format!("no skill category with id {category}"),
                }
                .into());
            }
        }
        ContentKind::Blogs => {
            let slug = data.get("slug").and_then(|v| v.as_str()).unwrap_or_default();
            let taken = db
                .find_content_by_field(ContentKind::Blogs, "slug", slug)
                .await?
                .into_iter()
                .any(|item| Some(item.id) != own_id);
            if taken {
                return Err(ApiError::conflict(format!("Slug '{slug}' is already in use")));
            }
        }
        _ => {}
    }
    Ok(())
}

/// GET /api/admin/content/{kind}
async fn admin_list(
    State(state): State<ContentRouteState>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(
        state.db.list_content(kind, false, Some(query.limit())).await?,
    ))
}

/// POST /api/admin/content/{kind}
async fn admin_create(
    State(state): State<ContentRouteState>,
    Path(kind): Path<String>,
    Json(input): Json<ContentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let data = kind.validate_document(input.data)?;
    check_references(state.db.as_ref(), kind, &data, None).await?;

    let mut item = ContentItem::new(kind, data);
    if let Some(position) = input.position {
        item.position = position;
    }
    if let Some(published) = input.published {
        item.published = published;
    }
    state.db.insert_content(&item).await?;

    info!(content_id = %item.id, kind = %kind, "Content item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/admin/content/{kind}/{id}
async fn admin_get(
    State(state): State<ContentRouteState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<ContentItem>, ApiError> {
    let kind = parse_kind(&kind)?;
    state
        .db
        .get_content(kind, id)
        .await?
        .map(Json)
        .ok_or_else(|| missing(kind, id))
}

/// PUT /api/admin/content/{kind}/{id}
async fn admin_update(
    State(state): State<ContentRouteState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(input): Json<ContentInput>,
) -> Result<Json<ContentItem>, ApiError> {
    let kind = parse_kind(&kind)?;
    let mut item = state
        .db
        .get_content(kind, id)
        .await?
        .ok_or_else(|| missing(kind, id))?;

    let data = kind.validate_document(input.data)?;
    check_references(state.db.as_ref(), kind, &data, Some(id)).await?;

    item.data = data;
    if let Some(position) = input.position {
        item.position = position;
    }
    if let Some(published) = input.published {
        item.published = published;
    }
    item.updated_at = Utc::now();
    state.db.update_content(&item).await?;

    info!(content_id = %id, kind = %kind, "Content item updated");
    Ok(Json(item))
}

/// DELETE /api/admin/content/{kind}/{id}
///
/// Deleting a skill category also deletes its skills.
async fn admin_delete(
    State(state): State<ContentRouteState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    if !state.db.delete_content(kind, id).await? {
        return Err(missing(kind, id));
    }
    if kind == ContentKind::SkillCategories {
        let removed = state
            .db
            .delete_content_by_field(ContentKind::Skills, "category_id", &id.to_string())
            .await?;
        info!(category_id = %id, removed, "Skill category deleted with its skills");
    } else {
        info!(content_id = %id, kind = %kind, "Content item deleted");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Build the admin content routes. The caller adds the auth layer.
pub fn admin_content_routes(state: ContentRouteState) -> Router {
    Router::new()
        .route(
            "/api/admin/content/{kind}",
            get(admin_list).post(admin_create),
        )
        .route(
            "/api/admin/content/{kind}/{id}",
            get(admin_get).put(admin_update).delete(admin_delete),
        )
        .with_state(state)
}
