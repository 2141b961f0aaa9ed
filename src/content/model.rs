//! Admin-managed content: kinds, stored items and typed documents.
//!
//! Every collection lives in one `content_items` table as a kind-tagged JSON
//! document. The typed structs below are the write-side schema: a document
//! is deserialized into its kind's struct, validated, and stored in the
//! normalized form that comes back out.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Content collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Blogs,
    Slides,
    Certifications,
    Education,
    SkillCategories,
    Skills,
    Gallery,
    Reviews,
    Services,
}

impl ContentKind {
    pub const ALL: [ContentKind; 9] = [
        Self::Blogs,
        Self::Slides,
        Self::Certifications,
        Self::Education,
        Self::SkillCategories,
        Self::Skills,
        Self::Gallery,
        Self::Reviews,
        Self::Services,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blogs => "blogs",
            Self::Slides => "slides",
            Self::Certifications => "certifications",
            Self::Education => "education",
            Self::SkillCategories => "skill_categories",
            Self::Skills => "skills",
            Self::Gallery => "gallery",
            Self::Reviews => "reviews",
            Self::Services => "services",
        }
    }

    /// Validate a raw document for this kind and return its normalized form.
    pub fn validate_document(
        &self,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, ValidationError> {
        match self {
            Self::Blogs => normalize::<BlogPost>(data),
            Self::Slides => normalize::<Slide>(data),
            Self::Certifications => normalize::<Certification>(data),
            Self::Education => normalize::<Education>(data),
            Self::SkillCategories => normalize::<SkillCategory>(data),
            Self::Skills => normalize::<Skill>(data),
            Self::Gallery => normalize::<GalleryImage>(data),
            Self::Reviews => normalize::<Review>(data),
            Self::Services => normalize::<Service>(data),
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown content kind: {s}"))
    }
}

/// A stored content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: ContentKind,
    pub position: i64,
    pub published: bool,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn new(kind: ContentKind, data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            position: 0,
            published: true,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// String field of the document, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(|v| v.as_str())
    }
}

/// Body of admin create/update requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentInput {
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub published: Option<bool>,
    pub data: serde_json::Value,
}

// ── Typed documents ─────────────────────────────────────────────────

/// A document schema with its own validation rules.
trait ContentDocument: Serialize + DeserializeOwned {
    fn validate(&mut self) -> Result<(), ValidationError>;
}

fn normalize<T: ContentDocument>(data: serde_json::Value) -> Result<serde_json::Value, ValidationError> {
    if !data.is_object() {
        return Err(ValidationError::Malformed("document must be a JSON object".into()));
    }
    let mut doc: T =
        serde_json::from_value(data).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    doc.validate()?;
    serde_json::to_value(&doc).map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Trim a required field in place; error if it ends up empty.
fn required(value: &mut String, field: &'static str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
    Ok(())
}

static SLUG_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid")
});

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogPost {
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
}

impl ContentDocument for BlogPost {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.title, "title")?;
        required(&mut self.slug, "slug")?;
        required(&mut self.body, "body")?;
        if !SLUG_SHAPE.is_match(&self.slug) {
            return Err(ValidationError::InvalidField {
                field: "slug",
                reason: "use lowercase letters, digits and dashes".into(),
            });
        }
        self.tags.retain(|t| !t.trim().is_empty());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Slide {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

impl ContentDocument for Slide {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.title, "title")?;
        required(&mut self.image_url, "image_url")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ContentDocument for Certification {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.name, "name")?;
        required(&mut self.issuer, "issuer")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ContentDocument for Education {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.institution, "institution")?;
        required(&mut self.degree, "degree")?;
        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            if end < start {
                return Err(ValidationError::InvalidField {
                    field: "end_year",
                    reason: format!("{end} is before start_year {start}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillCategory {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ContentDocument for SkillCategory {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.name, "name")
    }
}

/// A skill. `category_id` must name an existing category; that check needs
/// the store and happens in the admin routes.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    pub category_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl ContentDocument for Skill {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.category_id, "category_id")?;
        required(&mut self.name, "name")?;
        let category_id =
            Uuid::parse_str(&self.category_id).map_err(|_| ValidationError::InvalidField {
                field: "category_id",
                reason: "not a valid id".into(),
            })?;
        // Nesting and the category cascade match on the hyphenated form.
        self.category_id = category_id.to_string();
        if let Some(level) = self.level {
            if level > 100 {
                return Err(ValidationError::InvalidField {
                    field: "level",
                    reason: "must be between 0 and 100".into(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryImage {
    pub title: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ContentDocument for GalleryImage {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.title, "title")?;
        required(&mut self.image_url, "image_url")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub rating: u8,
    pub quote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ContentDocument for Review {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.author, "author")?;
        required(&mut self.quote, "quote")?;
        if !(1..=5).contains(&self.rating) {
            return Err(ValidationError::InvalidField {
                field: "rating",
                reason: "must be between 1 and 5".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub features: Vec<String>,
}

impl ContentDocument for Service {
    fn validate(&mut self) -> Result<(), ValidationError> {
        required(&mut self.title, "title")?;
        required(&mut self.summary, "summary")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in ContentKind::ALL {
            assert_eq!(kind.to_string().parse::<ContentKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
        assert!("posts".parse::<ContentKind>().is_err());
    }

    #[test]
    fn blog_requires_fields_and_slug_shape() {
        let err = ContentKind::Blogs
            .validate_document(json!({"title": "Hi", "body": "text"}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("slug")));

        let err = ContentKind::Blogs
            .validate_document(json!({"title": "Hi", "slug": "Hello World", "body": "x"}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "slug", .. }));

        let doc = ContentKind::Blogs
            .validate_document(json!({
                "title": "  Shipping a design system ",
                "slug": "design-system",
                "body": "Long read",
                "tags": ["design", " "]
            }))
            .unwrap();
        assert_eq!(doc["title"], "Shipping a design system");
        assert_eq!(doc["tags"], json!(["design"]));
        assert!(doc.get("excerpt").is_none());
    }

    #[test]
    fn education_years_must_be_ordered() {
        let err = ContentKind::Education
            .validate_document(json!({
                "institution": "TU Delft",
                "degree": "MSc",
                "start_year": 2020,
                "end_year": 2018
            }))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "end_year", .. }));
    }

    #[test]
    fn review_rating_bounds() {
        let base = |rating: i64| json!({"author": "Kim", "quote": "Great work", "rating": rating});
        assert!(ContentKind::Reviews.validate_document(base(5)).is_ok());
        assert!(ContentKind::Reviews.validate_document(base(0)).is_err());
        assert!(ContentKind::Reviews.validate_document(base(6)).is_err());
        assert!(matches!(
            ContentKind::Reviews.validate_document(base(-1)).unwrap_err(),
            ValidationError::Malformed(_)
        ));
    }

    #[test]
    fn skill_checks_category_id_and_level() {
        let category = Uuid::new_v4().to_string();
        assert!(ContentKind::Skills
            .validate_document(json!({"category_id": category, "name": "Rust", "level": 90}))
            .is_ok());
        assert!(ContentKind::Skills
            .validate_document(json!({"category_id": category, "name": "Rust", "level": 101}))
            .is_err());
        assert!(matches!(
            ContentKind::Skills
                .validate_document(json!({"category_id": "abc", "name": "Rust"}))
                .unwrap_err(),
            ValidationError::InvalidField { field: "category_id", .. }
        ));
    }

    #[test]
    fn skill_category_id_is_stored_hyphenated() {
        let category = Uuid::new_v4();
        let braced = format!("{{{}}}", category.to_string().to_uppercase());
        let doc = ContentKind::Skills
            .validate_document(json!({"category_id": braced, "name": "Rust"}))
            .unwrap();
        assert_eq!(doc["category_id"], category.to_string());
    }

    #[test]
    fn non_object_documents_are_malformed() {
        assert!(matches!(
            ContentKind::Slides.validate_document(json!(["a"])).unwrap_err(),
            ValidationError::Malformed(_)
        ));
    }
}
