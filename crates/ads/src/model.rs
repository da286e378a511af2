use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvalidFields;

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 1000;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// A classified ad; the image itself lives in object storage under `image_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ad {
    pub id: Uuid,
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw uploaded image as received from a form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Object key for an ad's image: `ads/<id>` plus the lowercased extension
    /// of the uploaded file name, if it has a sane one.
    pub fn key_for(&self, ad_id: Uuid) -> String {
        self.key_with_stem(&ad_id.to_string())
    }

    /// Key for an image replacing an existing one. The revision keeps it apart
    /// from the key still referenced by the stored row.
    pub fn revision_key_for(&self, ad_id: Uuid, revision: Uuid) -> String {
        self.key_with_stem(&format!("{ad_id}-{}", revision.simple()))
    }

    fn key_with_stem(&self, stem: &str) -> String {
        let ext = std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));
        match ext {
            Some(ext) => format!("ads/{stem}.{}", ext.to_ascii_lowercase()),
            None => format!("ads/{stem}"),
        }
    }

    fn check(&self, errors: &mut Vec<&'static str>) {
        if self.data.is_empty() {
            errors.push("image is required");
        }
        if !self.content_type.starts_with("image/") {
            errors.push("image must have an image/* content type");
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateAd {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image: ImageUpload,
}

#[derive(Debug, Clone)]
pub struct UpdateAd {
    pub title: String,
    pub description: String,
    pub price: f64,
    /// Replaces the stored image when present.
    pub image: Option<ImageUpload>,
}

fn check_fields(errors: &mut Vec<&'static str>, title: &str, description: &str, price: f64) {
    let title_len = title.chars().count();
    if !(TITLE_MIN..=TITLE_MAX).contains(&title_len) {
        errors.push("title must be between 3 and 100 characters");
    }
    let description_len = description.chars().count();
    if !(DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&description_len) {
        errors.push("description must be between 10 and 1000 characters");
    }
    if !price.is_finite() || price < 0.0 {
        errors.push("price must be a non-negative number");
    }
}

impl CreateAd {
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self
    }

    pub fn validate(&self) -> Result<(), InvalidFields> {
        let mut errors = Vec::new();
        check_fields(&mut errors, &self.title, &self.description, self.price);
        self.image.check(&mut errors);
        if errors.is_empty() { Ok(()) } else { Err(InvalidFields(errors)) }
    }
}

impl UpdateAd {
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self
    }

    pub fn validate(&self) -> Result<(), InvalidFields> {
        let mut errors = Vec::new();
        check_fields(&mut errors, &self.title, &self.description, self.price);
        if let Some(image) = &self.image {
            image.check(&mut errors);
        }
        if errors.is_empty() { Ok(()) } else { Err(InvalidFields(errors)) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Price,
    #[default]
    CreatedAt,
}

impl SortField {
    /// Unknown names fall back to `created_at`.
    pub fn parse(name: &str) -> Self {
        match name {
            "price" => SortField::Price,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::Price => "price",
            SortField::CreatedAt => "created_at",
        }
    }
}

/// Listing options as they arrive in a query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdListOptions {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_asc: Option<bool>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Listing options after defaults and clamping
#[derive(Debug, Clone, PartialEq)]
pub struct AdListQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortField,
    pub ascending: bool,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl From<AdListOptions> for AdListQuery {
    fn from(opts: AdListOptions) -> Self {
        Self {
            limit: opts.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: opts.offset.unwrap_or(0).max(0),
            sort: opts.sort_field.as_deref().map(SortField::parse).unwrap_or_default(),
            ascending: opts.sort_asc.unwrap_or(false),
            min_price: opts.min_price.filter(|p| p.is_finite()),
            max_price: opts.max_price.filter(|p| p.is_finite()),
        }
    }
}
