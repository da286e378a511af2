//! Classified ads with images kept in object storage

pub mod error;
pub mod model;
pub mod repository;
pub mod service;

pub use error::{AdsError, InvalidFields, Result};
pub use model::{Ad, AdListOptions, AdListQuery, CreateAd, ImageUpload, SortField, UpdateAd};
pub use repository::{AdRepository, InMemoryAdRepository, PgAdRepository};
pub use service::AdsService;
