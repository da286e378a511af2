use ads::{Ad, AdListOptions, CreateAd, ImageUpload, UpdateAd};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Fields of the ad form, in whatever order they arrived
#[derive(Debug, Default)]
struct AdForm {
    title: Option<String>,
    description: Option<String>,
    price: Option<String>,
    image: Option<ImageUpload>,
}

impl AdForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = AdForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "price" => form.price = Some(field.text().await?),
                "image" => {
                    let file_name = field.file_name().unwrap_or("image").to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await?.to_vec();
                    // browsers send an empty part when no file was picked
                    if !data.is_empty() {
                        form.image = Some(ImageUpload {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                }
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
        value.ok_or_else(|| ApiError::BadRequest(format!("missing field: {field}")))
    }

    fn price(&mut self) -> Result<f64, ApiError> {
        Self::required(self.price.take(), "price")?
            .trim()
            .parse()
            .map_err(|_| ApiError::BadRequest("price must be a number".to_string()))
    }

    fn into_create(mut self) -> Result<CreateAd, ApiError> {
        let price = self.price()?;
        Ok(CreateAd {
            title: Self::required(self.title, "title")?,
            description: Self::required(self.description, "description")?,
            price,
            image: self
                .image
                .ok_or_else(|| ApiError::BadRequest("missing field: image".to_string()))?,
        })
    }

    fn into_update(mut self) -> Result<UpdateAd, ApiError> {
        let price = self.price()?;
        Ok(UpdateAd {
            title: Self::required(self.title, "title")?,
            description: Self::required(self.description, "description")?,
            price,
            image: self.image,
        })
    }
}

fn ad_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// GET /ads
pub async fn list_ads(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AdListOptions>, QueryRejection>,
) -> Result<Json<Vec<Ad>>, ApiError> {
    let Query(opts) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.ads.list(opts).await?))
}

/// POST /ads - multipart form with title, description, price and image
pub async fn create_ad(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let payload = AdForm::read(multipart).await?.into_create()?;
    let ad = state.ads.create(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ad)))
}

/// GET /ads/{id}
pub async fn get_ad(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Ad>, ApiError> {
    let id = ad_id(id)?;
    Ok(Json(state.ads.get(id).await?))
}

/// PUT /ads/{id} - same form as create, image optional
pub async fn update_ad(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    multipart: Multipart,
) -> Result<Json<Ad>, ApiError> {
    let id = ad_id(id)?;
    let payload = AdForm::read(multipart).await?.into_update()?;
    Ok(Json(state.ads.update(user_id, id, payload).await?))
}

/// DELETE /ads/{id}
pub async fn delete_ad(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = ad_id(id)?;
    state.ads.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /ads/{id}/image
pub async fn get_ad_image(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = ad_id(id)?;
    let object = state.ads.image(id).await?;

    let mut headers = HeaderMap::new();
    let content_type = object
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    Ok((StatusCode::OK, headers, object.data))
}
