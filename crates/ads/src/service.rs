use chrono::Utc;
use std::sync::Arc;
use storage::{ObjectStore, StoredObject};
use uuid::Uuid;

use crate::{
    error::{AdsError, Result},
    model::{Ad, AdListOptions, CreateAd, ImageUpload, UpdateAd},
    repository::AdRepository,
};

/// Ads CRUD that keeps rows and their images in step
///
/// Images are uploaded before the row is written; if the write fails the
/// upload is removed again.
pub struct AdsService {
    repo: Arc<dyn AdRepository>,
    store: Arc<dyn ObjectStore>,
    max_image_bytes: usize,
}

impl AdsService {
    pub fn new(repo: Arc<dyn AdRepository>, store: Arc<dyn ObjectStore>, max_image_bytes: usize) -> Self {
        Self {
            repo,
            store,
            max_image_bytes,
        }
    }

    /// Create the image bucket if it does not exist yet
    pub async fn init_bucket(&self) -> Result<()> {
        self.store.create_bucket().await?;
        tracing::info!(bucket = self.store.bucket(), "image bucket ready");
        Ok(())
    }

    pub async fn create(&self, author_id: i64, payload: CreateAd) -> Result<Ad> {
        let payload = payload.normalized();
        payload.validate().map_err(AdsError::Validation)?;
        self.check_size(&payload.image)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let key = self.upload(id, payload.image).await?;

        let ad = Ad {
            id,
            author_id,
            title: payload.title,
            description: payload.description,
            price: payload.price,
            image_key: key,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.create_ad(&ad).await {
            // Compensating action: drop the image we just uploaded
            self.remove_image(&ad.image_key).await;
            return Err(e.into());
        }

        tracing::info!(ad_id = %ad.id, author_id, "ad created");
        Ok(ad)
    }

    pub async fn get(&self, id: Uuid) -> Result<Ad> {
        self.repo.get_ad(id).await?.ok_or(AdsError::NotFound)
    }

    pub async fn list(&self, opts: AdListOptions) -> Result<Vec<Ad>> {
        Ok(self.repo.list_ads(&opts.into()).await?)
    }

    /// Update an ad owned by `author_id`, optionally replacing its image
    pub async fn update(&self, author_id: i64, id: Uuid, payload: UpdateAd) -> Result<Ad> {
        let payload = payload.normalized();
        payload.validate().map_err(AdsError::Validation)?;
        if let Some(image) = &payload.image {
            self.check_size(image)?;
        }

        let mut ad = self.owned(author_id, id).await?;
        let previous_key = ad.image_key.clone();

        // A replacement goes to a fresh key so the live object stays intact
        // until the row points away from it.
        if let Some(image) = payload.image {
            let key = image.revision_key_for(ad.id, Uuid::new_v4());
            self.put(&key, image).await?;
            ad.image_key = key;
        }
        ad.title = payload.title;
        ad.description = payload.description;
        ad.price = payload.price;
        ad.updated_at = Utc::now();

        let replaced = ad.image_key != previous_key;
        match self.repo.update_ad(&ad).await {
            Ok(true) => {}
            Ok(false) => {
                // deleted concurrently
                if replaced {
                    self.remove_image(&ad.image_key).await;
                }
                return Err(AdsError::NotFound);
            }
            Err(e) => {
                if replaced {
                    self.remove_image(&ad.image_key).await;
                }
                return Err(e.into());
            }
        }

        if replaced {
            self.remove_image(&previous_key).await;
        }

        tracing::info!(ad_id = %ad.id, author_id, "ad updated");
        Ok(ad)
    }

    /// Delete an ad owned by `author_id` together with its image
    pub async fn delete(&self, author_id: i64, id: Uuid) -> Result<()> {
        let ad = self.owned(author_id, id).await?;

        // Row first: a leftover image is harmless, a row without one is not
        if !self.repo.delete_ad(ad.id).await? {
            return Err(AdsError::NotFound);
        }
        self.remove_image(&ad.image_key).await;

        tracing::info!(ad_id = %ad.id, author_id, "ad deleted");
        Ok(())
    }

    /// Fetch the stored image of an ad
    pub async fn image(&self, id: Uuid) -> Result<StoredObject> {
        let ad = self.get(id).await?;
        Ok(self.store.get_object(&ad.image_key).await?)
    }

    async fn owned(&self, author_id: i64, id: Uuid) -> Result<Ad> {
        let ad = self.get(id).await?;
        if ad.author_id != author_id {
            return Err(AdsError::Forbidden);
        }
        Ok(ad)
    }

    fn check_size(&self, image: &ImageUpload) -> Result<()> {
        if image.data.len() > self.max_image_bytes {
            return Err(AdsError::ImageTooLarge {
                size: image.data.len(),
                max: self.max_image_bytes,
            });
        }
        Ok(())
    }

    async fn upload(&self, id: Uuid, image: ImageUpload) -> Result<String> {
        let key = image.key_for(id);
        self.put(&key, image).await?;
        Ok(key)
    }

    async fn put(&self, key: &str, image: ImageUpload) -> Result<()> {
        self.store
            .put_object(key, image.data, &image.content_type)
            .await?;
        Ok(())
    }

    async fn remove_image(&self, key: &str) {
        if let Err(e) = self.store.delete_object(key).await {
            tracing::warn!(key, error = %e, "failed to delete ad image");
        }
    }
}
