use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Ad, AdListQuery, SortField};

const AD_COLUMNS: &str =
    "id, author_id, title, description, price, image_key, created_at, updated_at";

#[async_trait]
pub trait AdRepository: Send + Sync {
    async fn create_ad(&self, ad: &Ad) -> Result<(), sqlx::Error>;

    async fn get_ad(&self, id: Uuid) -> Result<Option<Ad>, sqlx::Error>;

    async fn list_ads(&self, query: &AdListQuery) -> Result<Vec<Ad>, sqlx::Error>;

    /// Returns false when no row had that id.
    async fn update_ad(&self, ad: &Ad) -> Result<bool, sqlx::Error>;

    /// Returns false when no row had that id.
    async fn delete_ad(&self, id: Uuid) -> Result<bool, sqlx::Error>;
}

pub struct PgAdRepository {
    pool: PgPool,
}

impl PgAdRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdRepository for PgAdRepository {
    async fn create_ad(&self, ad: &Ad) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO ads (id, author_id, title, description, price, image_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(ad.id)
        .bind(ad.author_id)
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(ad.price)
        .bind(&ad.image_key)
        .bind(ad.created_at)
        .bind(ad.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_ad(&self, id: Uuid) -> Result<Option<Ad>, sqlx::Error> {
        sqlx::query_as::<_, Ad>(&format!("SELECT {AD_COLUMNS} FROM ads WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_ads(&self, query: &AdListQuery) -> Result<Vec<Ad>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {AD_COLUMNS} FROM ads WHERE TRUE"));

        if let Some(min) = query.min_price {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = query.max_price {
            qb.push(" AND price <= ").push_bind(max);
        }

        // column comes from a closed enum, never from the request
        let direction = if query.ascending { "ASC" } else { "DESC" };
        qb.push(format!(
            " ORDER BY {} {direction}, id {direction}",
            query.sort.column()
        ));
        qb.push(" LIMIT ").push_bind(query.limit);
        qb.push(" OFFSET ").push_bind(query.offset);

        qb.build_query_as::<Ad>().fetch_all(&self.pool).await
    }

    async fn update_ad(&self, ad: &Ad) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE ads SET title = $2, description = $3, price = $4, image_key = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(ad.id)
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(ad.price)
        .bind(&ad.image_key)
        .bind(ad.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_ad(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Map-backed repository used by tests
#[derive(Default)]
pub struct InMemoryAdRepository {
    ads: RwLock<HashMap<Uuid, Ad>>,
}

impl InMemoryAdRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &Ad, b: &Ad, sort: SortField) -> Ordering {
    let primary = match sort {
        SortField::Price => a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl AdRepository for InMemoryAdRepository {
    async fn create_ad(&self, ad: &Ad) -> Result<(), sqlx::Error> {
        self.ads.write().await.insert(ad.id, ad.clone());
        Ok(())
    }

    async fn get_ad(&self, id: Uuid) -> Result<Option<Ad>, sqlx::Error> {
        Ok(self.ads.read().await.get(&id).cloned())
    }

    async fn list_ads(&self, query: &AdListQuery) -> Result<Vec<Ad>, sqlx::Error> {
        let ads = self.ads.read().await;
        let mut list: Vec<Ad> = ads
            .values()
            .filter(|ad| query.min_price.is_none_or(|min| ad.price >= min))
            .filter(|ad| query.max_price.is_none_or(|max| ad.price <= max))
            .cloned()
            .collect();

        list.sort_by(|a, b| {
            let ord = compare(a, b, query.sort);
            if query.ascending { ord } else { ord.reverse() }
        });

        Ok(list
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn update_ad(&self, ad: &Ad) -> Result<bool, sqlx::Error> {
        let mut ads = self.ads.write().await;
        match ads.get_mut(&ad.id) {
            Some(existing) => {
                *existing = ad.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_ad(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(self.ads.write().await.remove(&id).is_some())
    }
}
