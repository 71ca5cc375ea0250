//! Catalog item persistence for the admission pipeline

use chrono::{DateTime, Utc};
use ofertafit_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Row written for an admitted or standby candidate
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub id: String,
    pub external_id: String,
    pub title: String,
    pub brand: Option<String>,
    pub category: String,
    pub price: f64,
    pub score: i64,
    /// `published` or `standby`
    pub review_status: String,
}

/// External ids already present in the catalog, out of a candidate set
pub async fn existing_external_ids(
    db: &SqlitePool,
    external_ids: &[String],
) -> Result<Vec<String>> {
    if external_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; external_ids.len()].join(", ");
    let query = format!(
        "SELECT external_id FROM catalog_items WHERE external_id IN ({})",
        placeholders
    );

    let mut q = sqlx::query_as::<_, (String,)>(&query);
    for external_id in external_ids {
        q = q.bind(external_id);
    }
    let rows = q.fetch_all(db).await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn insert_catalog_item(
    db: &SqlitePool,
    item: &NewCatalogItem,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO catalog_items (
            id, external_id, title, brand, category, price, score, review_status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.id)
    .bind(&item.external_id)
    .bind(&item.title)
    .bind(item.brand.as_deref())
    .bind(&item.category)
    .bind(item.price)
    .bind(item.score)
    .bind(&item.review_status)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Published admissions for a category since the start of the current UTC day
pub async fn admitted_today(db: &SqlitePool, category: &str, now: DateTime<Utc>) -> Result<u32> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM catalog_items
         WHERE category = ? AND review_status = 'published' AND created_at >= ?",
    )
    .bind(category)
    .bind(start_of_day(now))
    .fetch_one(db)
    .await?;
    Ok(count.max(0) as u32)
}

/// Per-brand published admissions for a category today
///
/// Keys are normalized (trimmed, lower-cased) to match
/// `CandidateItem::brand_key`, so the counts feed straight into the
/// brand-diversity pass.
pub async fn brand_usage_today(
    db: &SqlitePool,
    category: &str,
    now: DateTime<Utc>,
) -> Result<HashMap<String, u32>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT LOWER(TRIM(brand)), COUNT(*) FROM catalog_items
         WHERE category = ? AND review_status = 'published' AND created_at >= ?
           AND brand IS NOT NULL
         GROUP BY LOWER(TRIM(brand))",
    )
    .bind(category)
    .bind(start_of_day(now))
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(brand, count)| (brand, count.max(0) as u32))
        .collect())
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofertafit_common::db::init_tables;
    use uuid::Uuid;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    fn catalog_item(external_id: &str, brand: Option<&str>, review_status: &str) -> NewCatalogItem {
        NewCatalogItem {
            id: Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
            title: "Coqueteleira 600ml".to_string(),
            brand: brand.map(|b| b.to_string()),
            category: "acessorios".to_string(),
            price: 29.9,
            score: 75,
            review_status: review_status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_existing_external_ids() {
        let pool = setup_test_db().await;
        let now = Utc::now();

        insert_catalog_item(&pool, &catalog_item("MLB1", Some("Growth"), "published"), now)
            .await
            .unwrap();

        let candidates = vec!["MLB1".to_string(), "MLB2".to_string()];
        let existing = existing_external_ids(&pool, &candidates).await.unwrap();
        assert_eq!(existing, vec!["MLB1".to_string()]);
    }

    #[tokio::test]
    async fn test_daily_counts_ignore_standby() {
        let pool = setup_test_db().await;
        let now = Utc::now();

        insert_catalog_item(&pool, &catalog_item("MLB1", Some("Growth"), "published"), now)
            .await
            .unwrap();
        insert_catalog_item(&pool, &catalog_item("MLB2", Some("Growth"), "published"), now)
            .await
            .unwrap();
        insert_catalog_item(&pool, &catalog_item("MLB3", Some("Growth"), "standby"), now)
            .await
            .unwrap();

        assert_eq!(admitted_today(&pool, "acessorios", now).await.unwrap(), 2);
        let usage = brand_usage_today(&pool, "acessorios", now).await.unwrap();
        assert_eq!(usage.get("growth"), Some(&2));
    }

    #[tokio::test]
    async fn test_brand_usage_keys_match_brand_key_normalization() {
        let pool = setup_test_db().await;
        let now = Utc::now();

        // Stored casing and padding vary; the counts must still collapse
        // onto the candidate brand key
        insert_catalog_item(&pool, &catalog_item("MLB1", Some("Growth"), "published"), now)
            .await
            .unwrap();
        insert_catalog_item(&pool, &catalog_item("MLB2", Some("GROWTH "), "published"), now)
            .await
            .unwrap();

        let usage = brand_usage_today(&pool, "acessorios", now).await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage.get("growth"), Some(&2));
    }

    #[tokio::test]
    async fn test_daily_counts_scoped_to_category() {
        let pool = setup_test_db().await;
        let now = Utc::now();

        insert_catalog_item(&pool, &catalog_item("MLB1", Some("Growth"), "published"), now)
            .await
            .unwrap();

        assert_eq!(admitted_today(&pool, "suplementos", now).await.unwrap(), 0);
    }
}
