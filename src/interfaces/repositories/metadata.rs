use async_trait::async_trait;
use sqlx::{self, types::Json, PgPool};

use crate::{
    entities::{
        image::{AssetStatus, CategoryStats, ImageAsset, ImageAssetRow, ImageCategory, NewImageAsset},
        metadata::ImageMetadata,
        variant::ImageVariant,
    },
    errors::AppError,
    repositories::sqlx_repo::SqlxMetadataRepo,
};

const ASSET_COLUMNS: &str = r#"
    filename, original_name, mime_type, size_bytes, category, stored_path,
    width, height, status, variants, alt_text, title, description, caption,
    credit, copyright, tags, uploaded_at, updated_at
"#;

/// OFFSET for a 1-based `page`.
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    let page = page.saturating_sub(1);
    (page as i64) * (per_page as i64)
}

/// Persistence of asset rows, their variant list and editorial metadata.
#[async_trait]
pub trait MetadataRepository: Sync + Send {
    async fn check_connection(&self) -> Result<(), AppError>;
    /// Inserts every row or none.
    async fn insert_assets(&self, assets: &[NewImageAsset]) -> Result<(), AppError>;
    async fn get_asset(&self, filename: &str) -> Result<Option<ImageAsset>, AppError>;
    async fn list_assets(&self, category: Option<ImageCategory>, page: u32, per_page: u32) -> Result<Vec<ImageAsset>, AppError>;
    async fn count_assets(&self, category: Option<ImageCategory>) -> Result<i64, AppError>;
    async fn update_processing(&self, filename: &str, status: AssetStatus, variants: &[ImageVariant]) -> Result<(), AppError>;
    async fn save_metadata(&self, filename: &str, metadata: &ImageMetadata) -> Result<ImageAsset, AppError>;
    /// Returns `false` when no row matched.
    async fn delete_asset(&self, filename: &str) -> Result<bool, AppError>;
    async fn category_stats(&self) -> Result<Vec<CategoryStats>, AppError>;
}

impl SqlxMetadataRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxMetadataRepo { pool }
    }
}

#[async_trait]
impl MetadataRepository for SqlxMetadataRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_assets(&self, assets: &[NewImageAsset]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for asset in assets {
            sqlx::query(
                r#"
                INSERT INTO image_assets (
                    filename, original_name, mime_type, size_bytes, category, stored_path,
                    width, height, status, uploaded_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                "#,
            )
            .bind(&asset.filename)
            .bind(&asset.original_name)
            .bind(&asset.mime_type)
            .bind(asset.size as i64)
            .bind(asset.category.as_str())
            .bind(&asset.stored_path)
            .bind(asset.width as i32)
            .bind(asset.height as i32)
            .bind(asset.status.as_str())
            .bind(asset.uploaded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_asset(&self, filename: &str) -> Result<Option<ImageAsset>, AppError> {
        let row = sqlx::query_as::<_, ImageAssetRow>(&format!(
            "SELECT {} FROM image_assets WHERE filename = $1",
            ASSET_COLUMNS
        ))
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ImageAsset::try_from).transpose()
    }

    async fn list_assets(&self, category: Option<ImageCategory>, page: u32, per_page: u32) -> Result<Vec<ImageAsset>, AppError> {
        let rows = sqlx::query_as::<_, ImageAssetRow>(&format!(
            r#"
            SELECT {} FROM image_assets
            WHERE ($1::TEXT IS NULL OR category = $1)
            ORDER BY uploaded_at DESC, filename
            LIMIT $2 OFFSET $3
            "#,
            ASSET_COLUMNS
        ))
        .bind(category.map(|c| c.as_str()))
        .bind(per_page as i64)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ImageAsset::try_from).collect()
    }

    async fn count_assets(&self, category: Option<ImageCategory>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM image_assets WHERE ($1::TEXT IS NULL OR category = $1)",
        )
        .bind(category.map(|c| c.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn update_processing(&self, filename: &str, status: AssetStatus, variants: &[ImageVariant]) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE image_assets
            SET status = $2, variants = $3, updated_at = NOW()
            WHERE filename = $1
            "#,
        )
        .bind(filename)
        .bind(status.as_str())
        .bind(Json(variants))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Image {} not found", filename)));
        }
        Ok(())
    }

    async fn save_metadata(&self, filename: &str, metadata: &ImageMetadata) -> Result<ImageAsset, AppError> {
        let row = sqlx::query_as::<_, ImageAssetRow>(&format!(
            r#"
            UPDATE image_assets
            SET alt_text = $2, title = $3, description = $4, caption = $5,
                credit = $6, copyright = $7, tags = $8, updated_at = NOW()
            WHERE filename = $1
            RETURNING {}
            "#,
            ASSET_COLUMNS
        ))
        .bind(filename)
        .bind(&metadata.alt_text)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(&metadata.caption)
        .bind(&metadata.credit)
        .bind(&metadata.copyright)
        .bind(&metadata.tags)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", filename)))?;

        ImageAsset::try_from(row)
    }

    async fn delete_asset(&self, filename: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM image_assets WHERE filename = $1")
            .bind(filename)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn category_stats(&self) -> Result<Vec<CategoryStats>, AppError> {
        let stats = sqlx::query_as::<_, CategoryStats>(
            r#"
            SELECT category, status, COUNT(*) AS count, COALESCE(SUM(size_bytes), 0)::BIGINT AS total_bytes
            FROM image_assets
            GROUP BY category, status
            ORDER BY category, status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::page_offset;

    #[test]
    fn page_offset_is_one_based() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(3, 25), 50);
    }
}
