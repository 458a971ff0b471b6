//! # Category Repository
//!
//! Database operations for product categories.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmapos_core::Category;

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Gets a category by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Gets a category by its (unique) name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Lists all categories sorted by name.
    pub async fn list_all(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Inserts a new category. Names are unique; a duplicate surfaces as
    /// `UniqueViolation`.
    pub async fn insert(&self, category: &Category) -> DbResult<()> {
        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a category's name and description.
    pub async fn update(&self, category: &Category) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE categories SET name = ?2, description = ?3 WHERE id = ?1")
                .bind(&category.id)
                .bind(&category.name)
                .bind(&category.description)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", &category.id));
        }

        Ok(())
    }

    /// Deletes a category. Refused while products still reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if references > 0 {
            return Err(DbError::ReferencedElsewhere {
                entity: "Category".to_string(),
                id: id.to_string(),
                referencing: "products".to_string(),
                count: references,
            });
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }

    /// Finds a category by name, creating it if missing. Used by the seed
    /// tool so category setup is idempotent.
    pub async fn get_or_create(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        if let Some(existing) = self.get_by_name(name).await? {
            return Ok(existing);
        }

        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: Utc::now(),
        };

        self.insert(&category).await?;
        Ok(category)
    }
}
