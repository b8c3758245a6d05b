use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::CategoryRow;
use shared::{Category, CreateCategoryRequest};

const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("{0}")]
    Validation(String),
    #[error("Category not found")]
    NotFound,
    #[error("Category name already exists")]
    DuplicateName,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

fn validate_name(name: Option<&str>) -> Result<String, CategoryError> {
    let name = name.map(str::trim).unwrap_or_default();

    if name.is_empty() {
        return Err(CategoryError::Validation("Category name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CategoryError::Validation(format!(
            "Category name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }

    Ok(name.to_string())
}

pub async fn create_category(
    pool: &SqlitePool,
    user_id: &str,
    request: &CreateCategoryRequest,
) -> Result<Category, CategoryError> {
    let name = validate_name(request.name.as_deref())?;
    let id = Uuid::new_v4();
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO categories (id, user_id, name, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(user_id)
    .bind(&name)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(Category {
            id,
            name,
            created_at: now,
        }),
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed") => {
            Err(CategoryError::DuplicateName)
        }
        Err(e) => Err(CategoryError::DatabaseError(e)),
    }
}

pub async fn list_categories(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Category>, CategoryError> {
    let categories: Vec<CategoryRow> =
        sqlx::query_as("SELECT * FROM categories WHERE user_id = ? ORDER BY name ASC")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(categories.iter().filter_map(|c| c.to_shared()).collect())
}

/// Delete a category together with its tasks and their completion facts
pub async fn delete_category(
    pool: &SqlitePool,
    user_id: &str,
    category_id: &Uuid,
) -> Result<(), CategoryError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ? AND user_id = ?")
        .bind(category_id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CategoryError::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_db;

    fn request(name: &str) -> CreateCategoryRequest {
        CreateCategoryRequest {
            name: Some(name.to_string()),
        }
    }

    #[test]
    fn test_category_error_display() {
        assert_eq!(CategoryError::NotFound.to_string(), "Category not found");
        assert_eq!(
            CategoryError::DuplicateName.to_string(),
            "Category name already exists"
        );
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name(Some("  Kitchen ")).unwrap(), "Kitchen");
        assert!(matches!(validate_name(None), Err(CategoryError::Validation(_))));
        assert!(matches!(validate_name(Some("   ")), Err(CategoryError::Validation(_))));
        assert!(matches!(
            validate_name(Some(&"x".repeat(MAX_NAME_LENGTH + 1))),
            Err(CategoryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_list_categories() {
        let db = migrated_db().await;

        create_category(db.pool(), "alice", &request("Kitchen")).await.unwrap();
        create_category(db.pool(), "alice", &request("Garden")).await.unwrap();
        create_category(db.pool(), "bob", &request("Office")).await.unwrap();

        let names: Vec<String> = list_categories(db.pool(), "alice")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Garden".to_string(), "Kitchen".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_name_per_user() {
        let db = migrated_db().await;

        create_category(db.pool(), "alice", &request("Kitchen")).await.unwrap();
        let duplicate = create_category(db.pool(), "alice", &request("Kitchen")).await;
        assert!(matches!(duplicate, Err(CategoryError::DuplicateName)));

        // Another user may use the same name
        create_category(db.pool(), "bob", &request("Kitchen")).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_category() {
        let db = migrated_db().await;
        let category = create_category(db.pool(), "alice", &request("Kitchen")).await.unwrap();

        let foreign = delete_category(db.pool(), "bob", &category.id).await;
        assert!(matches!(foreign, Err(CategoryError::NotFound)));

        delete_category(db.pool(), "alice", &category.id).await.unwrap();
        let again = delete_category(db.pool(), "alice", &category.id).await;
        assert!(matches!(again, Err(CategoryError::NotFound)));
    }
}
