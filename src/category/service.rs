use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use super::models::{
    build_hierarchy, Category, CategoryTreeNode, CategoryType, CreateCategoryDto,
    UpdateCategoryDto, DEFAULT_COLOR, DEFAULT_ICON, MAX_TREE_DEPTH,
};
use crate::errors::AppError;

const CATEGORY_COLUMNS: &str = "id, user_id, name, category_type, parent_id, color, icon, \
     monthly_budget, is_default, is_deleted, deleted_at, created_at, updated_at";

/// Starter categories installed on user creation: one default per type.
const STARTER_SET: &[(&str, CategoryType, &str, bool)] = &[
    ("Salary", CategoryType::Income, "banknote", true),
    ("Other Income", CategoryType::Income, "coins", false),
    ("Food", CategoryType::Expense, "utensils", true),
    ("Transport", CategoryType::Expense, "bus", false),
    ("Housing", CategoryType::Expense, "home", false),
    ("Entertainment", CategoryType::Expense, "film", false),
    ("Other", CategoryType::Expense, "tag", false),
];

/// Service layer for the category tree.
pub struct CategoryService;

impl CategoryService {
    /// Create a category, enforcing parent/type/depth rules and name
    /// uniqueness among live siblings of the same (user, type).
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        dto: &CreateCategoryDto,
    ) -> Result<Category, AppError> {
        dto.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        dto.validate_fields()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "Name cannot be empty".to_string(),
            ));
        }

        // Parent checks come before uniqueness when a parent is given.
        if let Some(parent_id) = dto.parent_id {
            let parent = Self::resolve(pool, user_id, parent_id)
                .await
                .map_err(|e| match e {
                    AppError::NotFound(_) => {
                        AppError::NotFound("Parent category not found".to_string())
                    }
                    other => other,
                })?;

            if parent.get_type() != dto.category_type {
                return Err(AppError::Conflict(
                    "Parent category must be of the same type".to_string(),
                ));
            }

            let parent_depth = Self::depth_of(pool, user_id, parent_id).await?;
            if parent_depth + 1 > MAX_TREE_DEPTH {
                return Err(AppError::Conflict(format!(
                    "Category tree cannot exceed {MAX_TREE_DEPTH} levels"
                )));
            }
        }

        if Self::name_in_use(pool, user_id, dto.category_type, &name, None).await? {
            return Err(AppError::Conflict(
                "A category with this name already exists".to_string(),
            ));
        }

        let color = dto.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string());
        let icon = dto.icon.clone().unwrap_or_else(|| DEFAULT_ICON.to_string());
        let monthly_budget = dto.monthly_budget.unwrap_or(Decimal::ZERO);

        // The default swap and the insert commit together.
        let mut tx = pool.begin().await?;

        if dto.is_default {
            Self::clear_default(&mut tx, user_id, dto.category_type).await?;
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories
                (user_id, name, category_type, parent_id, color, icon, monthly_budget, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CATEGORY_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(&name)
        .bind(dto.category_type.as_str())
        .bind(dto.parent_id)
        .bind(&color)
        .bind(&icon)
        .bind(monthly_budget)
        .bind(dto.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(category)
    }

    /// Update a category (PATCH semantics). Type, owner and parent are
    /// immutable; a patch carrying either fails outright.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        category_id: Uuid,
        dto: &UpdateCategoryDto,
    ) -> Result<Category, AppError> {
        if dto.category_type.is_some() {
            return Err(AppError::Conflict(
                "categoryType is immutable and cannot be updated".to_string(),
            ));
        }
        if dto.parent_id.is_some() {
            return Err(AppError::Conflict(
                "parentId is immutable and cannot be updated".to_string(),
            ));
        }

        dto.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        dto.validate_fields()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let existing = Self::resolve(pool, user_id, category_id).await?;

        let new_name = match &dto.name {
            Some(n) => {
                let trimmed = n.trim().to_string();
                if trimmed.is_empty() {
                    return Err(AppError::ValidationError(
                        "Name cannot be empty".to_string(),
                    ));
                }
                if trimmed != existing.name
                    && Self::name_in_use(
                        pool,
                        user_id,
                        existing.get_type(),
                        &trimmed,
                        Some(category_id),
                    )
                    .await?
                {
                    return Err(AppError::Conflict(
                        "A category with this name already exists".to_string(),
                    ));
                }
                trimmed
            }
            None => existing.name.clone(),
        };

        let new_color = dto.color.clone().unwrap_or_else(|| existing.color.clone());
        let new_icon = dto.icon.clone().unwrap_or_else(|| existing.icon.clone());
        let new_budget = dto.monthly_budget.unwrap_or(existing.monthly_budget);
        let new_default = dto.is_default.unwrap_or(existing.is_default);

        let mut tx = pool.begin().await?;

        if dto.is_default == Some(true) && !existing.is_default {
            Self::clear_default(&mut tx, user_id, existing.get_type()).await?;
        }

        let updated = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET name = $3, color = $4, icon = $5, monthly_budget = $6, is_default = $7,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            RETURNING {CATEGORY_COLUMNS}
            "#,
        ))
        .bind(category_id)
        .bind(user_id)
        .bind(&new_name)
        .bind(&new_color)
        .bind(&new_icon)
        .bind(new_budget)
        .bind(new_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Make a category the single default for its (user, type), atomically
    /// unsetting the previous one in the same database transaction.
    pub async fn set_default(
        pool: &PgPool,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<Category, AppError> {
        let mut tx = pool.begin().await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            FOR UPDATE
            "#,
        ))
        .bind(category_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        Self::clear_default(&mut tx, user_id, category.get_type()).await?;

        let updated = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#,
        ))
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Soft-delete a category and every live descendant with one shared
    /// deletion timestamp. Returns the number of categories deleted.
    pub async fn soft_delete(
        pool: &PgPool,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<u64, AppError> {
        let mut tx = pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM categories
                WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            )
            "#,
        )
        .bind(category_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Category not found".to_string()));
        }

        // Breadth-first descendant walk, bounded by the depth-3 invariant.
        let mut to_delete: Vec<Uuid> = vec![category_id];
        let mut frontier: Vec<Uuid> = vec![category_id];
        for _ in 1..MAX_TREE_DEPTH {
            if frontier.is_empty() {
                break;
            }
            let children: Vec<Uuid> = sqlx::query_scalar(
                r#"
                SELECT id FROM categories
                WHERE parent_id = ANY($1) AND user_id = $2 AND NOT is_deleted
                "#,
            )
            .bind(&frontier)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
            to_delete.extend(&children);
            frontier = children;
        }

        let deleted_at = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET is_deleted = TRUE, is_default = FALSE, deleted_at = $2, updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(&to_delete)
        .bind(deleted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            user_id = %user_id,
            count = result.rows_affected(),
            "soft-deleted category subtree"
        );

        Ok(result.rows_affected())
    }

    /// Un-delete a category: clears `deleted_at` for this node only (children
    /// deleted alongside it stay deleted and can be restored separately).
    /// Fails when the name has since been taken by a live sibling.
    pub async fn restore(
        pool: &PgPool,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<Category, AppError> {
        let existing = Self::get_by_id(pool, user_id, category_id, true).await?;
        if !existing.is_deleted {
            return Ok(existing);
        }

        if Self::name_in_use(
            pool,
            user_id,
            existing.get_type(),
            &existing.name,
            Some(category_id),
        )
        .await?
        {
            return Err(AppError::Conflict(
                "A category with this name already exists".to_string(),
            ));
        }

        let restored = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET is_deleted = FALSE, deleted_at = NULL, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {CATEGORY_COLUMNS}
            "#,
        ))
        .bind(category_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(restored)
    }

    /// Build the live category tree for a (user, type). Children whose parent
    /// was deleted are promoted to roots.
    pub async fn get_hierarchy(
        pool: &PgPool,
        user_id: Uuid,
        category_type: CategoryType,
    ) -> Result<Vec<CategoryTreeNode>, AppError> {
        let flat = sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE user_id = $1 AND category_type = $2 AND NOT is_deleted
            ORDER BY name ASC
            "#,
        ))
        .bind(user_id)
        .bind(category_type.as_str())
        .fetch_all(pool)
        .await?;

        Ok(build_hierarchy(flat))
    }

    /// Fetch a live category owned by the user. Cross-user references and
    /// deleted categories both surface as NotFound.
    pub async fn resolve(
        pool: &PgPool,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        ))
        .bind(category_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Raw point lookup, optionally including soft-deleted rows.
    pub async fn get_by_id(
        pool: &PgPool,
        user_id: Uuid,
        category_id: Uuid,
        include_deleted: bool,
    ) -> Result<Category, AppError> {
        let sql = if include_deleted {
            format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 AND user_id = $2"
            )
        } else {
            format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories \
                 WHERE id = $1 AND user_id = $2 AND NOT is_deleted"
            )
        };

        sqlx::query_as::<_, Category>(&sql)
            .bind(category_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// List live categories, optionally narrowed to one type.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        category_type: Option<CategoryType>,
    ) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE user_id = $1
              AND ($2::text IS NULL OR category_type = $2)
              AND NOT is_deleted
            ORDER BY name ASC
            "#,
        ))
        .bind(user_id)
        .bind(category_type.map(|t| t.as_str()))
        .fetch_all(pool)
        .await?;

        Ok(categories)
    }

    /// Install the starter categories for a new user, one default per type.
    ///
    /// Seeding is a convenience: names that already exist are skipped, and a
    /// failure here must not roll back the surrounding account creation.
    pub async fn bootstrap_defaults(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Category>, AppError> {
        let mut created = Vec::new();
        let mut tx = pool.begin().await?;

        for (name, category_type, icon, is_default) in STARTER_SET {
            let inserted = sqlx::query_as::<_, Category>(&format!(
                r#"
                INSERT INTO categories (user_id, name, category_type, icon, is_default)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, category_type, name) WHERE NOT is_deleted DO NOTHING
                RETURNING {CATEGORY_COLUMNS}
                "#,
            ))
            .bind(user_id)
            .bind(name)
            .bind(category_type.as_str())
            .bind(icon)
            .bind(is_default)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(category) = inserted {
                created.push(category);
            }
        }

        tx.commit().await?;

        debug!(user_id = %user_id, count = created.len(), "seeded starter categories");

        Ok(created)
    }

    /// Depth of a category counted from its root (root = 1). The walk is
    /// bounded by the depth invariant itself.
    async fn depth_of(pool: &PgPool, user_id: Uuid, category_id: Uuid) -> Result<u32, AppError> {
        let mut depth = 1;
        let mut current = category_id;

        loop {
            let parent: Option<Option<Uuid>> = sqlx::query_scalar(
                r#"
                SELECT parent_id FROM categories
                WHERE id = $1 AND user_id = $2 AND NOT is_deleted
                "#,
            )
            .bind(current)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

            match parent.flatten() {
                Some(parent_id) if depth < MAX_TREE_DEPTH => {
                    depth += 1;
                    current = parent_id;
                }
                Some(_) => return Ok(depth + 1),
                None => return Ok(depth),
            }
        }
    }

    async fn name_in_use(
        pool: &PgPool,
        user_id: Uuid,
        category_type: CategoryType,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let in_use = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM categories
                WHERE user_id = $1 AND category_type = $2 AND name = $3
                  AND NOT is_deleted
                  AND ($4::uuid IS NULL OR id != $4)
            )
            "#,
        )
        .bind(user_id)
        .bind(category_type.as_str())
        .bind(name)
        .bind(exclude)
        .fetch_one(pool)
        .await?;

        Ok(in_use)
    }

    async fn clear_default(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        category_type: CategoryType,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE categories
            SET is_default = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND category_type = $2 AND is_default AND NOT is_deleted
            "#,
        )
        .bind(user_id)
        .bind(category_type.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
