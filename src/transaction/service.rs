use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;
use validator::Validate;

use super::models::{
    date_parts, normalize_tags, CloneTransactionDto, CreateTransactionDto, Transaction,
    TransactionType, UpdateTransactionDto,
};
use crate::errors::AppError;

/// Maximum live transactions per (user, calendar date).
pub const DAILY_TRANSACTION_LIMIT: i64 = 100;

const TRANSACTION_COLUMNS: &str = "id, user_id, category_id, transaction_type, amount, \
     description, notes, tags, transaction_date, year, month, year_month, \
     is_deleted, deleted_at, created_at, updated_at";

/// Service layer for the transaction ledger.
///
/// Every write runs inside one database transaction: the category lookup,
/// the daily-limit check and the row write commit (or roll back) together.
pub struct TransactionService;

impl TransactionService {
    /// Create a transaction against a validated category.
    ///
    /// The type is always derived from the category; a caller-declared type
    /// that disagrees is rejected, never coerced. The daily-limit check and
    /// the insert are serialized per (user, day) with an advisory lock, so
    /// concurrent creates cannot overshoot the limit.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        dto: &CreateTransactionDto,
    ) -> Result<Transaction, AppError> {
        dto.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let description = dto.description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::ValidationError(
                "Description cannot be empty".to_string(),
            ));
        }

        let tags =
            normalize_tags(&dto.tags).map_err(|e| AppError::ValidationError(e.to_string()))?;

        let mut tx = pool.begin().await?;

        let category_type =
            Self::resolve_category_type(&mut tx, user_id, dto.category_id).await?;

        if let Some(declared) = dto.transaction_type {
            if declared != category_type {
                return Err(AppError::Conflict(
                    "Transaction type must match category type".to_string(),
                ));
            }
        }

        Self::check_daily_limit(&mut tx, user_id, dto.transaction_date.date_naive(), None)
            .await?;

        let (year, month, year_month) = date_parts(dto.transaction_date);

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions
                (user_id, category_id, transaction_type, amount, description, notes, tags,
                 transaction_date, year, month, year_month)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(dto.category_id)
        .bind(category_type.as_str())
        .bind(dto.amount)
        .bind(&description)
        .bind(&dto.notes)
        .bind(&tags)
        .bind(dto.transaction_date)
        .bind(year)
        .bind(month)
        .bind(&year_month)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(transaction)
    }

    /// Update a transaction (PATCH semantics). A category change re-derives
    /// the type; a date change re-runs the daily-limit check for the new
    /// date, excluding this transaction from its own count.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        transaction_id: Uuid,
        dto: &UpdateTransactionDto,
    ) -> Result<Transaction, AppError> {
        dto.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        dto.validate_amount()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let mut tx = pool.begin().await?;

        let old = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            FOR UPDATE
            "#,
        ))
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        let new_category_id = dto.category_id.unwrap_or(old.category_id);
        let new_type = if dto.category_id.is_some() {
            Self::resolve_category_type(&mut tx, user_id, new_category_id).await?
        } else {
            old.get_type()
        };

        if let Some(declared) = dto.transaction_type {
            if declared != new_type {
                return Err(AppError::Conflict(
                    "Transaction type must match category type".to_string(),
                ));
            }
        }

        let new_description = match &dto.description {
            Some(d) => {
                let trimmed = d.trim().to_string();
                if trimmed.is_empty() {
                    return Err(AppError::ValidationError(
                        "Description cannot be empty".to_string(),
                    ));
                }
                trimmed
            }
            None => old.description.clone(),
        };

        let new_tags = match &dto.tags {
            Some(tags) => {
                normalize_tags(tags).map_err(|e| AppError::ValidationError(e.to_string()))?
            }
            None => old.tags.clone(),
        };

        let new_amount = dto.amount.unwrap_or(old.amount);
        let new_notes = match &dto.notes {
            Some(notes) => notes.clone(),
            None => old.notes.clone(),
        };
        let new_date = dto.transaction_date.unwrap_or(old.transaction_date);

        if new_date.date_naive() != old.transaction_date.date_naive() {
            Self::check_daily_limit(
                &mut tx,
                user_id,
                new_date.date_naive(),
                Some(transaction_id),
            )
            .await?;
        }

        let (year, month, year_month) = date_parts(new_date);

        let updated = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions SET
                category_id = $2,
                transaction_type = $3,
                amount = $4,
                description = $5,
                notes = $6,
                tags = $7,
                transaction_date = $8,
                year = $9,
                month = $10,
                year_month = $11,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(transaction_id)
        .bind(new_category_id)
        .bind(new_type.as_str())
        .bind(new_amount)
        .bind(&new_description)
        .bind(&new_notes)
        .bind(&new_tags)
        .bind(new_date)
        .bind(year)
        .bind(month)
        .bind(&year_month)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Soft-delete a transaction.
    pub async fn delete(
        pool: &PgPool,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(transaction_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Transaction not found".to_string()));
        }

        Ok(())
    }

    /// Un-delete a transaction: clears `deleted_at`. The daily limit is
    /// re-checked for the transaction's own date — a restore cannot push a
    /// day past the cap any more than a create can.
    pub async fn restore(
        pool: &PgPool,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, AppError> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        ))
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        if !existing.is_deleted {
            return Ok(existing);
        }

        Self::check_daily_limit(
            &mut tx,
            user_id,
            existing.transaction_date.date_naive(),
            Some(transaction_id),
        )
        .await?;

        let restored = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET is_deleted = FALSE, deleted_at = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(transaction_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(restored)
    }

    /// Clone a transaction into a new first-class record.
    ///
    /// Builds a full create payload from the (live) source, defaults the date
    /// to now, applies overrides and routes through `create` — every create
    /// invariant applies, daily limit included.
    pub async fn clone_transaction(
        pool: &PgPool,
        user_id: Uuid,
        transaction_id: Uuid,
        overrides: &CloneTransactionDto,
    ) -> Result<Transaction, AppError> {
        let source = Self::get(pool, user_id, transaction_id).await?;

        let dto = CreateTransactionDto {
            category_id: overrides.category_id.unwrap_or(source.category_id),
            amount: overrides.amount.unwrap_or(source.amount),
            transaction_type: None,
            description: overrides
                .description
                .clone()
                .unwrap_or_else(|| source.description.clone()),
            notes: overrides.notes.clone().or_else(|| source.notes.clone()),
            transaction_date: overrides.transaction_date.unwrap_or_else(Utc::now),
            tags: overrides.tags.clone().unwrap_or_else(|| source.tags.clone()),
        };

        Self::create(pool, user_id, &dto).await
    }

    /// Get a single live transaction by ID.
    pub async fn get(
        pool: &PgPool,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, AppError> {
        sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        ))
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }

    /// Raw point lookup, optionally including soft-deleted rows.
    pub async fn get_by_id(
        pool: &PgPool,
        user_id: Uuid,
        transaction_id: Uuid,
        include_deleted: bool,
    ) -> Result<Transaction, AppError> {
        let sql = if include_deleted {
            format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND user_id = $2"
            )
        } else {
            format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions \
                 WHERE id = $1 AND user_id = $2 AND NOT is_deleted"
            )
        };

        sqlx::query_as::<_, Transaction>(&sql)
            .bind(transaction_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }

    /// Fetch the type of a live category owned by the user, inside the
    /// current database transaction.
    async fn resolve_category_type(
        tx: &mut DbTransaction<'_, Postgres>,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<TransactionType, AppError> {
        let category_type: Option<String> = sqlx::query_scalar(
            r#"
            SELECT category_type FROM categories
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(category_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        category_type
            .and_then(|t| TransactionType::parse(&t))
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Enforce the per-(user, day) volume cap. Takes a transaction-scoped
    /// advisory lock so the count and the following insert/update are one
    /// atomic unit under concurrency.
    async fn check_daily_limit(
        tx: &mut DbTransaction<'_, Postgres>,
        user_id: Uuid,
        day: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let (user_key, day_key) = Self::advisory_lock_keys(user_id, day);
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(user_key)
            .bind(day_key)
            .execute(&mut **tx)
            .await?;

        let day_start = day.and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE user_id = $1
              AND NOT is_deleted
              AND transaction_date >= $2
              AND transaction_date < $3
              AND ($4::uuid IS NULL OR id != $4)
            "#,
        )
        .bind(user_id)
        .bind(day_start)
        .bind(day_end)
        .bind(exclude)
        .fetch_one(&mut **tx)
        .await?;

        if count >= DAILY_TRANSACTION_LIMIT {
            return Err(AppError::Conflict(format!(
                "Daily transaction limit of {DAILY_TRANSACTION_LIMIT} has been reached"
            )));
        }

        Ok(())
    }

    fn advisory_lock_keys(user_id: Uuid, day: NaiveDate) -> (i32, i32) {
        let bytes = user_id.as_bytes();
        let user_key = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        (user_key, day.num_days_from_ce())
    }
}
