use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    BreakdownRow, CategoryBreakdownEntry, ListResult, Page, Pagination, Sort, Summary,
    SummaryRow, TransactionFilters,
};
use crate::errors::AppError;
use crate::transaction::models::{Transaction, TransactionType};

// Shared filter predicate for list/count/summary so all three queries see the
// exact same scope. Binds: $1 user, $2 category, $3 type, $4 min, $5 max,
// $6 tags, $7 start, $8 end.
const FILTER_WHERE: &str = r#"
    user_id = $1
    AND NOT is_deleted
    AND ($2::uuid IS NULL OR category_id = $2)
    AND ($3::text IS NULL OR transaction_type = $3)
    AND ($4::numeric IS NULL OR amount >= $4)
    AND ($5::numeric IS NULL OR amount <= $5)
    AND ($6::text[] IS NULL OR tags && $6)
    AND ($7::timestamptz IS NULL OR transaction_date >= $7)
    AND ($8::timestamptz IS NULL OR transaction_date <= $8)
"#;

/// Read side of the ledger: filtered listings, monthly summaries and
/// category breakdowns. Never mutates the store, and never reads through
/// any cached projection — results here are authoritative.
pub struct SummaryService;

impl SummaryService {
    /// List transactions with intersective filters, pagination and sorting.
    /// The returned summary covers the same filter scope as the items, not
    /// the whole ledger.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filters: &TransactionFilters,
        page: &Page,
        sort: &Sort,
    ) -> Result<ListResult, AppError> {
        page.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let transaction_type = filters.transaction_type.map(|t| t.as_str());
        let tags: Option<Vec<String>> = filters
            .tags
            .as_ref()
            .map(|tags| tags.iter().map(|t| t.trim().to_lowercase()).collect());

        let items = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT id, user_id, category_id, transaction_type, amount, description, notes,
                   tags, transaction_date, year, month, year_month, is_deleted, deleted_at,
                   created_at, updated_at
            FROM transactions
            WHERE {FILTER_WHERE}
            ORDER BY {} {}, created_at DESC
            LIMIT $9 OFFSET $10
            "#,
            sort.field.as_column(),
            sort.dir.as_sql(),
        ))
        .bind(user_id)
        .bind(filters.category_id)
        .bind(transaction_type)
        .bind(filters.min_amount)
        .bind(filters.max_amount)
        .bind(&tags)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .bind(page.size)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM transactions WHERE {FILTER_WHERE}"
        ))
        .bind(user_id)
        .bind(filters.category_id)
        .bind(transaction_type)
        .bind(filters.min_amount)
        .bind(filters.max_amount)
        .bind(&tags)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .fetch_one(pool)
        .await?;

        let summary_row = sqlx::query_as::<_, SummaryRow>(&format!(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount ELSE 0 END), 0) as total_income,
                COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN amount ELSE 0 END), 0) as total_expenses,
                COUNT(CASE WHEN transaction_type = 'income' THEN 1 END) as income_count,
                COUNT(CASE WHEN transaction_type = 'expense' THEN 1 END) as expense_count
            FROM transactions
            WHERE {FILTER_WHERE}
            "#,
        ))
        .bind(user_id)
        .bind(filters.category_id)
        .bind(transaction_type)
        .bind(filters.min_amount)
        .bind(filters.max_amount)
        .bind(&tags)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .fetch_one(pool)
        .await?;

        Ok(ListResult {
            items,
            total,
            summary: summary_row.into(),
            pagination: Pagination::new(page, total),
        })
    }

    /// Income/expense totals for one calendar month, keyed by the derived
    /// `year_month` column.
    pub async fn monthly_summary(
        pool: &PgPool,
        user_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<Summary, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::ValidationError(
                "Month must be between 1 and 12".to_string(),
            ));
        }

        let year_month = format!("{year:04}-{month:02}");

        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount ELSE 0 END), 0) as total_income,
                COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN amount ELSE 0 END), 0) as total_expenses,
                COUNT(CASE WHEN transaction_type = 'income' THEN 1 END) as income_count,
                COUNT(CASE WHEN transaction_type = 'expense' THEN 1 END) as expense_count
            FROM transactions
            WHERE user_id = $1 AND year_month = $2 AND NOT is_deleted
            "#,
        )
        .bind(user_id)
        .bind(&year_month)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    /// Per-category totals over an optional date range, grouped by
    /// (category, type) and sorted by total descending.
    pub async fn category_breakdown(
        pool: &PgPool,
        user_id: Uuid,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        transaction_type: Option<TransactionType>,
    ) -> Result<Vec<CategoryBreakdownEntry>, AppError> {
        let rows = sqlx::query_as::<_, BreakdownRow>(
            r#"
            SELECT
                t.category_id,
                c.name as category_name,
                c.color as category_color,
                c.icon as category_icon,
                t.transaction_type,
                COALESCE(SUM(t.amount), 0) as total,
                COUNT(*) as count
            FROM transactions t
            JOIN categories c ON t.category_id = c.id
            WHERE t.user_id = $1
              AND NOT t.is_deleted
              AND ($2::timestamptz IS NULL OR t.transaction_date >= $2)
              AND ($3::timestamptz IS NULL OR t.transaction_date <= $3)
              AND ($4::text IS NULL OR t.transaction_type = $4)
            GROUP BY t.category_id, c.name, c.color, c.icon, t.transaction_type
            ORDER BY total DESC
            "#,
        )
        .bind(user_id)
        .bind(start_date)
        .bind(end_date)
        .bind(transaction_type.map(|t| t.as_str()))
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
