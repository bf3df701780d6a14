use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::ValidationError;

use crate::amount;
use crate::transaction::models::TransactionType;

/// Allowed page sizes for transaction listings.
pub const PAGE_SIZES: &[i64] = &[10, 20, 50];

/// One side of a summary (income or expenses).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySide {
    pub total: Decimal,
    pub count: i64,
    pub avg: Decimal,
}

/// Income/expense totals over some scope, with `net_amount = income - expenses`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub income: SummarySide,
    pub expenses: SummarySide,
    pub net_amount: Decimal,
}

impl Summary {
    pub fn from_parts(
        total_income: Decimal,
        income_count: i64,
        total_expenses: Decimal,
        expense_count: i64,
    ) -> Self {
        Self {
            income: SummarySide {
                total: total_income,
                count: income_count,
                avg: amount::average(total_income, income_count),
            },
            expenses: SummarySide {
                total: total_expenses,
                count: expense_count,
                avg: amount::average(total_expenses, expense_count),
            },
            net_amount: total_income - total_expenses,
        }
    }
}

/// Raw aggregation row for summary queries.
#[derive(Debug, FromRow)]
pub struct SummaryRow {
    pub total_income: Option<Decimal>,
    pub total_expenses: Option<Decimal>,
    pub income_count: Option<i64>,
    pub expense_count: Option<i64>,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Summary::from_parts(
            row.total_income.unwrap_or(Decimal::ZERO),
            row.income_count.unwrap_or(0),
            row.total_expenses.unwrap_or(Decimal::ZERO),
            row.expense_count.unwrap_or(0),
        )
    }
}

/// Filters for listing transactions. All are optional and intersective.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilters {
    /// Filter by category
    pub category_id: Option<Uuid>,
    /// Filter by type (income, expense)
    pub transaction_type: Option<TransactionType>,
    /// Minimum amount (inclusive, exact decimal comparison)
    pub min_amount: Option<Decimal>,
    /// Maximum amount (inclusive, exact decimal comparison)
    pub max_amount: Option<Decimal>,
    /// Transactions carrying any of these tags
    pub tags: Option<Vec<String>>,
    /// Filter by start date
    pub start_date: Option<DateTime<Utc>>,
    /// Filter by end date
    pub end_date: Option<DateTime<Utc>>,
}

/// Page request: 1-based page number, size restricted to `PAGE_SIZES`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_page_number")]
    pub number: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
}

fn default_page_number() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: default_page_number(),
            size: default_page_size(),
        }
    }
}

impl Page {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.number < 1 {
            let mut err = ValidationError::new("invalid_page_number");
            err.message = Some("Page number must be at least 1".into());
            return Err(err);
        }
        if !PAGE_SIZES.contains(&self.size) {
            let mut err = ValidationError::new("invalid_page_size");
            err.message = Some("Page size must be one of 10, 20, 50".into());
            return Err(err);
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }
}

/// Sortable fields for transaction listings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    TransactionDate,
    Amount,
}

impl SortField {
    /// Column name rendered into ORDER BY. Restricted to this enum, so user
    /// input never reaches the SQL text.
    pub fn as_column(&self) -> &'static str {
        match self {
            SortField::TransactionDate => "transaction_date",
            SortField::Amount => "amount",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub dir: SortDir,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::TransactionDate,
            dir: SortDir::Desc,
        }
    }
}

/// Pagination metadata for a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: &Page, total: i64) -> Self {
        Self {
            page: page.number,
            limit: page.size,
            total_pages: (total + page.size - 1) / page.size,
            has_next: page.number * page.size < total,
            has_prev: page.number > 1,
        }
    }
}

/// Result of a filtered listing: the page of items, the total match count,
/// and a summary computed over the same filter scope (not the whole ledger).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub items: Vec<crate::transaction::models::Transaction>,
    pub total: i64,
    pub summary: Summary,
    pub pagination: Pagination,
}

/// Raw aggregation row for the category breakdown.
#[derive(Debug, FromRow)]
pub struct BreakdownRow {
    pub category_id: Uuid,
    pub category_name: String,
    pub category_color: String,
    pub category_icon: String,
    pub transaction_type: String,
    pub total: Decimal,
    pub count: i64,
}

/// One category's share of the ledger over the requested scope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdownEntry {
    pub category_id: Uuid,
    pub category_name: String,
    pub category_color: String,
    pub category_icon: String,
    pub transaction_type: String,
    pub total: Decimal,
    pub count: i64,
    pub avg_amount: Decimal,
}

impl From<BreakdownRow> for CategoryBreakdownEntry {
    fn from(row: BreakdownRow) -> Self {
        let avg_amount = amount::average(row.total, row.count);
        Self {
            category_id: row.category_id,
            category_name: row.category_name,
            category_color: row.category_color,
            category_icon: row.category_icon,
            transaction_type: row.transaction_type,
            total: row.total,
            count: row.count,
            avg_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let page = Page { number: 1, size: 10 };
        let p = Pagination::new(&page, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let page = Page { number: 3, size: 10 };
        let p = Pagination::new(&page, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn pagination_exact_boundary_has_no_next() {
        let page = Page { number: 2, size: 10 };
        let p = Pagination::new(&page, 20);
        assert!(!p.has_next);
        assert_eq!(p.total_pages, 2);
    }

    #[test]
    fn page_size_restricted() {
        assert!(Page { number: 1, size: 20 }.validate().is_ok());
        assert!(Page { number: 1, size: 7 }.validate().is_err());
        assert!(Page { number: 0, size: 10 }.validate().is_err());
    }

    #[test]
    fn summary_net_is_income_minus_expenses() {
        let summary = Summary::from_parts(
            Decimal::new(10000, 2), // 100.00
            2,
            Decimal::new(2550, 2), // 25.50
            1,
        );
        assert_eq!(summary.net_amount, Decimal::new(7450, 2));
        assert_eq!(summary.income.avg, Decimal::new(5000, 2));
        assert_eq!(summary.expenses.avg, Decimal::new(2550, 2));
    }
}
