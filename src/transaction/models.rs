use chrono::{DateTime, Datelike, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::amount;
use crate::category::models::CategoryType;

/// A transaction's type is always the owning category's type.
pub type TransactionType = CategoryType;

/// Maximum tags per transaction.
pub const MAX_TAGS: usize = 3;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"^[a-z-]+$").unwrap();
}

/// Database model for transactions
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub transaction_type: String,
    pub amount: Decimal,
    pub description: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub transaction_date: DateTime<Utc>,
    pub year: i32,
    pub month: i32,
    pub year_month: String,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn get_type(&self) -> TransactionType {
        TransactionType::parse(&self.transaction_type).unwrap_or(TransactionType::Expense)
    }
}

/// Calendar parts derived from a transaction instant (UTC calendar date):
/// `(year, month, "YYYY-MM")`. Recomputed whenever the date changes.
pub fn date_parts(instant: DateTime<Utc>) -> (i32, i32, String) {
    let date = instant.date_naive();
    let year = date.year();
    let month = date.month() as i32;
    (year, month, format!("{year:04}-{month:02}"))
}

/// Case-fold, deduplicate and validate tags. Order is preserved.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, ValidationError> {
    if tags.len() > MAX_TAGS {
        let mut err = ValidationError::new("too_many_tags");
        err.message = Some(format!("At most {MAX_TAGS} tags are allowed").into());
        return Err(err);
    }

    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let folded = tag.trim().to_lowercase();
        if !TAG_RE.is_match(&folded) {
            let mut err = ValidationError::new("invalid_tag");
            err.message =
                Some("Tags may only contain lowercase letters and hyphens".into());
            return Err(err);
        }
        if !normalized.contains(&folded) {
            normalized.push(folded);
        }
    }
    Ok(normalized)
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    amount::validate_amount(amount)
}

/// Request body for creating a transaction
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionDto {
    /// Category this transaction belongs to
    pub category_id: Uuid,

    /// Transaction amount (positive, at most 2 decimal places)
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,

    /// Caller-declared type; must match the category's type when present
    pub transaction_type: Option<TransactionType>,

    /// Description (1-255 characters)
    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: String,

    /// Optional free-text notes
    pub notes: Option<String>,

    /// Date of the transaction
    pub transaction_date: DateTime<Utc>,

    /// Tags (at most 3, lowercase letters and hyphens)
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for updating a transaction (PATCH - all fields optional)
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionDto {
    /// Category ID; type is re-derived when this changes
    pub category_id: Option<Uuid>,

    /// Transaction amount
    pub amount: Option<Decimal>,

    /// Caller-declared type; must match the (final) category's type
    pub transaction_type: Option<TransactionType>,

    /// Description
    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: Option<String>,

    /// Notes (use null to clear)
    pub notes: Option<Option<String>>,

    /// Transaction date; daily limit is re-checked for the new date
    pub transaction_date: Option<DateTime<Utc>>,

    /// Tags
    pub tags: Option<Vec<String>>,
}

impl UpdateTransactionDto {
    /// Validate amount if provided
    pub fn validate_amount(&self) -> Result<(), ValidationError> {
        if let Some(amount) = &self.amount {
            validate_positive_amount(amount)?;
        }
        Ok(())
    }
}

/// Field overrides for cloning a transaction. Anything left `None` is copied
/// from the source; the date defaults to "now" rather than the source's.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneTransactionDto {
    pub category_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_parts_derive_year_month_key() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let (year, month, year_month) = date_parts(instant);
        assert_eq!(year, 2024);
        assert_eq!(month, 3);
        assert_eq!(year_month, "2024-03");
    }

    #[test]
    fn date_parts_pad_single_digit_months() {
        let instant = Utc.with_ymd_and_hms(2025, 11, 30, 0, 0, 0).unwrap();
        assert_eq!(date_parts(instant).2, "2025-11");
    }

    #[test]
    fn tags_are_case_folded_and_deduplicated() {
        let tags = vec!["Food".to_string(), "food".to_string(), "take-out".to_string()];
        let normalized = normalize_tags(&tags).unwrap();
        assert_eq!(normalized, vec!["food", "take-out"]);
    }

    #[test]
    fn more_than_three_tags_rejected() {
        let tags: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let err = normalize_tags(&tags).unwrap_err();
        assert_eq!(err.code, "too_many_tags");
    }

    #[test]
    fn tags_with_digits_or_spaces_rejected() {
        assert!(normalize_tags(&["tag1".to_string()]).is_err());
        assert!(normalize_tags(&["two words".to_string()]).is_err());
        assert!(normalize_tags(&["ok-tag".to_string()]).is_ok());
    }
}
