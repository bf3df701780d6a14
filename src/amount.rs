use rust_decimal::{Decimal, RoundingStrategy};
use validator::ValidationError;

/// Monetary values are fixed-precision with at most 2 decimal places. The
/// sign of a transaction is carried by its type, never by the number, so
/// amounts are strictly positive; budgets may be zero.

/// Ceiling for a category's monthly budget.
pub fn max_monthly_budget() -> Decimal {
    Decimal::new(100_000_000, 2) // 1,000,000.00
}

fn exceeds_cent_precision(value: &Decimal) -> bool {
    value.normalize().scale() > 2
}

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validate a transaction amount: strictly positive, at most 2 decimal places.
pub fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(error_with_message(
            "amount_must_be_positive",
            "Amount must be positive",
        ));
    }
    if exceeds_cent_precision(amount) {
        return Err(error_with_message(
            "amount_max_two_decimal_places",
            "Amount must have at most 2 decimal places",
        ));
    }
    Ok(())
}

/// Validate a monthly budget: non-negative, capped, at most 2 decimal places.
pub fn validate_budget(budget: &Decimal) -> Result<(), ValidationError> {
    if *budget < Decimal::ZERO {
        return Err(error_with_message(
            "budget_must_be_non_negative",
            "Monthly budget must be non-negative",
        ));
    }
    if *budget > max_monthly_budget() {
        return Err(error_with_message(
            "budget_exceeds_ceiling",
            "Monthly budget exceeds the allowed ceiling",
        ));
    }
    if exceeds_cent_precision(budget) {
        return Err(error_with_message(
            "budget_max_two_decimal_places",
            "Monthly budget must have at most 2 decimal places",
        ));
    }
    Ok(())
}

/// Average of a decimal total over a count, rounded back to cents.
/// Zero count yields zero rather than dividing.
pub fn average(total: Decimal, count: i64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (total / Decimal::from(count))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn accepts_two_decimal_places() {
        assert!(validate_amount(&dec("100.55")).is_ok());
        assert!(validate_amount(&dec("0.01")).is_ok());
    }

    #[test]
    fn rejects_three_decimal_places() {
        let err = validate_amount(&dec("100.555")).unwrap_err();
        assert_eq!(err.code, "amount_max_two_decimal_places");
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert!(validate_amount(&dec("100.5500")).is_ok());
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        assert!(validate_amount(&dec("0")).is_err());
        assert!(validate_amount(&dec("-5.00")).is_err());
    }

    #[test]
    fn budget_allows_zero_but_not_negative() {
        assert!(validate_budget(&Decimal::ZERO).is_ok());
        assert!(validate_budget(&dec("-0.01")).is_err());
    }

    #[test]
    fn budget_ceiling_enforced() {
        assert!(validate_budget(&dec("1000000.00")).is_ok());
        let err = validate_budget(&dec("1000000.01")).unwrap_err();
        assert_eq!(err.code, "budget_exceeds_ceiling");
    }

    #[test]
    fn average_rounds_to_cents() {
        assert_eq!(average(dec("10.00"), 3), dec("3.33"));
        assert_eq!(average(dec("0.05"), 2), dec("0.03"));
        assert_eq!(average(Decimal::ZERO, 0), Decimal::ZERO);
    }
}
