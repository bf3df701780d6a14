use rust_decimal::Decimal;
use serde::Serialize;

use super::models::Summary;
use crate::transaction::models::TransactionType;

/// Incrementally maintained cache of ledger totals.
///
/// Not authoritative: after each mutation settles it must equal a full
/// recomputation over the same scope (`SummaryService::monthly_summary` or
/// the list summary). The one rule that keeps it honest is in
/// `apply_update`: always subtract the old record and add the new one —
/// including when only the amount changed. Subtracting the *new* amount
/// there would silently discard the old value and drift the totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryProjection {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub income_count: i64,
    pub expense_count: i64,
    pub net_amount: Decimal,
}

impl SummaryProjection {
    /// Seed a projection from an authoritative recomputation.
    pub fn from_summary(summary: &Summary) -> Self {
        let mut projection = Self {
            total_income: summary.income.total,
            total_expenses: summary.expenses.total,
            income_count: summary.income.count,
            expense_count: summary.expenses.count,
            net_amount: Decimal::ZERO,
        };
        projection.refresh_net();
        projection
    }

    pub fn apply_create(&mut self, transaction_type: TransactionType, amount: Decimal) {
        self.add(transaction_type, amount);
        self.refresh_net();
    }

    pub fn apply_delete(&mut self, transaction_type: TransactionType, amount: Decimal) {
        self.subtract(transaction_type, amount);
        self.refresh_net();
    }

    /// Update rule: subtract the old record, add the new one. Holds for both
    /// the type-change and the same-type amount-change case.
    pub fn apply_update(
        &mut self,
        old_type: TransactionType,
        old_amount: Decimal,
        new_type: TransactionType,
        new_amount: Decimal,
    ) {
        self.subtract(old_type, old_amount);
        self.add(new_type, new_amount);
        self.refresh_net();
    }

    /// Whether this projection agrees with an authoritative recomputation.
    pub fn matches(&self, summary: &Summary) -> bool {
        *self == Self::from_summary(summary)
    }

    fn add(&mut self, transaction_type: TransactionType, amount: Decimal) {
        match transaction_type {
            TransactionType::Income => {
                self.total_income += amount;
                self.income_count += 1;
            }
            TransactionType::Expense => {
                self.total_expenses += amount;
                self.expense_count += 1;
            }
        }
    }

    fn subtract(&mut self, transaction_type: TransactionType, amount: Decimal) {
        match transaction_type {
            TransactionType::Income => {
                self.total_income -= amount;
                self.income_count -= 1;
            }
            TransactionType::Expense => {
                self.total_expenses -= amount;
                self.expense_count -= 1;
            }
        }
    }

    fn refresh_net(&mut self) {
        self.net_amount = self.total_income - self.total_expenses;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn create_and_delete_are_inverses() {
        let mut projection = SummaryProjection::default();
        projection.apply_create(TransactionType::Income, dec("100.00"));
        projection.apply_create(TransactionType::Expense, dec("40.00"));
        assert_eq!(projection.net_amount, dec("60.00"));

        projection.apply_delete(TransactionType::Expense, dec("40.00"));
        projection.apply_delete(TransactionType::Income, dec("100.00"));
        assert_eq!(projection, SummaryProjection::default());
    }

    #[test]
    fn amount_change_applies_the_true_delta() {
        let mut projection = SummaryProjection::default();
        projection.apply_create(TransactionType::Expense, dec("40.00"));

        // Same type, amount changed: the old amount must leave the total.
        projection.apply_update(
            TransactionType::Expense,
            dec("40.00"),
            TransactionType::Expense,
            dec("55.50"),
        );

        assert_eq!(projection.total_expenses, dec("55.50"));
        assert_eq!(projection.expense_count, 1);
        assert_eq!(projection.net_amount, dec("-55.50"));
    }

    #[test]
    fn type_change_moves_the_record_across_sides() {
        let mut projection = SummaryProjection::default();
        projection.apply_create(TransactionType::Expense, dec("25.00"));

        projection.apply_update(
            TransactionType::Expense,
            dec("25.00"),
            TransactionType::Income,
            dec("25.00"),
        );

        assert_eq!(projection.total_expenses, Decimal::ZERO);
        assert_eq!(projection.expense_count, 0);
        assert_eq!(projection.total_income, dec("25.00"));
        assert_eq!(projection.income_count, 1);
        assert_eq!(projection.net_amount, dec("25.00"));
    }

    #[test]
    fn net_amount_always_equals_income_minus_expenses() {
        let mut projection = SummaryProjection::default();
        let ops: &[(TransactionType, &str)] = &[
            (TransactionType::Income, "10.00"),
            (TransactionType::Expense, "3.33"),
            (TransactionType::Income, "0.01"),
            (TransactionType::Expense, "99.99"),
        ];
        for (t, a) in ops {
            projection.apply_create(*t, dec(a));
            assert_eq!(
                projection.net_amount,
                projection.total_income - projection.total_expenses
            );
        }
    }

    #[test]
    fn matches_a_summary_built_from_the_same_records() {
        let mut projection = SummaryProjection::default();
        projection.apply_create(TransactionType::Income, dec("100.00"));
        projection.apply_create(TransactionType::Income, dec("50.00"));
        projection.apply_create(TransactionType::Expense, dec("25.50"));

        let summary = Summary::from_parts(dec("150.00"), 2, dec("25.50"), 1);
        assert!(projection.matches(&summary));

        projection.apply_delete(TransactionType::Income, dec("50.00"));
        assert!(!projection.matches(&summary));
    }
}
