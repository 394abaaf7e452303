use crate::model::*;

use super::error::QuoteError;

// ── Pricing ───────────────────────────────────────────────────────

/// Whole days charged for a range: calendar days from start to end,
/// floored at one so a same-day rental is never free.
pub fn billable_days(range: &DateRange) -> i64 {
    range.span_days().max(1)
}

/// Price a rental of `range` at `daily_rate`.
///
/// `total = max(0, subtotal - discount)` and `remaining = max(0, total - deposit)`;
/// the payment status follows from those two numbers.
pub fn quote(
    range: &DateRange,
    daily_rate: Money,
    discount: Money,
    deposit: Money,
) -> Result<Quote, QuoteError> {
    price(billable_days(range), daily_rate, discount, deposit)
}

pub(crate) fn price(days: i64, daily_rate: Money, discount: Money, deposit: Money) -> Result<Quote, QuoteError> {
    if daily_rate < 0 {
        return Err(QuoteError::NegativeRate(daily_rate));
    }
    if discount < 0 {
        return Err(QuoteError::NegativeDiscount(discount));
    }
    if deposit < 0 {
        return Err(QuoteError::NegativeDeposit(deposit));
    }

    let subtotal = days.saturating_mul(daily_rate);
    let total = subtotal.saturating_sub(discount).max(0);
    let remaining = total.saturating_sub(deposit).max(0);

    Ok(Quote {
        days,
        daily_rate,
        subtotal,
        discount,
        deposit,
        total,
        remaining,
        payment_status: PaymentStatus::from_amounts(deposit, remaining),
    })
}

impl Quote {
    /// Re-derive totals and payment status for a new discount/deposit pair,
    /// keeping the priced days and rate.
    pub fn with_adjustments(&self, discount: Money, deposit: Money) -> Result<Quote, QuoteError> {
        price(self.days, self.daily_rate, discount, deposit)
    }

    /// Price a different range at `daily_rate`, keeping this quote's discount and deposit.
    pub fn for_range(&self, range: &DateRange, daily_rate: Money) -> Result<Quote, QuoteError> {
        quote(range, daily_rate, self.discount, self.deposit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    #[test]
    fn three_day_span() {
        let q = quote(&range("2024-06-10", "2024-06-13"), 100, 0, 0).unwrap();
        assert_eq!(q.days(), 3);
        assert_eq!(q.subtotal(), 300);
        assert_eq!(q.total(), 300);
        assert_eq!(q.remaining(), 300);
        assert_eq!(q.payment_status(), PaymentStatus::Unpaid);
    }

    #[test]
    fn same_day_is_one_day() {
        let q = quote(&range("2024-06-10", "2024-06-10"), 100, 0, 0).unwrap();
        assert_eq!(q.days(), 1);
        assert_eq!(q.subtotal(), 100);
    }

    #[test]
    fn day_count_ignores_dst_shifts() {
        // Spans the March DST change in most northern time zones
        let q = quote(&range("2024-03-09", "2024-03-12"), 50, 0, 0).unwrap();
        assert_eq!(q.days(), 3);
        // And the October/November one
        let q = quote(&range("2024-10-26", "2024-11-04"), 50, 0, 0).unwrap();
        assert_eq!(q.days(), 9);
    }

    #[test]
    fn discount_larger_than_subtotal() {
        let q = quote(&range("2024-06-10", "2024-06-10"), 100, 150, 0).unwrap();
        assert_eq!(q.total(), 0);
        assert_eq!(q.remaining(), 0);
        assert_eq!(q.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn partial_and_full_deposit() {
        let r = range("2024-06-10", "2024-06-13");
        let partial = quote(&r, 100, 50, 100).unwrap();
        assert_eq!(partial.total(), 250);
        assert_eq!(partial.remaining(), 150);
        assert_eq!(partial.payment_status(), PaymentStatus::Partial);

        let paid = quote(&r, 100, 50, 400).unwrap();
        assert_eq!(paid.remaining(), 0); // overpayment does not go negative
        assert_eq!(paid.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn negative_inputs_rejected() {
        let r = range("2024-06-10", "2024-06-13");
        assert_eq!(quote(&r, -1, 0, 0), Err(QuoteError::NegativeRate(-1)));
        assert_eq!(quote(&r, 100, -5, 0), Err(QuoteError::NegativeDiscount(-5)));
        assert_eq!(quote(&r, 100, 0, -7), Err(QuoteError::NegativeDeposit(-7)));
    }

    #[test]
    fn adjustments_recompute_status() {
        let q = quote(&range("2024-06-10", "2024-06-13"), 100, 0, 0).unwrap();
        let q2 = q.with_adjustments(0, 100).unwrap();
        assert_eq!(q2.days(), 3);
        assert_eq!(q2.remaining(), 200);
        assert_eq!(q2.payment_status(), PaymentStatus::Partial);

        let q3 = q2.with_adjustments(100, 200).unwrap();
        assert_eq!(q3.total(), 200);
        assert_eq!(q3.remaining(), 0);
        assert_eq!(q3.payment_status(), PaymentStatus::Paid);

        assert!(q3.with_adjustments(-1, 0).is_err());
    }

    #[test]
    fn reprice_for_new_range_keeps_adjustments() {
        let q = quote(&range("2024-06-10", "2024-06-13"), 100, 20, 50).unwrap();
        let moved = q.for_range(&range("2024-06-10", "2024-06-15"), 120).unwrap();
        assert_eq!(moved.days(), 5);
        assert_eq!(moved.subtotal(), 600);
        assert_eq!(moved.discount(), 20);
        assert_eq!(moved.deposit(), 50);
        assert_eq!(moved.remaining(), 530);
    }
}
