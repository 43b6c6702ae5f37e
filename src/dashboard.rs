//! Read-side financial rollup over the product set and the movement ledger
use crate::ledger::StockMovement;
use crate::product::Product;
use crate::timestamp::TimeStamp;
use chrono::{Datelike, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub inventory_value: u64,
    pub previous_inventory_value: u64,
    pub inventory_delta_pct: f64,
    pub outgoing_value: u64,
    pub previous_outgoing_value: u64,
    pub outgoing_value_delta_pct: f64,
    pub outgoing_count: usize,
    pub previous_outgoing_count: usize,
    pub outgoing_count_delta_pct: f64,
}

/// Month-over-month rollup: current inventory value, current vs previous
/// calendar month out-movement value/count, and percentage deltas. Pure
/// computation; empty inputs produce an all-zero summary.
pub fn monthly_summary(
    products: &[Product],
    movements: &[StockMovement],
    now: &TimeStamp<Utc>,
) -> DashboardSummary {
    let current = month_of(now);
    let previous = previous_month(current);

    let inventory_value: u64 = products.iter().map(Product::total_value).sum();

    let mut outgoing_value = 0u64;
    let mut outgoing_count = 0usize;
    let mut previous_outgoing_value = 0u64;
    let mut previous_outgoing_count = 0usize;

    for movement in movements {
        let month = month_of(&movement.date);
        if month == current {
            outgoing_value += movement.total_value;
            outgoing_count += 1;
        } else if month == previous {
            previous_outgoing_value += movement.total_value;
            previous_outgoing_count += 1;
        }
    }

    // only out-movements exist in this ledger, so last month's closing value
    // is today's value with this month's outflow added back
    let previous_inventory_value = inventory_value + outgoing_value;

    DashboardSummary {
        inventory_value,
        previous_inventory_value,
        inventory_delta_pct: percent_delta(inventory_value, previous_inventory_value),
        outgoing_value,
        previous_outgoing_value,
        outgoing_value_delta_pct: percent_delta(outgoing_value, previous_outgoing_value),
        outgoing_count,
        previous_outgoing_count,
        outgoing_count_delta_pct: percent_delta(
            outgoing_count as u64,
            previous_outgoing_count as u64,
        ),
    }
}

/// `(current - previous) / previous * 100`, defined as 0 when previous is 0
pub fn percent_delta(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

fn month_of(ts: &TimeStamp<Utc>) -> (i32, u32) {
    let dt = ts.to_datetime_utc();
    (dt.year(), dt.month())
}

fn previous_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}
