use crate::analytics::{average, ratio_percent};
use crate::domain::metrics::{AgingBucket, AgingLabel, AgingReport};
use crate::domain::records::{Obligation, ObligationStatus};
use crate::time::period::days_between;
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Buckets the balance of every open obligation by days past due as of `as_of`.
///
/// Settled (paid/cancelled) obligations are skipped. Overpaid obligations keep their negative
/// balance and offset the bucket they fall into.
pub fn classify(obligations: &[Obligation], as_of: NaiveDate) -> AgingReport {
    let mut amounts: BTreeMap<AgingLabel, Decimal> =
        AgingLabel::ALL.iter().map(|l| (*l, Decimal::ZERO)).collect();

    for o in obligations.iter().filter(|o| o.is_open()) {
        let days_past_due = days_between(o.due_date, as_of);
        let label = AgingLabel::for_days_past_due(days_past_due);
        *amounts.entry(label).or_insert(Decimal::ZERO) += o.balance();
    }

    let buckets: Vec<AgingBucket> = amounts
        .into_iter()
        .map(|(label, amount)| AgingBucket { label, amount })
        .collect();
    let total = buckets.iter().map(|b| b.amount).sum();

    AgingReport {
        as_of,
        buckets,
        total,
    }
}

/// Days sales outstanding: `outstanding / invoiced in the trailing 90 days * 90`, truncated to
/// whole days. Zero without recent invoicing.
pub fn days_sales_outstanding(
    total_outstanding: Decimal,
    obligations: &[Obligation],
    as_of: NaiveDate,
) -> i64 {
    let window_start = as_of - Duration::days(90);
    let invoiced: Decimal = obligations
        .iter()
        .filter(|o| o.issue_date >= window_start)
        .map(|o| o.total_amount)
        .sum();

    if invoiced <= Decimal::ZERO {
        return 0;
    }
    (total_outstanding / invoiced * Decimal::from(90))
        .trunc()
        .to_i64()
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTimeliness {
    pub settled_count: usize,
    pub average_days: Decimal,
    /// Share of settled obligations paid on or before their due date, as a percentage.
    pub on_time_rate: Decimal,
}

/// Computed over paid obligations that carry a settlement date; zeroed when there are none.
pub fn payment_timeliness(obligations: &[Obligation]) -> PaymentTimeliness {
    let settled: Vec<(&Obligation, NaiveDate)> = obligations
        .iter()
        .filter(|o| o.status == ObligationStatus::Paid)
        .filter_map(|o| o.settled_date.map(|d| (o, d)))
        .collect();

    let on_time = settled.iter().filter(|(o, paid)| *paid <= o.due_date).count();
    PaymentTimeliness {
        settled_count: settled.len(),
        average_days: average(
            settled
                .iter()
                .map(|(o, paid)| Decimal::from(days_between(o.issue_date, *paid))),
        ),
        on_time_rate: ratio_percent(Decimal::from(on_time), Decimal::from(settled.len())),
    }
}
