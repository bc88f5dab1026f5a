use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{sort_payments, PaymentMethod, Student, TuitionFee, TuitionPayment, Xof};
use super::money::percentage;
use super::statement::allocate_payments;
use super::status::{classify, StatusBucket, StatusPolicy};

/// A student with the rows the report needs.
#[derive(Debug, Clone)]
pub struct StudentLedger {
    pub student: Student,
    pub fee: Option<TuitionFee>,
    pub payments: Vec<TuitionPayment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub label: &'static str,
    pub amount: Xof,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCollection {
    pub date: NaiveDate,
    pub amount: Xof,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Xof>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_pct: Option<f64>,
}

/// Paid amounts per waterfall component, summed over students.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComponentTotals {
    pub registration: Xof,
    pub other_fees: Xof,
    pub tuition: Xof,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub bucket: StatusBucket,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreasuryReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub collected_in_period: Xof,
    pub payment_count: usize,
    pub by_method: Vec<MethodTotal>,
    pub daily: Vec<DailyCollection>,
    pub expected_total: Xof,
    pub collected_to_date: Xof,
    pub outstanding_total: Xof,
    pub collection_rate_pct: f64,
    pub allocated: ComponentTotals,
    pub status_counts: Vec<StatusCount>,
}

/// Aggregate the ledger for `[from, to]`. Year-to-date figures count every payment up to `to`.
pub fn build_treasury_report(
    ledgers: &[StudentLedger],
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    policy: StatusPolicy,
) -> TreasuryReport {
    let mut by_method: Vec<MethodTotal> = PaymentMethod::ordered()
        .into_iter()
        .map(|method| MethodTotal {
            method,
            label: method.label(),
            amount: 0,
            count: 0,
        })
        .collect();
    let mut per_day: BTreeMap<NaiveDate, Xof> = BTreeMap::new();
    let mut collected_in_period = 0;
    let mut payment_count = 0;
    let mut expected_total = 0;
    let mut collected_to_date = 0;
    let mut outstanding_total = 0;
    let mut allocated = ComponentTotals::default();
    let mut buckets: BTreeMap<StatusBucket, usize> = BTreeMap::new();

    for ledger in ledgers {
        let mut to_date: Vec<TuitionPayment> = ledger
            .payments
            .iter()
            .filter(|payment| payment.payment_date <= to)
            .cloned()
            .collect();
        sort_payments(&mut to_date);

        for payment in to_date.iter().filter(|payment| payment.payment_date >= from) {
            collected_in_period += payment.amount;
            payment_count += 1;
            *per_day.entry(payment.payment_date).or_insert(0) += payment.amount;
            if let Some(total) = by_method
                .iter_mut()
                .find(|total| total.method == payment.payment_method)
            {
                total.amount += payment.amount;
                total.count += 1;
            }
        }

        let paid: Xof = to_date.iter().map(|payment| payment.amount).sum();
        collected_to_date += paid;

        let breakdown = allocate_payments(ledger.fee.as_ref(), &to_date);
        if let Some(breakdown) = &breakdown {
            expected_total += breakdown.total_due();
            outstanding_total += breakdown.balance().max(0);
            allocated.registration += breakdown.registration.paid;
            allocated.other_fees += breakdown.other_fees.paid;
            allocated.tuition += breakdown.tuition.paid;
        }

        let bucket = classify(breakdown.as_ref(), today, policy).bucket();
        *buckets.entry(bucket).or_insert(0) += 1;
    }

    let daily = daily_series(from, to, &per_day);

    let status_counts = StatusBucket::ordered()
        .into_iter()
        .map(|bucket| StatusCount {
            bucket,
            count: buckets.get(&bucket).copied().unwrap_or(0),
        })
        .collect();

    TreasuryReport {
        from,
        to,
        collected_in_period,
        payment_count,
        by_method,
        daily,
        expected_total,
        collected_to_date,
        outstanding_total,
        collection_rate_pct: percentage(collected_to_date, expected_total),
        allocated,
        status_counts,
    }
}

/// One entry per calendar day, with the change against the previous day.
fn daily_series(
    from: NaiveDate,
    to: NaiveDate,
    per_day: &BTreeMap<NaiveDate, Xof>,
) -> Vec<DailyCollection> {
    let mut series = Vec::new();
    let mut previous: Option<Xof> = None;
    let mut next = Some(from);

    while let Some(day) = next.filter(|day| *day <= to) {
        let amount = per_day.get(&day).copied().unwrap_or(0);
        let delta = previous.map(|prev| amount - prev);
        let delta_pct = previous
            .filter(|prev| *prev > 0)
            .map(|prev| percentage(amount - prev, prev));
        series.push(DailyCollection {
            date: day,
            amount,
            delta,
            delta_pct,
        });
        previous = Some(amount);
        next = day.succ_opt();
    }

    series
}
