use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use school_ledger::realtime::{ChangeFeed, Notification, RowFilter, Table};
use school_ledger::staff::{NotifyError, StaffNotification, StaffNotifier};
use school_ledger::tuition::ScheduleEntry;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivers staff notifications to the log. The inbox keeps a copy for the demo output.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    inbox: Arc<Mutex<Vec<StaffNotification>>>,
}

impl StaffNotifier for LoggingNotifier {
    fn notify(&self, notification: &StaffNotification) -> Result<(), NotifyError> {
        info!(
            school = %notification.school_id,
            user = %notification.user_id,
            title = %notification.title,
            "staff notification"
        );
        let mut guard = self
            .inbox
            .lock()
            .map_err(|_| NotifyError("notification inbox unavailable".to_string()))?;
        guard.push(notification.clone());
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn delivered(&self) -> Vec<StaffNotification> {
        self.inbox.lock().expect("notifier mutex poisoned").clone()
    }
}

/// Log every payment the ledger records, until the feed closes.
pub(crate) fn spawn_payment_logger(feed: &ChangeFeed) -> tokio::task::JoinHandle<()> {
    let mut subscription = feed.subscribe(Table::TuitionPayments, RowFilter::default());
    tokio::spawn(async move {
        while let Some(notification) = subscription.next().await {
            match notification {
                Notification::Change(event) => info!(
                    school = %event.school_id,
                    payment = %event.row_id,
                    amount = event.record.get("amount").and_then(|value| value.as_i64()),
                    "payment recorded on ledger"
                ),
                Notification::Lagged { missed } => {
                    warn!(missed, "payment log fell behind the change feed")
                }
            }
        }
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// `NUMBER:MONTH:AMOUNT`, e.g. `1:10:30000` for a first installment of 30 000 due in October.
pub(crate) fn parse_installment(raw: &str) -> Result<ScheduleEntry, String> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let [number, month, amount] = parts.as_slice() else {
        return Err(format!("expected NUMBER:MONTH:AMOUNT, got '{raw}'"));
    };

    let installment_number = number
        .parse::<u32>()
        .map_err(|err| format!("invalid installment number '{number}' ({err})"))?;
    let due_month = month
        .parse::<u32>()
        .ok()
        .filter(|month| (1..=12).contains(month))
        .ok_or_else(|| format!("invalid due month '{month}'"))?;
    let amount = amount
        .replace(['_', ' '], "")
        .parse::<i64>()
        .map_err(|err| format!("invalid amount '{amount}' ({err})"))?;

    Ok(ScheduleEntry {
        installment_number,
        due_month,
        amount,
    })
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
