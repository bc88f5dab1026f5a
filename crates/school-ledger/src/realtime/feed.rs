use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::tuition::domain::{ClassId, SchoolId};

/// Tables whose changes are pushed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Classes,
    Students,
    TuitionFees,
    PaymentSchedules,
    TuitionPayments,
    Users,
    Payrolls,
}

impl Table {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classes => "classes",
            Self::Students => "students",
            Self::TuitionFees => "tuition_fees",
            Self::PaymentSchedules => "payment_schedules",
            Self::TuitionPayments => "tuition_payments",
            Self::Users => "users",
            Self::Payrolls => "payrolls",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change. `record` carries the row as JSON; empty object on delete.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub school_id: SchoolId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,
    pub row_id: String,
    pub record: serde_json::Value,
}

/// Optional row filter applied on the subscriber side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub school_id: Option<SchoolId>,
    pub class_id: Option<ClassId>,
}

impl RowFilter {
    pub fn school(school_id: SchoolId) -> Self {
        Self {
            school_id: Some(school_id),
            class_id: None,
        }
    }

    pub fn with_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(school_id) = &self.school_id {
            if &event.school_id != school_id {
                return false;
            }
        }
        match (&self.class_id, &event.class_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub enum Notification {
    Change(ChangeEvent),
    /// The subscriber fell behind and `missed` events were dropped.
    Lagged { missed: u64 },
}

/// In-process broadcast of table changes.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish without caring whether anyone listens. Returns the number of receivers reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let table = event.table.as_str();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(table, receivers, "change event published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self, table: Table, filter: RowFilter) -> Subscription {
        Subscription {
            table,
            filter,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Per-table view over the feed.
#[derive(Debug)]
pub struct Subscription {
    table: Table,
    filter: RowFilter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.table
    }

    fn wanted(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && self.filter.matches(event)
    }

    /// Wait for the next matching notification. `None` once the feed is dropped.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wanted(&event) => return Some(Notification::Change(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(table = self.table.as_str(), missed, "subscription lagged");
                    return Some(Notification::Lagged { missed });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::next`].
    pub fn try_next(&mut self) -> Option<Notification> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wanted(&event) => return Some(Notification::Change(event)),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(table = self.table.as_str(), missed, "subscription lagged");
                    return Some(Notification::Lagged { missed });
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
