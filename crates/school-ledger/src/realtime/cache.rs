use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use super::feed::{ChangeKind, Notification, Subscription};
use crate::staff::domain::UserAccount;
use crate::tuition::domain::{SchoolClass, Student, TuitionFee, TuitionPayment};

/// A row that can live in a [`TableCache`].
pub trait CachedRow: DeserializeOwned + Clone {
    fn row_key(&self) -> String;
}

impl CachedRow for TuitionPayment {
    fn row_key(&self) -> String {
        self.id.0.clone()
    }
}

impl CachedRow for Student {
    fn row_key(&self) -> String {
        self.id.0.clone()
    }
}

impl CachedRow for SchoolClass {
    fn row_key(&self) -> String {
        self.id.0.clone()
    }
}

impl CachedRow for TuitionFee {
    fn row_key(&self) -> String {
        self.id.0.clone()
    }
}

impl CachedRow for UserAccount {
    fn row_key(&self) -> String {
        self.id.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    Inserted,
    Updated,
    Removed,
    Unchanged,
    /// Events were lost or unreadable; the owner must call [`TableCache::reload`].
    ReloadRequired,
}

/// Local copy of a table kept current by patching it with change events.
#[derive(Debug, Clone)]
pub struct TableCache<T> {
    rows: BTreeMap<String, T>,
    stale: bool,
}

impl<T> Default for TableCache<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            stale: false,
        }
    }
}

impl<T: CachedRow> TableCache<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        let mut cache = Self::default();
        cache.reload(rows);
        cache
    }

    /// Replace the contents with a fresh fetch and clear the stale flag.
    pub fn reload(&mut self, rows: Vec<T>) {
        self.rows = rows.into_iter().map(|row| (row.row_key(), row)).collect();
        self.stale = false;
    }

    pub fn apply(&mut self, notification: Notification) -> CacheUpdate {
        let event = match notification {
            Notification::Change(event) => event,
            Notification::Lagged { .. } => {
                self.stale = true;
                return CacheUpdate::ReloadRequired;
            }
        };

        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let row: T = match serde_json::from_value(event.record) {
                    Ok(row) => row,
                    Err(err) => {
                        tracing::warn!(
                            table = event.table.as_str(),
                            row_id = %event.row_id,
                            error = %err,
                            "unreadable change record"
                        );
                        self.stale = true;
                        return CacheUpdate::ReloadRequired;
                    }
                };
                match self.rows.insert(row.row_key(), row) {
                    Some(_) => CacheUpdate::Updated,
                    None => CacheUpdate::Inserted,
                }
            }
            ChangeKind::Delete => match self.rows.remove(&event.row_id) {
                Some(_) => CacheUpdate::Removed,
                None => CacheUpdate::Unchanged,
            },
        }
    }

    /// Apply every notification already queued on `subscription`.
    pub fn drain(&mut self, subscription: &mut Subscription) -> Vec<CacheUpdate> {
        let mut updates = Vec::new();
        while let Some(notification) = subscription.try_next() {
            updates.push(self.apply(notification));
        }
        updates
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
