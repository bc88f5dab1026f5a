use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{NewUserAccount, PayrollEntry, UserAccount, UserId};
use super::repository::{PayrollLedger, StaffStoreError, UserDirectory};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use crate::tuition::domain::SchoolId;

#[derive(Debug, Default)]
struct StaffTables {
    users: BTreeMap<UserId, UserAccount>,
    payrolls: Vec<PayrollEntry>,
    next_user: u64,
}

/// Process-local `users` and `payrolls` tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStaffStore {
    tables: Arc<Mutex<StaffTables>>,
    feed: Option<ChangeFeed>,
}

impl InMemoryStaffStore {
    pub fn with_feed(feed: ChangeFeed) -> Self {
        Self {
            tables: Arc::default(),
            feed: Some(feed),
        }
    }

    pub fn users(&self, school: &SchoolId) -> Result<Vec<UserAccount>, StaffStoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|user| &user.school_id == school)
            .cloned()
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StaffTables>, StaffStoreError> {
        self.tables
            .lock()
            .map_err(|_| StaffStoreError::Unavailable("staff store mutex poisoned".to_string()))
    }

    fn announce(
        &self,
        table: Table,
        kind: ChangeKind,
        school_id: &SchoolId,
        row_id: &str,
        record: serde_json::Value,
    ) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeEvent {
                table,
                kind,
                school_id: school_id.clone(),
                class_id: None,
                row_id: row_id.to_string(),
                record,
            });
        }
    }
}

impl UserDirectory for InMemoryStaffStore {
    fn create_user(&self, account: NewUserAccount) -> Result<UserAccount, StaffStoreError> {
        let user = {
            let mut tables = self.lock()?;
            let email = account.email.trim().to_ascii_lowercase();
            if tables
                .users
                .values()
                .any(|user| user.email.eq_ignore_ascii_case(&email))
            {
                return Err(StaffStoreError::DuplicateEmail(email));
            }

            tables.next_user += 1;
            let user = UserAccount {
                id: UserId(format!("usr-{:06}", tables.next_user)),
                school_id: account.school_id,
                email,
                first_name: account.first_name.trim().to_string(),
                last_name: account.last_name.trim().to_string(),
                phone: account.phone,
                role: account.role,
            };
            tables.users.insert(user.id.clone(), user.clone());
            user
        };

        self.announce(
            Table::Users,
            ChangeKind::Insert,
            &user.school_id,
            &user.id.0,
            serde_json::to_value(&user).unwrap_or_default(),
        );
        Ok(user)
    }

    fn delete_user(&self, school: &SchoolId, id: &UserId) -> Result<(), StaffStoreError> {
        let removed = {
            let mut tables = self.lock()?;
            let owned = tables
                .users
                .get(id)
                .is_some_and(|user| &user.school_id == school);
            if owned {
                tables.users.remove(id)
            } else {
                None
            }
        };

        let user = removed.ok_or(StaffStoreError::NotFound)?;
        self.announce(
            Table::Users,
            ChangeKind::Delete,
            school,
            &user.id.0,
            serde_json::json!({}),
        );
        Ok(())
    }

    fn user(&self, school: &SchoolId, id: &UserId) -> Result<Option<UserAccount>, StaffStoreError> {
        Ok(self
            .lock()?
            .users
            .get(id)
            .filter(|user| &user.school_id == school)
            .cloned())
    }
}

impl PayrollLedger for InMemoryStaffStore {
    fn insert_payroll(&self, entry: PayrollEntry) -> Result<PayrollEntry, StaffStoreError> {
        {
            let mut tables = self.lock()?;
            if !tables.users.contains_key(&entry.user_id) {
                return Err(StaffStoreError::NotFound);
            }
            tables.payrolls.push(entry.clone());
        }

        self.announce(
            Table::Payrolls,
            ChangeKind::Insert,
            &entry.school_id,
            &entry.id.0,
            serde_json::to_value(&entry).unwrap_or_default(),
        );
        Ok(entry)
    }

    fn payrolls(&self, school: &SchoolId) -> Result<Vec<PayrollEntry>, StaffStoreError> {
        Ok(self
            .lock()?
            .payrolls
            .iter()
            .filter(|entry| &entry.school_id == school)
            .cloned()
            .collect())
    }
}
