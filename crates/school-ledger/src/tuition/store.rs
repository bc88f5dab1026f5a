use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::domain::{
    ClassId, PaymentId, SchoolClass, SchoolId, Student, StudentId, TuitionFee, TuitionFeeId,
    TuitionPayment,
};
use super::repository::{RepositoryError, TuitionRepository};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};

#[derive(Debug, Default)]
struct Tables {
    classes: BTreeMap<ClassId, SchoolClass>,
    students: BTreeMap<StudentId, Student>,
    fees: BTreeMap<TuitionFeeId, TuitionFee>,
    payments: BTreeMap<PaymentId, TuitionPayment>,
}

/// Process-local store that announces every write on an optional change feed.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTuitionStore {
    tables: Arc<Mutex<Tables>>,
    feed: Option<ChangeFeed>,
}

impl InMemoryTuitionStore {
    pub fn with_feed(feed: ChangeFeed) -> Self {
        Self {
            tables: Arc::default(),
            feed: Some(feed),
        }
    }

    pub fn feed(&self) -> Option<&ChangeFeed> {
        self.feed.as_ref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    fn announce<T: Serialize>(
        &self,
        table: Table,
        kind: ChangeKind,
        school_id: &SchoolId,
        class_id: Option<&ClassId>,
        row_id: &str,
        row: &T,
    ) {
        let Some(feed) = &self.feed else {
            return;
        };
        let record = match serde_json::to_value(row) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(
                    table = table.as_str(),
                    error = %err,
                    "change record not serializable"
                );
                return;
            }
        };
        feed.publish(ChangeEvent {
            table,
            kind,
            school_id: school_id.clone(),
            class_id: class_id.cloned(),
            row_id: row_id.to_string(),
            record,
        });
    }
}

impl TuitionRepository for InMemoryTuitionStore {
    fn insert_class(&self, class: SchoolClass) -> Result<SchoolClass, RepositoryError> {
        {
            let mut tables = self.lock()?;
            if tables.classes.contains_key(&class.id) {
                return Err(RepositoryError::Conflict);
            }
            tables.classes.insert(class.id.clone(), class.clone());
        }
        self.announce(
            Table::Classes,
            ChangeKind::Insert,
            &class.school_id,
            Some(&class.id),
            &class.id.0,
            &class,
        );
        Ok(class)
    }

    fn class(
        &self,
        school: &SchoolId,
        id: &ClassId,
    ) -> Result<Option<SchoolClass>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .classes
            .get(id)
            .filter(|class| &class.school_id == school)
            .cloned())
    }

    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError> {
        {
            let mut tables = self.lock()?;
            let duplicate_matricule = tables.students.values().any(|existing| {
                existing.school_id == student.school_id && existing.matricule == student.matricule
            });
            if tables.students.contains_key(&student.id) || duplicate_matricule {
                return Err(RepositoryError::Conflict);
            }
            tables.students.insert(student.id.clone(), student.clone());
        }
        self.announce(
            Table::Students,
            ChangeKind::Insert,
            &student.school_id,
            Some(&student.class_id),
            &student.id.0,
            &student,
        );
        Ok(student)
    }

    fn student(
        &self,
        school: &SchoolId,
        id: &StudentId,
    ) -> Result<Option<Student>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .students
            .get(id)
            .filter(|student| &student.school_id == school)
            .cloned())
    }

    fn students(&self, school: &SchoolId) -> Result<Vec<Student>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .students
            .values()
            .filter(|student| &student.school_id == school)
            .cloned()
            .collect())
    }

    fn upsert_tuition_fee(&self, fee: TuitionFee) -> Result<TuitionFee, RepositoryError> {
        let (stored, kind) = {
            let mut tables = self.lock()?;
            let existing = tables
                .fees
                .values()
                .find(|current| {
                    current.school_id == fee.school_id
                        && current.class_id == fee.class_id
                        && current.academic_year == fee.academic_year
                })
                .map(|current| current.id.clone());

            match existing {
                Some(id) => {
                    let stored = TuitionFee { id: id.clone(), ..fee };
                    tables.fees.insert(id, stored.clone());
                    (stored, ChangeKind::Update)
                }
                None => {
                    tables.fees.insert(fee.id.clone(), fee.clone());
                    (fee, ChangeKind::Insert)
                }
            }
        };
        self.announce(
            Table::TuitionFees,
            kind,
            &stored.school_id,
            Some(&stored.class_id),
            &stored.id.0,
            &stored,
        );
        Ok(stored)
    }

    fn tuition_fees(
        &self,
        school: &SchoolId,
        class: &ClassId,
    ) -> Result<Vec<TuitionFee>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .fees
            .values()
            .filter(|fee| &fee.school_id == school && &fee.class_id == class)
            .cloned()
            .collect())
    }

    fn insert_payment(&self, payment: TuitionPayment) -> Result<TuitionPayment, RepositoryError> {
        let class_id = {
            let mut tables = self.lock()?;
            if tables.payments.contains_key(&payment.id) {
                return Err(RepositoryError::Conflict);
            }
            let class_id = tables
                .students
                .get(&payment.student_id)
                .map(|student| student.class_id.clone());
            tables.payments.insert(payment.id.clone(), payment.clone());
            class_id
        };
        self.announce(
            Table::TuitionPayments,
            ChangeKind::Insert,
            &payment.school_id,
            class_id.as_ref(),
            &payment.id.0,
            &payment,
        );
        Ok(payment)
    }

    fn payment(
        &self,
        school: &SchoolId,
        id: &PaymentId,
    ) -> Result<Option<TuitionPayment>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .get(id)
            .filter(|payment| &payment.school_id == school)
            .cloned())
    }

    fn payments_for_student(
        &self,
        school: &SchoolId,
        student: &StudentId,
    ) -> Result<Vec<TuitionPayment>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .values()
            .filter(|payment| &payment.school_id == school && &payment.student_id == student)
            .cloned()
            .collect())
    }

    fn payments(&self, school: &SchoolId) -> Result<Vec<TuitionPayment>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .values()
            .filter(|payment| &payment.school_id == school)
            .cloned()
            .collect())
    }
}
