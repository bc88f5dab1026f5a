use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use chrono::NaiveDate;
use serde_json::Value;

use crate::documents::{Letterhead, PdfRenderer};
use crate::session::{Role, SchoolSession};
use crate::tuition::domain::{
    AcademicYear, ClassId, PaymentId, PaymentMethod, ScheduleEntry, SchoolClass, SchoolId,
    Student, StudentId, TuitionFee, TuitionFeeId, TuitionPayment, Xof,
};
use crate::tuition::repository::{RepositoryError, TuitionRepository};
use crate::tuition::service::{NewClass, NewPayment, NewStudent, TuitionFeeDraft, TuitionService};
use crate::tuition::status::StatusPolicy;
use crate::tuition::{tuition_router, InMemoryTuitionStore};

pub(super) const SCHOOL: &str = "sch-1";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn year() -> AcademicYear {
    AcademicYear::starting(2025)
}

pub(super) fn entry(installment_number: u32, due_month: u32, amount: Xof) -> ScheduleEntry {
    ScheduleEntry {
        installment_number,
        due_month,
        amount,
    }
}

/// Registration 25 000, annex 10 000, tuition 90 000 in three installments.
pub(super) fn fee_draft() -> TuitionFeeDraft {
    TuitionFeeDraft {
        academic_year: year(),
        total_amount: 90_000,
        registration_fee: 25_000,
        other_fees: 10_000,
        schedule: vec![entry(1, 10, 30_000), entry(2, 12, 30_000), entry(3, 2, 30_000)],
    }
}

pub(super) fn fee(
    registration_fee: Xof,
    other_fees: Xof,
    schedule: Vec<ScheduleEntry>,
) -> TuitionFee {
    TuitionFee {
        id: TuitionFeeId::from("fee-test"),
        school_id: SchoolId::from(SCHOOL),
        class_id: ClassId::from("cls-test"),
        academic_year: year(),
        total_amount: schedule.iter().map(|entry| entry.amount).sum(),
        registration_fee,
        other_fees,
        schedule,
    }
}

pub(super) fn payment(id: &str, amount: Xof, on: NaiveDate, sequence: u64) -> TuitionPayment {
    TuitionPayment {
        id: PaymentId::from(id),
        school_id: SchoolId::from(SCHOOL),
        student_id: StudentId::from("stu-test"),
        amount,
        payment_date: on,
        payment_method: PaymentMethod::Cash,
        reference: None,
        sequence,
    }
}

pub(super) fn new_payment(amount: Xof, on: NaiveDate) -> NewPayment {
    NewPayment {
        amount,
        payment_date: on,
        payment_method: PaymentMethod::MobileMoney,
        reference: Some("MM-4411".to_string()),
    }
}

pub(super) fn admin() -> SchoolSession {
    SchoolSession::new(SCHOOL, Role::Admin).with_user("usr-admin")
}

pub(super) fn accountant() -> SchoolSession {
    SchoolSession::new(SCHOOL, Role::Accountant).with_user("usr-compta")
}

pub(super) fn parent() -> SchoolSession {
    SchoolSession::new(SCHOOL, Role::Parent)
}

pub(super) fn build_service() -> (Arc<TuitionService<InMemoryTuitionStore>>, InMemoryTuitionStore) {
    let store = InMemoryTuitionStore::default();
    let service = Arc::new(TuitionService::new(
        Arc::new(store.clone()),
        StatusPolicy::default(),
    ));
    (service, store)
}

/// A class with the default fee and one enrolled student.
pub(super) fn seeded_student(
    service: &TuitionService<InMemoryTuitionStore>,
    matricule: &str,
    last_name: &str,
) -> (SchoolClass, Student) {
    let class = service
        .create_class(
            &admin(),
            NewClass {
                name: format!("CM2 {matricule}"),
                level: Some("CM2".to_string()),
            },
        )
        .expect("class created");
    service
        .define_tuition_fee(&accountant(), &class.id, fee_draft())
        .expect("fee defined");
    let student = enroll(service, &class.id, matricule, last_name);
    (class, student)
}

pub(super) fn enroll(
    service: &TuitionService<InMemoryTuitionStore>,
    class_id: &ClassId,
    matricule: &str,
    last_name: &str,
) -> Student {
    service
        .enroll_student(
            &admin(),
            NewStudent {
                class_id: class_id.clone(),
                matricule: matricule.to_string(),
                first_name: "Aya".to_string(),
                last_name: last_name.to_string(),
                birth_date: Some(date(2014, 3, 12)),
                birth_place: Some("Abidjan".to_string()),
                parent_phone: None,
            },
        )
        .expect("student enrolled")
}

pub(super) fn router_with_service(service: Arc<TuitionService<InMemoryTuitionStore>>) -> Router {
    tuition_router(
        service,
        Arc::new(PdfRenderer),
        Letterhead::named("Groupe Scolaire Les Palmiers"),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}

/// Rejects every write as a duplicate.
pub(super) struct ConflictRepository;

impl TuitionRepository for ConflictRepository {
    fn insert_class(&self, _class: SchoolClass) -> Result<SchoolClass, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn class(
        &self,
        _school: &SchoolId,
        _id: &ClassId,
    ) -> Result<Option<SchoolClass>, RepositoryError> {
        Ok(None)
    }

    fn insert_student(&self, _student: Student) -> Result<Student, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn student(
        &self,
        _school: &SchoolId,
        _id: &StudentId,
    ) -> Result<Option<Student>, RepositoryError> {
        Ok(None)
    }

    fn students(&self, _school: &SchoolId) -> Result<Vec<Student>, RepositoryError> {
        Ok(Vec::new())
    }

    fn upsert_tuition_fee(&self, _fee: TuitionFee) -> Result<TuitionFee, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn tuition_fees(
        &self,
        _school: &SchoolId,
        _class: &ClassId,
    ) -> Result<Vec<TuitionFee>, RepositoryError> {
        Ok(Vec::new())
    }

    fn insert_payment(&self, _payment: TuitionPayment) -> Result<TuitionPayment, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn payment(
        &self,
        _school: &SchoolId,
        _id: &PaymentId,
    ) -> Result<Option<TuitionPayment>, RepositoryError> {
        Ok(None)
    }

    fn payments_for_student(
        &self,
        _school: &SchoolId,
        _student: &StudentId,
    ) -> Result<Vec<TuitionPayment>, RepositoryError> {
        Ok(Vec::new())
    }

    fn payments(&self, _school: &SchoolId) -> Result<Vec<TuitionPayment>, RepositoryError> {
        Ok(Vec::new())
    }
}

/// Fails every call.
pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl TuitionRepository for UnavailableRepository {
    fn insert_class(&self, _class: SchoolClass) -> Result<SchoolClass, RepositoryError> {
        offline()
    }

    fn class(
        &self,
        _school: &SchoolId,
        _id: &ClassId,
    ) -> Result<Option<SchoolClass>, RepositoryError> {
        offline()
    }

    fn insert_student(&self, _student: Student) -> Result<Student, RepositoryError> {
        offline()
    }

    fn student(
        &self,
        _school: &SchoolId,
        _id: &StudentId,
    ) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn students(&self, _school: &SchoolId) -> Result<Vec<Student>, RepositoryError> {
        offline()
    }

    fn upsert_tuition_fee(&self, _fee: TuitionFee) -> Result<TuitionFee, RepositoryError> {
        offline()
    }

    fn tuition_fees(
        &self,
        _school: &SchoolId,
        _class: &ClassId,
    ) -> Result<Vec<TuitionFee>, RepositoryError> {
        offline()
    }

    fn insert_payment(&self, _payment: TuitionPayment) -> Result<TuitionPayment, RepositoryError> {
        offline()
    }

    fn payment(
        &self,
        _school: &SchoolId,
        _id: &PaymentId,
    ) -> Result<Option<TuitionPayment>, RepositoryError> {
        offline()
    }

    fn payments_for_student(
        &self,
        _school: &SchoolId,
        _student: &StudentId,
    ) -> Result<Vec<TuitionPayment>, RepositoryError> {
        offline()
    }

    fn payments(&self, _school: &SchoolId) -> Result<Vec<TuitionPayment>, RepositoryError> {
        offline()
    }
}
