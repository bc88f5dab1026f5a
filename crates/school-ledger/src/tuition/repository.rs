use super::domain::{
    ClassId, PaymentId, SchoolClass, SchoolId, Student, StudentId, TuitionFee, TuitionPayment,
};

/// Storage abstraction over the school tables. Every read is scoped to one school.
pub trait TuitionRepository: Send + Sync {
    fn insert_class(&self, class: SchoolClass) -> Result<SchoolClass, RepositoryError>;
    fn class(&self, school: &SchoolId, id: &ClassId)
        -> Result<Option<SchoolClass>, RepositoryError>;

    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError>;
    fn student(&self, school: &SchoolId, id: &StudentId)
        -> Result<Option<Student>, RepositoryError>;
    fn students(&self, school: &SchoolId) -> Result<Vec<Student>, RepositoryError>;

    /// Insert or replace the fee for the same class and academic year.
    fn upsert_tuition_fee(&self, fee: TuitionFee) -> Result<TuitionFee, RepositoryError>;
    fn tuition_fees(
        &self,
        school: &SchoolId,
        class: &ClassId,
    ) -> Result<Vec<TuitionFee>, RepositoryError>;

    fn insert_payment(&self, payment: TuitionPayment) -> Result<TuitionPayment, RepositoryError>;
    fn payment(&self, school: &SchoolId, id: &PaymentId)
        -> Result<Option<TuitionPayment>, RepositoryError>;
    fn payments_for_student(
        &self,
        school: &SchoolId,
        student: &StudentId,
    ) -> Result<Vec<TuitionPayment>, RepositoryError>;
    fn payments(&self, school: &SchoolId) -> Result<Vec<TuitionPayment>, RepositoryError>;

    fn students_in_class(
        &self,
        school: &SchoolId,
        class: &ClassId,
    ) -> Result<Vec<Student>, RepositoryError> {
        Ok(self
            .students(school)?
            .into_iter()
            .filter(|student| &student.class_id == class)
            .collect())
    }

    /// Latest academic year wins.
    fn current_tuition_fee(
        &self,
        school: &SchoolId,
        class: &ClassId,
    ) -> Result<Option<TuitionFee>, RepositoryError> {
        Ok(self
            .tuition_fees(school, class)?
            .into_iter()
            .max_by_key(|fee| fee.academic_year))
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
