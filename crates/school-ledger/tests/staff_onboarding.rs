//! Staff onboarding through the HTTP router: account and payroll row created together, the
//! account removed again when payroll fails, and the users table mirrored over the change feed.

mod common {
    use std::sync::{Arc, Mutex};

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use axum::response::Response;
    use serde_json::{json, Value};

    use school_ledger::staff::{
        NotifyError, PayrollEntry, PayrollLedger, StaffNotification, StaffNotifier,
        StaffStoreError,
    };
    use school_ledger::tuition::SchoolId;

    pub const SCHOOL: &str = "sch-bouake";

    #[derive(Default)]
    pub struct Inbox {
        pub delivered: Mutex<Vec<StaffNotification>>,
    }

    impl StaffNotifier for Inbox {
        fn notify(&self, notification: &StaffNotification) -> Result<(), NotifyError> {
            self.delivered
                .lock()
                .expect("inbox mutex poisoned")
                .push(notification.clone());
            Ok(())
        }
    }

    /// Payroll backend that is down.
    pub struct OfflinePayroll;

    impl PayrollLedger for OfflinePayroll {
        fn insert_payroll(&self, _entry: PayrollEntry) -> Result<PayrollEntry, StaffStoreError> {
            Err(StaffStoreError::Unavailable("payroll service offline".to_string()))
        }

        fn payrolls(&self, _school: &SchoolId) -> Result<Vec<PayrollEntry>, StaffStoreError> {
            Ok(Vec::new())
        }
    }

    pub fn onboarding_body(email: &str) -> Value {
        json!({
            "email": email,
            "password": "secret42",
            "password_confirmation": "secret42",
            "first_name": "Awa",
            "last_name": "Koné",
            "role": "teacher",
            "position": "Professeur de mathématiques",
            "base_salary": 185000,
            "start_date": "2025-09-15"
        })
    }

    pub fn post_staff(role: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/staff")
            .header("x-school-id", SCHOOL)
            .header("x-user-role", role)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
            .expect("request")
    }

    pub async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    pub fn shared<T>(value: T) -> Arc<T> {
        Arc::new(value)
    }
}

use std::sync::Arc;

use axum::http::StatusCode;
use tower::ServiceExt;

use common::*;
use school_ledger::realtime::{CacheUpdate, ChangeFeed, RowFilter, Table, TableCache};
use school_ledger::staff::{staff_router, InMemoryStaffStore, StaffOnboardingService, UserAccount};
use school_ledger::tuition::SchoolId;

#[tokio::test]
async fn hr_onboards_a_teacher_with_payroll() {
    let feed = ChangeFeed::new(32);
    let store = InMemoryStaffStore::with_feed(feed.clone());
    let inbox = shared(Inbox::default());
    let service = Arc::new(StaffOnboardingService::new(
        shared(store.clone()),
        shared(store.clone()),
        Arc::clone(&inbox),
    ));
    let mut users = feed.subscribe(Table::Users, RowFilter::school(SchoolId::from(SCHOOL)));
    let mut payrolls = feed.subscribe(Table::Payrolls, RowFilter::default());

    let response = staff_router(service)
        .oneshot(post_staff("hr", onboarding_body("Awa.Kone@Ecole.ci")))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::CREATED);
    let outcome = json_body(response).await;
    assert_eq!(outcome["user"]["email"], "awa.kone@ecole.ci");
    assert_eq!(outcome["payroll"]["base_salary"], 185_000);
    assert_eq!(outcome["payroll"]["position"], "Professeur de mathématiques");
    assert!(outcome["warnings"].as_array().expect("warnings").is_empty());
    assert!(outcome["user"].get("password").is_none());

    let mut cache: TableCache<UserAccount> = TableCache::default();
    assert_eq!(cache.drain(&mut users), vec![CacheUpdate::Inserted]);
    assert!(payrolls.try_next().is_some());

    let delivered = inbox.delivered.lock().expect("inbox mutex poisoned");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "Bienvenue");
    assert!(delivered[0].message.contains("15/09/2025"));
}

#[tokio::test]
async fn payroll_failure_removes_the_new_account() {
    let feed = ChangeFeed::new(32);
    let store = InMemoryStaffStore::with_feed(feed.clone());
    let service = Arc::new(StaffOnboardingService::new(
        shared(store.clone()),
        shared(OfflinePayroll),
        shared(Inbox::default()),
    ));
    let mut users = feed.subscribe(Table::Users, RowFilter::default());

    let response = staff_router(service)
        .oneshot(post_staff("admin", onboarding_body("awa@ecole.ci")))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = json_body(response).await;
    assert_eq!(payload["compensated"], true);

    assert!(store
        .users(&SchoolId::from(SCHOOL))
        .expect("users readable")
        .is_empty());

    // The mirror sees the insert and then the compensating delete.
    let mut cache: TableCache<UserAccount> = TableCache::default();
    assert_eq!(
        cache.drain(&mut users),
        vec![CacheUpdate::Inserted, CacheUpdate::Removed]
    );
    assert!(cache.is_empty());
}

#[tokio::test]
async fn onboarding_rejects_bad_requests() {
    let store = InMemoryStaffStore::default();
    let service = Arc::new(StaffOnboardingService::new(
        shared(store.clone()),
        shared(store),
        shared(Inbox::default()),
    ));
    let app = staff_router(service);

    let mut mismatched = onboarding_body("awa@ecole.ci");
    mismatched["password_confirmation"] = "secret43".into();
    let response = app
        .clone()
        .oneshot(post_staff("hr", mismatched))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .clone()
        .oneshot(post_staff("accountant", onboarding_body("awa@ecole.ci")))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let first = app
        .clone()
        .oneshot(post_staff("hr", onboarding_body("awa@ecole.ci")))
        .await
        .expect("router dispatch");
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = app
        .oneshot(post_staff("hr", onboarding_body("AWA@ecole.ci")))
        .await
        .expect("router dispatch");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}
