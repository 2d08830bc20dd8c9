use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;
use crate::clock::{Clock, ManualClock};
use crate::eligibility::EligibilityCriteria;
use crate::ledger::{ResourceLedger, VacancyStore};
use crate::offerings::{Offering, OfferingKind, OfferingLocation, ProviderInfo};
use crate::storage::{InMemoryApplicationRepository, InMemoryOfferingStore};

struct Fixture {
    offerings: InMemoryOfferingStore,
    repository: InMemoryApplicationRepository,
    service: Arc<ApplicationService>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).single().expect("valid"),
    ));
    let offerings = InMemoryOfferingStore::with_offerings([Offering {
        id: "job-7".to_string(),
        kind: OfferingKind::Job,
        name: "Warehouse associate".to_string(),
        description: String::new(),
        provider: ProviderInfo {
            id: "prov-7".to_string(),
            name: "Northwind".to_string(),
            industry: None,
        },
        location: OfferingLocation::default(),
        job_type: None,
        salary: None,
        vacancies: 3,
        eligibility: EligibilityCriteria::default(),
    }]);
    let repository = InMemoryApplicationRepository::default();

    // one vacancy is held by the application seeded below
    offerings.decrement_if_positive("job-7").expect("seed reservation");
    let now = clock.now();
    repository
        .insert(ApplicationRecord {
            id: ApplicationId("app-1".to_string()),
            offering_id: "job-7".to_string(),
            transaction_id: "txn-7".to_string(),
            applicant: ApplicantSnapshot {
                name: "Ravi".to_string(),
                ..ApplicantSnapshot::default()
            },
            status: ApplicationStatus::ApplicationAccepted,
            created_at: now,
            updated_at: now,
        })
        .expect("seed application");

    let service = Arc::new(ApplicationService::new(
        Arc::new(repository.clone()),
        ResourceLedger::new(Arc::new(offerings.clone())),
        clock,
    ));
    Fixture {
        offerings,
        repository,
        service,
    }
}

fn app() -> ApplicationId {
    ApplicationId("app-1".to_string())
}

#[test]
fn progressing_an_application_keeps_the_vacancy() {
    let fixture = fixture();
    let update = fixture
        .service
        .update_status(&app(), ApplicationStatus::AssessmentInProgress)
        .expect("valid transition");

    assert_eq!(update.previous, ApplicationStatus::ApplicationAccepted);
    assert_eq!(update.record.status, ApplicationStatus::AssessmentInProgress);
    assert!(!update.vacancy_released);
    assert_eq!(fixture.offerings.available("job-7").expect("known"), 2);
}

#[test]
fn cancelling_returns_the_vacancy() {
    let fixture = fixture();
    let update = fixture.service.cancel(&app()).expect("cancelled");

    assert!(update.vacancy_released);
    assert_eq!(fixture.offerings.available("job-7").expect("known"), 3);

    let again = fixture.service.cancel(&app()).expect_err("already cancelled");
    assert!(matches!(
        again,
        ApplicationServiceError::Repository(RepositoryError::InvalidTransition {
            from: ApplicationStatus::Cancelled,
            ..
        })
    ));
    assert_eq!(fixture.offerings.available("job-7").expect("known"), 3);
}

#[test]
fn unknown_application_is_not_found() {
    let fixture = fixture();
    let err = fixture
        .service
        .get(&ApplicationId("missing".to_string()))
        .expect_err("no record");
    assert!(matches!(
        err,
        ApplicationServiceError::Repository(RepositoryError::NotFound)
    ));
}

async fn call(service: Arc<ApplicationService>, request: Request<Body>) -> (StatusCode, Value) {
    let response = application_router(service)
        .oneshot(request)
        .await
        .expect("route executes");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn put_status(id: &str, status: &str) -> Request<Body> {
    Request::put(format!("/api/v1/applications/{id}/status"))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": status }).to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn get_returns_the_application_view() {
    let fixture = fixture();
    let (status, body) = call(
        fixture.service.clone(),
        Request::get("/api/v1/applications/app-1")
            .body(Body::empty())
            .expect("request builds"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application_id"], "app-1");
    assert_eq!(body["applicant_name"], "Ravi");
    assert_eq!(body["status"], "APPLICATION_ACCEPTED");

    let (status, _) = call(
        fixture.service,
        Request::get("/api/v1/applications/nope")
            .body(Body::empty())
            .expect("request builds"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_route_applies_transitions_and_reports_conflicts() {
    let fixture = fixture();

    let (status, body) = call(fixture.service.clone(), put_status("app-1", "CANCELLED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous_status"], "APPLICATION_ACCEPTED");
    assert_eq!(body["vacancy_released"], true);

    let (status, body) = call(fixture.service.clone(), put_status("app-1", "OFFER_EXTENDED")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().is_some());

    let stored = fixture
        .repository
        .fetch(&app())
        .expect("readable")
        .expect("present");
    assert_eq!(stored.status, ApplicationStatus::Cancelled);
}

#[tokio::test]
async fn unknown_status_value_is_unprocessable() {
    let fixture = fixture();
    let (status, _) = call(fixture.service, put_status("app-1", "HIRED")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
