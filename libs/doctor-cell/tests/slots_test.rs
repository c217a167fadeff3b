use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::SlotStatus;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::SlotService;
use shared_cache::{CacheStore, MemoryCache};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};
use shared_utils::AppState;

const DOCTOR: &str = "3b7d0f7e-2c43-4a53-9a51-1c2b3d4e5f60";
const CLINIC: &str = "8e2f9c1a-5b6d-4e7f-8a9b-0c1d2e3f4a5b";
// A Monday.
const DATE: &str = "2026-11-02";

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::parse_from_str(DATE, "%Y-%m-%d").unwrap()
}

async fn mount_template(server: &MockServer, rows: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .and(query_param("doctor_id", format!("eq.{}", DOCTOR)))
        .and(query_param("day_of_week", "eq.0"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_leaves(server: &MockServer, rows: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_leaves"))
        .and(query_param("start_date", format!("lte.{}", DATE)))
        .and(query_param("end_date", format!("gte.{}", DATE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_bookings(server: &MockServer, rows: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_date", format!("eq.{}", DATE)))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .expect(times)
        .mount(server)
        .await;
}

fn template() -> Value {
    json!([MockSupabaseResponses::template_response(&Uuid::new_v4().to_string(), DOCTOR, CLINIC, 0)])
}

async fn get_slots(state: AppState, token: &str) -> (StatusCode, Value) {
    let response = doctor_routes(state)
        .oneshot(
            Request::builder()
                .uri(format!("/{}/clinics/{}/slots?date={}", DOCTOR, CLINIC, DATE))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn slot_view_marks_the_booked_start_and_is_cached() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let state = config.to_state();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, Some(1));

    mount_template(&server, template(), 1).await;
    mount_leaves(&server, json!([]), 1).await;
    mount_bookings(&server, json!([{ "appointment_time": "09:20:00" }]), 1).await;

    let (status, first) = get_slots(state.clone(), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["on_leave"], false);

    let slots = first["slots"].as_array().unwrap();
    // 09:00-10:00 and 18:00-19:00, 15 minute slots with a 5 minute buffer.
    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0]["start_time"], "09:00:00");
    assert_eq!(slots[0]["end_time"], "09:15:00");
    assert_eq!(slots[0]["session"], "morning");
    assert_eq!(slots[3]["session"], "evening");
    let unavailable: Vec<&Value> = slots.iter().filter(|s| s["available"] == false).collect();
    assert_eq!(unavailable.len(), 1);
    assert_eq!(unavailable[0]["start_time"], "09:20:00");

    let (_, second) = get_slots(state, &token).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn leave_makes_every_slot_unavailable() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, Some(1));

    mount_template(&server, template(), 1).await;
    mount_leaves(
        &server,
        json!([{
            "id": Uuid::new_v4(),
            "doctor_id": DOCTOR,
            "clinic_id": CLINIC,
            "start_date": "2026-11-01",
            "end_date": "2026-11-03",
            "reason": "Conference"
        }]),
        1,
    )
    .await;
    mount_bookings(&server, json!([]), 0).await;

    let (status, body) = get_slots(config.to_state(), &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["on_leave"], true);
    assert!(body["slots"].as_array().unwrap().iter().all(|s| s["available"] == false));
}

#[tokio::test]
async fn no_template_means_no_slots() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, Some(1));

    mount_template(&server, json!([]), 1).await;
    mount_leaves(&server, json!([]), 0).await;

    let (status, body) = get_slots(config.to_state(), &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slots"], json!([]));
}

#[tokio::test]
async fn slots_require_a_token() {
    let config = TestConfig::default();
    let response = doctor_routes(config.to_state())
        .oneshot(
            Request::builder()
                .uri(format!("/{}/clinics/{}/slots?date={}", DOCTOR, CLINIC, DATE))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalidation_forces_a_fresh_read() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    let cache = Arc::new(MemoryCache::new());
    let service = SlotService::new(&config, cache.clone());
    let (doctor, clinic) = (Uuid::parse_str(DOCTOR).unwrap(), Uuid::parse_str(CLINIC).unwrap());

    mount_template(&server, template(), 2).await;
    mount_leaves(&server, json!([]), 2).await;
    mount_bookings(&server, json!([]), 2).await;

    service.slot_view(doctor, clinic, date(), "token").await.unwrap();
    service.slot_view(doctor, clinic, date(), "token").await.unwrap();
    assert!(cache.get(&format!("slots:{}:{}:{}", DOCTOR, CLINIC, DATE)).await.unwrap().is_some());

    service.invalidate(doctor, clinic, date()).await;
    service.slot_view(doctor, clinic, date(), "token").await.unwrap();
}

#[tokio::test]
async fn single_start_times_are_checked_fresh() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    let service = SlotService::new(&config, Arc::new(MemoryCache::new()));
    let (doctor, clinic) = (Uuid::parse_str(DOCTOR).unwrap(), Uuid::parse_str(CLINIC).unwrap());

    mount_template(&server, template(), 3).await;
    mount_leaves(&server, json!([]), 3).await;
    mount_bookings(&server, json!([{ "appointment_time": "09:20:00" }]), 3).await;

    assert_eq!(
        service.slot_status(doctor, clinic, date(), t(9, 0), "token").await.unwrap(),
        SlotStatus::Available { end_time: t(9, 15) }
    );
    assert_eq!(
        service.slot_status(doctor, clinic, date(), t(9, 20), "token").await.unwrap(),
        SlotStatus::Booked
    );
    assert_eq!(
        service.slot_status(doctor, clinic, date(), t(9, 5), "token").await.unwrap(),
        SlotStatus::NotASlot
    );
}
