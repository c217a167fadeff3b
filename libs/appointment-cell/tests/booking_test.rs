use std::time::Duration as StdDuration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::appointment_routes;
use shared_cache::CacheStore;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};
use shared_utils::AppState;

struct Fixture {
    server: MockServer,
    config: TestConfig,
    state: AppState,
    doctor_id: String,
    clinic_id: String,
    date: NaiveDate,
}

impl Fixture {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_supabase_url(server.uri());
        let state = config.to_state();
        Self {
            server,
            state,
            config,
            doctor_id: Uuid::new_v4().to_string(),
            clinic_id: Uuid::new_v4().to_string(),
            date: Utc::now().date_naive() + Duration::days(30),
        }
    }

    fn day(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn mount_doctor(&self, kyc_status: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("id", format!("eq.{}", self.doctor_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::doctor_response(&self.doctor_id, kyc_status)
            ])))
            .mount(&self.server)
            .await;
    }

    /// Verified doctor linked to the clinic with the standard template and
    /// the given booked start times.
    async fn mount_bookable(&self, booked: &[&str]) {
        self.mount_doctor("verified").await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/doctor_clinics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": Uuid::new_v4(),
                "doctor_id": self.doctor_id,
                "clinic_id": self.clinic_id,
                "consultation_fee": 500.0,
                "is_active": true
            }])))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/availability_templates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::template_response(&Uuid::new_v4().to_string(), &self.doctor_id, &self.clinic_id, 0)
            ])))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctor_leaves"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;

        let rows: Vec<Value> = booked.iter().map(|t| json!({ "appointment_time": t })).collect();
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("select", "appointment_time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(rows)))
            .mount(&self.server)
            .await;
    }

    async fn mount_history(&self, action: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointment_history"))
            .and(body_partial_json(json!({ "action": action })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": Uuid::new_v4(),
                "appointment_id": Uuid::new_v4(),
                "action": action,
                "previous_date": null,
                "previous_time": null,
                "new_date": null,
                "new_time": null,
                "actor_id": Uuid::new_v4(),
                "note": null,
                "created_at": "2026-01-01T00:00:00Z"
            }])))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    async fn mount_existing(&self, id: &str, patient_id: &str, status: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::appointment_response(
                    id, patient_id, &self.doctor_id, &self.clinic_id, &self.day(), "09:20:00", status
                )
            ])))
            .mount(&self.server)
            .await;
    }

    fn booking_body(&self, time: &str) -> Value {
        json!({
            "doctor_id": self.doctor_id,
            "clinic_id": self.clinic_id,
            "appointment_date": self.day(),
            "appointment_time": time,
            "reason": "Fever for three days"
        })
    }

    async fn call(&self, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = appointment_routes(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn patient_books_an_open_slot() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    fx.mount_bookable(&["09:00:00"]).await;
    fx.mount_history("booked", 1).await;

    let appointment_id = Uuid::new_v4().to_string();
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "patient_id": patient.id,
            "appointment_time": "09:20:00",
            "end_time": "09:35:00",
            "status": "scheduled"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id, &patient.id, &fx.doctor_id, &fx.clinic_id, &fx.day(), "09:20:00", "scheduled"
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.call(Method::POST, "/", &fx.token(&patient), Some(fx.booking_body("09:20:00"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], appointment_id);
    assert_eq!(body["status"], "scheduled");
}

#[tokio::test]
async fn booking_drops_the_cached_slot_view() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    fx.mount_bookable(&[]).await;
    fx.mount_history("booked", 1).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(), &patient.id, &fx.doctor_id, &fx.clinic_id, &fx.day(), "09:00:00", "scheduled"
            )
        ])))
        .mount(&fx.server)
        .await;

    let key = format!("slots:{}:{}:{}", fx.doctor_id, fx.clinic_id, fx.day());
    fx.state.cache.set(&key, "{}", StdDuration::from_secs(30)).await.unwrap();

    let (status, _) = fx.call(Method::POST, "/", &fx.token(&patient), Some(fx.booking_body("09:00:00"))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(fx.state.cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn booked_start_time_is_a_conflict() {
    let fx = Fixture::start().await;
    fx.mount_bookable(&["09:20:00"]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(Method::POST, "/", &fx.token(&TestUser::default()), Some(fx.booking_body("09:20:00")))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Slot already booked");
}

#[tokio::test]
async fn losing_the_insert_race_is_a_conflict() {
    let fx = Fixture::start().await;
    fx.mount_bookable(&[]).await;
    fx.mount_history("booked", 0).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "23505",
            "duplicate key value violates unique constraint \"appointments_one_scheduled_per_slot\"",
        )))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(Method::POST, "/", &fx.token(&TestUser::default()), Some(fx.booking_body("09:40:00")))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Slot already booked");
}

#[tokio::test]
async fn time_between_slots_is_rejected() {
    let fx = Fixture::start().await;
    fx.mount_bookable(&[]).await;

    let (status, _) = fx
        .call(Method::POST, "/", &fx.token(&TestUser::default()), Some(fx.booking_body("09:05:00")))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn past_dates_are_rejected_before_any_lookup() {
    let fx = Fixture::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let mut body = fx.booking_body("09:00:00");
    body["appointment_date"] = json!((Utc::now().date_naive() - Duration::days(2)).format("%Y-%m-%d").to_string());

    let (status, response) = fx.call(Method::POST, "/", &fx.token(&TestUser::default()), Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Appointment is in the past");
}

#[tokio::test]
async fn unverified_doctors_cannot_be_booked() {
    let fx = Fixture::start().await;
    fx.mount_doctor("submitted").await;

    let (status, _) = fx
        .call(Method::POST, "/", &fx.token(&TestUser::default()), Some(fx.booking_body("09:00:00")))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn staff_must_name_the_patient() {
    let fx = Fixture::start().await;

    let (status, body) = fx
        .call(Method::POST, "/", &fx.token(&TestUser::staff("+919800000002")), Some(fx.booking_body("09:00:00")))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["patient_id"].is_array());
}

#[tokio::test]
async fn patients_cannot_book_for_someone_else() {
    let fx = Fixture::start().await;
    let mut body = fx.booking_body("09:00:00");
    body["patient_id"] = json!(Uuid::new_v4());

    let (status, _) = fx.call(Method::POST, "/", &fx.token(&TestUser::default()), Some(body)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancelling_a_scheduled_appointment_logs_history() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    let id = Uuid::new_v4().to_string();
    fx.mount_existing(&id, &patient.id, "scheduled").await;
    fx.mount_history("cancelled", 1).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .and(body_partial_json(json!({ "status": "cancelled", "cancellation_reason": "Feeling better" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &id, &patient.id, &fx.doctor_id, &fx.clinic_id, &fx.day(), "09:20:00", "cancelled"
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(
            Method::POST,
            &format!("/{}/cancel", id),
            &fx.token(&patient),
            Some(json!({ "reason": "Feeling better" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn cancelling_twice_is_a_conflict() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    let id = Uuid::new_v4().to_string();
    fx.mount_existing(&id, &patient.id, "cancelled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let (status, _) = fx
        .call(Method::POST, &format!("/{}/cancel", id), &fx.token(&patient), Some(json!({})))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn patients_cannot_mark_their_own_visit_complete() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    let id = Uuid::new_v4().to_string();
    fx.mount_existing(&id, &patient.id, "scheduled").await;

    let (status, _) = fx.call(Method::POST, &format!("/{}/complete", id), &fx.token(&patient), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn treating_doctor_marks_no_show() {
    let fx = Fixture::start().await;
    let patient_id = Uuid::new_v4().to_string();
    let id = Uuid::new_v4().to_string();
    let doctor = TestUser::doctor("+919811111111").with_id(&fx.doctor_id);
    fx.mount_existing(&id, &patient_id, "scheduled").await;
    fx.mount_history("no_show", 1).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "no_show" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &id, &patient_id, &fx.doctor_id, &fx.clinic_id, &fx.day(), "09:20:00", "no_show"
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.call(Method::POST, &format!("/{}/no-show", id), &fx.token(&doctor), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_show");
}

#[tokio::test]
async fn strangers_cannot_read_an_appointment() {
    let fx = Fixture::start().await;
    let id = Uuid::new_v4().to_string();
    fx.mount_existing(&id, &Uuid::new_v4().to_string(), "scheduled").await;

    let (status, _) = fx.call(Method::GET, &format!("/{}", id), &fx.token(&TestUser::default()), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rescheduling_to_the_same_time_is_rejected() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    let id = Uuid::new_v4().to_string();
    fx.mount_existing(&id, &patient.id, "scheduled").await;

    let (status, body) = fx
        .call(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            &fx.token(&patient),
            Some(json!({ "appointment_date": fx.day(), "appointment_time": "09:20:00" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["appointment_time"].is_array());
}

#[tokio::test]
async fn rescheduling_moves_to_a_free_slot() {
    let fx = Fixture::start().await;
    let patient = TestUser::default();
    let id = Uuid::new_v4().to_string();
    fx.mount_existing(&id, &patient.id, "scheduled").await;
    fx.mount_bookable(&["09:20:00"]).await;
    fx.mount_history("rescheduled", 1).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "appointment_time": "18:00:00", "end_time": "18:15:00" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &id, &patient.id, &fx.doctor_id, &fx.clinic_id, &fx.day(), "18:00:00", "scheduled"
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            &fx.token(&patient),
            Some(json!({ "appointment_date": fx.day(), "appointment_time": "18:00:00" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment_time"], "18:00:00");
}
