use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lab_cell::lab_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

const PINCODE: &str = "560001";

struct Fixture {
    server: MockServer,
    config: TestConfig,
    patient: TestUser,
    alpha: Uuid,
    beta: Uuid,
    cbc: Uuid,
    lipid: Uuid,
}

fn lab_json(id: Uuid, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "address": "12 MG Road",
        "phone": "+918012345678",
        "serviceable_pincodes": [PINCODE],
        "is_active": true
    })
}

fn mapping_json(lab_id: Uuid, test_id: Uuid, price: f64) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "lab_id": lab_id,
        "test_id": test_id,
        "price": price,
        "turnaround_hours": 24,
        "is_available": true
    })
}

fn group_json(id: &str, patient_id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "patient_id": patient_id,
        "prescription_id": null,
        "pincode": PINCODE,
        "collection_address": "Flat 4, Indiranagar",
        "allocation_mode": "single_lab",
        "total_price": 900.0,
        "status": status,
        "created_at": "2026-11-02T04:00:00Z"
    })
}

impl Fixture {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_supabase_url(server.uri());
        Self {
            server,
            config,
            patient: TestUser::patient("+919800000001"),
            alpha: Uuid::from_u128(1),
            beta: Uuid::from_u128(2),
            cbc: Uuid::new_v4(),
            lipid: Uuid::new_v4(),
        }
    }

    fn router(&self) -> Router {
        lab_routes(self.config.to_state())
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn mount_offers(&self, mappings: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/labs"))
            .and(query_param("serviceable_pincodes", format!("cs.{{{}}}", PINCODE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                lab_json(self.alpha, "Alpha Diagnostics"),
                lab_json(self.beta, "Beta Labs")
            ])))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/lab_test_mappings"))
            .and(query_param("is_available", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mappings))
            .mount(&self.server)
            .await;
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn test_catalog_is_public() {
    let fx = Fixture::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": fx.cbc,
            "code": "CBC",
            "name": "Complete Blood Count",
            "sample_type": "blood",
            "description": null
        }])))
        .mount(&fx.server)
        .await;

    let (status, body) = fx.call(Method::GET, "/tests?search=blood", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["tests"][0]["code"], "CBC");
}

#[tokio::test]
async fn preview_prefers_a_single_lab() {
    let fx = Fixture::start().await;
    fx.mount_offers(json!([
        mapping_json(fx.alpha, fx.cbc, 300.0),
        mapping_json(fx.alpha, fx.lipid, 600.0),
        mapping_json(fx.beta, fx.cbc, 250.0)
    ]))
    .await;

    let (status, body) = fx
        .call(
            Method::POST,
            "/allocations/preview",
            Some(&fx.token(&fx.patient)),
            Some(json!({ "test_ids": [fx.cbc, fx.lipid, fx.cbc], "pincode": PINCODE })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "single_lab");
    assert_eq!(body["total_price"], 900.0);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn preview_splits_when_no_lab_has_everything() {
    let fx = Fixture::start().await;
    fx.mount_offers(json!([
        mapping_json(fx.alpha, fx.cbc, 300.0),
        mapping_json(fx.beta, fx.lipid, 600.0)
    ]))
    .await;

    let (status, body) = fx
        .call(
            Method::POST,
            "/allocations/preview",
            Some(&fx.token(&fx.patient)),
            Some(json!({ "test_ids": [fx.cbc, fx.lipid], "pincode": PINCODE })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "multi_lab");
    assert_eq!(body["items"][0]["lab_name"], "Alpha Diagnostics");
    assert_eq!(body["items"][1]["lab_name"], "Beta Labs");
}

#[tokio::test]
async fn unserved_tests_are_not_found() {
    let fx = Fixture::start().await;
    fx.mount_offers(json!([mapping_json(fx.alpha, fx.cbc, 300.0)])).await;

    let (status, body) = fx
        .call(
            Method::POST,
            "/allocations/preview",
            Some(&fx.token(&fx.patient)),
            Some(json!({ "test_ids": [fx.cbc, fx.lipid], "pincode": PINCODE })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains(&fx.lipid.to_string()));
}

#[tokio::test]
async fn preview_validates_input() {
    let fx = Fixture::start().await;

    let (status, body) = fx
        .call(
            Method::POST,
            "/allocations/preview",
            Some(&fx.token(&fx.patient)),
            Some(json!({ "test_ids": [], "pincode": "12" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["test_ids"].is_array());
    assert!(body["fields"]["pincode"].is_array());
}

#[tokio::test]
async fn booking_persists_a_group_and_one_booking_per_test() {
    let fx = Fixture::start().await;
    fx.mount_offers(json!([
        mapping_json(fx.alpha, fx.cbc, 300.0),
        mapping_json(fx.alpha, fx.lipid, 600.0)
    ]))
    .await;
    let group_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_booking_groups"))
        .and(body_partial_json(json!({
            "patient_id": fx.patient.id,
            "allocation_mode": "single_lab",
            "total_price": 900.0
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            group_json(&group_id, &fx.patient.id, "booked")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "id": Uuid::new_v4(), "group_id": group_id, "lab_id": fx.alpha, "test_id": fx.cbc,
              "price": 300.0, "status": "booked", "created_at": "2026-11-02T04:00:00Z" },
            { "id": Uuid::new_v4(), "group_id": group_id, "lab_id": fx.alpha, "test_id": fx.lipid,
              "price": 600.0, "status": "booked", "created_at": "2026-11-02T04:00:00Z" }
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(
            Method::POST,
            "/bookings",
            Some(&fx.token(&fx.patient)),
            Some(json!({
                "test_ids": [fx.cbc, fx.lipid],
                "pincode": PINCODE,
                "collection_address": "Flat 4, Indiranagar"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], group_id);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn booking_from_a_prescription_uses_its_tests() {
    let fx = Fixture::start().await;
    let prescription_id = Uuid::new_v4();
    fx.mount_offers(json!([mapping_json(fx.beta, fx.lipid, 550.0)])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("id", format!("eq.{}", prescription_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "patient_id": fx.patient.id,
            "recommended_test_ids": [fx.lipid]
        }])))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_booking_groups"))
        .and(body_partial_json(json!({ "prescription_id": prescription_id, "total_price": 550.0 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            group_json(&Uuid::new_v4().to_string(), &fx.patient.id, "booked")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let (status, _) = fx
        .call(
            Method::POST,
            "/bookings",
            Some(&fx.token(&fx.patient)),
            Some(json!({
                "prescription_id": prescription_id,
                "pincode": PINCODE,
                "collection_address": "Flat 4, Indiranagar"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cancelling_a_cancelled_group_conflicts() {
    let fx = Fixture::start().await;
    let group_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_booking_groups"))
        .and(query_param("id", format!("eq.{}", group_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_json(&group_id, &fx.patient.id, "cancelled")
        ])))
        .mount(&fx.server)
        .await;

    let (status, _) = fx
        .call(Method::POST, &format!("/bookings/{}/cancel", group_id), Some(&fx.token(&fx.patient)), None)
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_cascades_to_bookings() {
    let fx = Fixture::start().await;
    let group_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_booking_groups"))
        .and(query_param("id", format!("eq.{}", group_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_json(&group_id, &fx.patient.id, "booked")
        ])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/lab_booking_groups"))
        .and(query_param("status", "eq.booked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_json(&group_id, &fx.patient.id, "cancelled")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/lab_bookings"))
        .and(query_param("group_id", format!("eq.{}", group_id)))
        .and(query_param("status", "eq.booked"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "group_id": group_id, "lab_id": fx.alpha, "test_id": fx.cbc,
              "price": 300.0, "status": "cancelled", "created_at": "2026-11-02T04:00:00Z" }
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(Method::POST, &format!("/bookings/{}/cancel", group_id), Some(&fx.token(&fx.patient)), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["bookings"][0]["status"], "cancelled");
}

#[tokio::test]
async fn other_patients_cannot_see_a_group() {
    let fx = Fixture::start().await;
    let group_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_booking_groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_json(&group_id, &Uuid::new_v4().to_string(), "booked")
        ])))
        .mount(&fx.server)
        .await;

    let (status, _) = fx
        .call(Method::GET, &format!("/bookings/{}", group_id), Some(&fx.token(&fx.patient)), None)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_admins_add_labs() {
    let fx = Fixture::start().await;
    let request = json!({
        "name": "Gamma Pathology",
        "address": "3 Residency Road",
        "phone": "+91 80 1234 5678",
        "serviceable_pincodes": [PINCODE, PINCODE]
    });

    let staff = TestUser::staff("+919800000002");
    let (status, _) = fx.call(Method::POST, "/", Some(&fx.token(&staff)), Some(request.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Mock::given(method("POST"))
        .and(path("/rest/v1/labs"))
        .and(body_partial_json(json!({ "phone": "+918012345678", "serviceable_pincodes": [PINCODE] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([lab_json(Uuid::new_v4(), "Gamma Pathology")])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let admin = TestUser::admin("+919800000003");
    let (status, body) = fx.call(Method::POST, "/", Some(&fx.token(&admin)), Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Gamma Pathology");
}

#[tokio::test]
async fn a_lab_offers_each_test_once() {
    let fx = Fixture::start().await;
    let admin = TestUser::admin("+919800000003");

    Mock::given(method("GET"))
        .and(path("/rest/v1/labs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([lab_json(fx.alpha, "Alpha Diagnostics")])))
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": fx.cbc, "code": "CBC", "name": "Complete Blood Count", "sample_type": "blood", "description": null
        }])))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_test_mappings"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("23505", "duplicate key value violates unique constraint"),
        ))
        .mount(&fx.server)
        .await;

    let (status, _) = fx
        .call(
            Method::POST,
            &format!("/{}/tests", fx.alpha),
            Some(&fx.token(&admin)),
            Some(json!({ "test_id": fx.cbc, "price": 300.0, "turnaround_hours": 24 })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_leaves_collected_and_completed_bookings_alone() {
    let fx = Fixture::start().await;
    let group_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_booking_groups"))
        .and(query_param("id", format!("eq.{}", group_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_json(&group_id, &fx.patient.id, "booked")
        ])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/lab_booking_groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_json(&group_id, &fx.patient.id, "cancelled")
        ])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/lab_bookings"))
        .and(query_param("status", "eq.booked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx
        .call(Method::POST, &format!("/bookings/{}/cancel", group_id), Some(&fx.token(&fx.patient)), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 0);

    let requests = fx.server.received_requests().await.unwrap();
    let cascade = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/lab_bookings")
        .unwrap();
    assert!(cascade.url.query().unwrap_or_default().contains("status=eq.booked"));
}
