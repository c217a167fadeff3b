use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, User};

use crate::jwt::{issue_token, TokenSubject, TOKEN_AUDIENCE};
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    /// Router state over an in-process cache.
    pub fn to_state(&self) -> AppState {
        AppState::in_memory(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub phone: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("+919800000000")
    }
}

impl TestUser {
    pub fn new(phone: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            phone: phone.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn patient(phone: &str) -> Self {
        Self::new(phone, "patient")
    }

    pub fn doctor(phone: &str) -> Self {
        Self::new(phone, "doctor")
    }

    pub fn staff(phone: &str) -> Self {
        Self::new(phone, "staff")
    }

    pub fn admin(phone: &str) -> Self {
        Self::new(phone, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            phone: Some(self.phone.clone()),
            email: None,
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let subject = TokenSubject {
            user_id: &user.id,
            role: &user.role,
            phone: Some(&user.phone),
            email: None,
        };
        issue_token(&subject, secret, Duration::hours(exp_hours.unwrap_or(24)))
            .expect("test token should sign")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_wrong_audience_token(user: &TestUser, secret: &str) -> String {
        let claims = JwtClaims {
            sub: user.id.clone(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as u64,
            iat: None,
            role: Some(user.role.clone()),
            phone: Some(user.phone.clone()),
            email: None,
            aud: Some(format!("not-{}", TOKEN_AUDIENCE)),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("test token should sign")
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock-backed tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(id: &str, phone: &str) -> Value {
        json!({
            "id": id,
            "full_name": "Asha Rao",
            "phone": phone,
            "email": null,
            "date_of_birth": "1990-04-12",
            "gender": "female",
            "address": null,
            "pincode": "560001",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(id: &str, kyc_status: &str) -> Value {
        json!({
            "id": id,
            "full_name": "Dr. Meera Iyer",
            "phone": "+919811111111",
            "email": "meera@example.com",
            "specialization": "General Medicine",
            "qualification": "MBBS, MD",
            "registration_number": "KMC-1234",
            "experience_years": 9,
            "kyc_status": kyc_status,
            "kyc_documents": [],
            "kyc_rejection_reason": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn clinic_response(id: &str) -> Value {
        json!({
            "id": id,
            "name": "Indiranagar Family Clinic",
            "address": "12 CMH Road",
            "city": "Bengaluru",
            "pincode": "560038",
            "phone": "+918022222222",
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn template_response(id: &str, doctor_id: &str, clinic_id: &str, day_of_week: i32) -> Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "clinic_id": clinic_id,
            "day_of_week": day_of_week,
            "morning_start": "09:00:00",
            "morning_end": "10:00:00",
            "afternoon_start": null,
            "afternoon_end": null,
            "evening_start": "18:00:00",
            "evening_end": "19:00:00",
            "night_start": null,
            "night_end": null,
            "slot_duration_minutes": 15,
            "buffer_minutes": 5,
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        id: &str,
        patient_id: &str,
        doctor_id: &str,
        clinic_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "clinic_id": clinic_id,
            "appointment_date": date,
            "appointment_time": time,
            "end_time": null,
            "status": status,
            "reason": null,
            "cancellation_reason": null,
            "created_by": patient_id,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn error_response(code: &str, message: &str) -> Value {
        json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null
        })
    }
}
