use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::FieldErrors;
use shared_utils::validators::{is_valid_phone, is_valid_pincode, normalize_phone};

use crate::models::{
    AddLabTestRequest, Allocation, AllocationRequest, BookLabTestsRequest, BookingGroup, BookingGroupDetails,
    BookingGroupStatus, CreateLabRequest, Lab, LabBooking, LabBookingStatus, LabError, LabTest, LabTestMapping,
    LabTestQuery,
};
use crate::services::allocator::{allocate, unique_tests};

#[derive(Debug, Deserialize)]
struct PrescribedTests {
    patient_id: Uuid,
    #[serde(default)]
    recommended_test_ids: Vec<Uuid>,
}

fn id_list(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

fn ensure_admin(user: &User) -> Result<(), LabError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(LabError::Unauthorized)
    }
}

fn ensure_can_view(group: &BookingGroup, user: &User) -> Result<(), LabError> {
    if user.is_self(&group.patient_id) || user.is_staff_or_admin() {
        Ok(())
    } else {
        Err(LabError::Unauthorized)
    }
}

pub struct LabService {
    supabase: SupabaseClient,
}

impl LabService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    // ==========================================================================
    // CATALOG
    // ==========================================================================

    pub async fn list_tests(&self, query: LabTestQuery, auth_token: Option<&str>) -> Result<Vec<LabTest>, LabError> {
        let mut parts = Vec::new();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = filter_value(&format!("*{}*", search));
            parts.push(format!("or=(name.ilike.{0},code.ilike.{0})", pattern));
        }
        parts.push("order=name.asc".to_string());

        Ok(self.supabase.select("lab_tests", &parts.join("&"), auth_token).await?)
    }

    pub async fn create_lab(&self, request: CreateLabRequest, user: &User, auth_token: &str) -> Result<Lab, LabError> {
        ensure_admin(user)?;

        let phone = normalize_phone(&request.phone);
        let mut errors = FieldErrors::new();
        errors.require_text("name", &request.name);
        errors.require_text("address", &request.address);
        errors.check(is_valid_phone(&phone), "phone", "Enter a valid phone number");
        errors.check(!request.serviceable_pincodes.is_empty(), "serviceable_pincodes", "Add at least one pincode");
        errors.check(
            request.serviceable_pincodes.iter().all(|p| is_valid_pincode(p)),
            "serviceable_pincodes",
            "Every pincode must be a valid 6 digit pincode",
        );
        errors.into_result()?;

        let mut pincodes = request.serviceable_pincodes.clone();
        pincodes.sort();
        pincodes.dedup();

        let row = json!({
            "id": Uuid::new_v4(),
            "name": request.name.trim(),
            "address": request.address.trim(),
            "phone": phone,
            "serviceable_pincodes": pincodes,
            "is_active": true
        });

        let lab: Lab = self.supabase.insert("labs", Some(auth_token), row).await?;
        info!("Lab {} created serving {} pincodes", lab.id, lab.serviceable_pincodes.len());
        Ok(lab)
    }

    pub async fn add_test(
        &self,
        lab_id: Uuid,
        request: AddLabTestRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<LabTestMapping, LabError> {
        ensure_admin(user)?;

        let mut errors = FieldErrors::new();
        errors.check(request.price.is_finite() && request.price >= 0.0, "price", "Price cannot be negative");
        errors.check(request.turnaround_hours > 0, "turnaround_hours", "Turnaround must be at least one hour");
        errors.into_result()?;

        let lab: Option<Lab> = self
            .supabase
            .select_one("labs", &format!("id=eq.{}", lab_id), Some(auth_token))
            .await?;
        lab.ok_or(LabError::LabNotFound)?;

        let test: Option<LabTest> = self
            .supabase
            .select_one("lab_tests", &format!("id=eq.{}", request.test_id), Some(auth_token))
            .await?;
        test.ok_or(LabError::TestNotFound)?;

        let row = json!({
            "id": Uuid::new_v4(),
            "lab_id": lab_id,
            "test_id": request.test_id,
            "price": request.price,
            "turnaround_hours": request.turnaround_hours,
            "is_available": true
        });

        let mapping: LabTestMapping = self
            .supabase
            .insert("lab_test_mappings", Some(auth_token), row)
            .await
            .map_err(|e| if e.is_conflict() { LabError::DuplicateMapping } else { e.into() })?;

        info!("Lab {} now offers test {}", lab_id, mapping.test_id);
        Ok(mapping)
    }

    // ==========================================================================
    // ALLOCATION
    // ==========================================================================

    /// Labs serving `pincode` and their live offerings for `tests`.
    async fn offers(&self, pincode: &str, tests: &[Uuid], auth_token: &str) -> Result<(Vec<Lab>, Vec<LabTestMapping>), LabError> {
        let contains = filter_value(&format!("{{{}}}", pincode));
        let labs: Vec<Lab> = self
            .supabase
            .select("labs", &format!("is_active=eq.true&serviceable_pincodes=cs.{}", contains), Some(auth_token))
            .await?;
        if labs.is_empty() {
            return Ok((labs, Vec::new()));
        }

        let lab_ids: Vec<Uuid> = labs.iter().map(|l| l.id).collect();
        let query = format!(
            "is_available=eq.true&lab_id=in.({})&test_id=in.({})",
            id_list(&lab_ids),
            id_list(tests)
        );
        let mappings = self.supabase.select("lab_test_mappings", &query, Some(auth_token)).await?;
        Ok((labs, mappings))
    }

    async fn allocation_for(&self, tests: &[Uuid], pincode: &str, auth_token: &str) -> Result<Allocation, LabError> {
        let mut errors = FieldErrors::new();
        errors.check(!tests.is_empty(), "test_ids", "Select at least one test");
        errors.check(is_valid_pincode(pincode), "pincode", "Enter a valid 6 digit pincode");
        errors.into_result()?;

        let tests = unique_tests(tests);
        let (labs, mappings) = self.offers(pincode, &tests, auth_token).await?;
        debug!("{} labs serve {} with {} matching offers", labs.len(), pincode, mappings.len());

        allocate(&tests, &labs, &mappings).inspect_err(|e| warn!("Allocation failed for {}: {}", pincode, e))
    }

    pub async fn preview_allocation(&self, request: AllocationRequest, auth_token: &str) -> Result<Allocation, LabError> {
        self.allocation_for(&request.test_ids, &request.pincode, auth_token).await
    }

    // ==========================================================================
    // BOOKINGS
    // ==========================================================================

    fn resolve_patient(&self, requested: Option<Uuid>, user: &User) -> Result<Uuid, LabError> {
        if user.has_role(Role::Patient) {
            let own = Uuid::parse_str(&user.id).map_err(|_| LabError::Unauthorized)?;
            return match requested {
                Some(id) if id != own => Err(LabError::Unauthorized),
                _ => Ok(own),
            };
        }
        if user.is_staff_or_admin() {
            let mut errors = FieldErrors::new();
            errors.check(requested.is_some(), "patient_id", "Choose the patient to book for");
            errors.into_result()?;
            return requested.ok_or(LabError::Unauthorized);
        }
        Err(LabError::Unauthorized)
    }

    #[instrument(skip(self, request, user, auth_token), fields(user_id = %user.id))]
    pub async fn book_tests(
        &self,
        request: BookLabTestsRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<BookingGroupDetails, LabError> {
        let patient_id = self.resolve_patient(request.patient_id, user)?;

        let mut errors = FieldErrors::new();
        errors.require_text("collection_address", &request.collection_address);
        errors.into_result()?;

        let mut tests = request.test_ids.clone();
        if let Some(prescription_id) = request.prescription_id {
            let prescribed: PrescribedTests = self
                .supabase
                .select_one(
                    "prescriptions",
                    &format!("id=eq.{}&select=patient_id,recommended_test_ids", prescription_id),
                    Some(auth_token),
                )
                .await?
                .ok_or(LabError::PrescriptionNotFound)?;
            if prescribed.patient_id != patient_id {
                return Err(LabError::Unauthorized);
            }
            if tests.is_empty() {
                tests = prescribed.recommended_test_ids;
            }
        }

        let allocation = self.allocation_for(&tests, &request.pincode, auth_token).await?;

        let group_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let group_row = json!({
            "id": group_id,
            "patient_id": patient_id,
            "prescription_id": request.prescription_id,
            "pincode": request.pincode,
            "collection_address": request.collection_address.trim(),
            "allocation_mode": allocation.mode,
            "total_price": allocation.total_price,
            "status": BookingGroupStatus::Booked,
            "created_at": now
        });
        let group: BookingGroup = self.supabase.insert("lab_booking_groups", Some(auth_token), group_row).await?;

        let rows = allocation
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": Uuid::new_v4(),
                    "group_id": group_id,
                    "lab_id": item.lab_id,
                    "test_id": item.test_id,
                    "price": item.price,
                    "status": LabBookingStatus::Booked,
                    "created_at": now
                })
            })
            .collect();
        let bookings: Vec<LabBooking> = self.supabase.insert_many("lab_bookings", Some(auth_token), rows).await?;

        info!(
            "Lab booking group {} created ({}, {} tests)",
            group.id,
            allocation.mode.as_str(),
            bookings.len()
        );
        Ok(BookingGroupDetails { group, bookings })
    }

    async fn find_group(&self, group_id: &str, auth_token: &str) -> Result<BookingGroup, LabError> {
        let query = format!("id=eq.{}", filter_value(group_id));
        self.supabase
            .select_one("lab_booking_groups", &query, Some(auth_token))
            .await?
            .ok_or(LabError::GroupNotFound)
    }

    pub async fn get_group(&self, group_id: &str, user: &User, auth_token: &str) -> Result<BookingGroupDetails, LabError> {
        let group = self.find_group(group_id, auth_token).await?;
        ensure_can_view(&group, user)?;

        let bookings = self
            .supabase
            .select("lab_bookings", &format!("group_id=eq.{}&order=created_at.asc", group.id), Some(auth_token))
            .await?;
        Ok(BookingGroupDetails { group, bookings })
    }

    /// Cancel a group and every booking in it not yet past `booked`.
    pub async fn cancel_group(&self, group_id: &str, user: &User, auth_token: &str) -> Result<BookingGroupDetails, LabError> {
        let group = self.find_group(group_id, auth_token).await?;
        ensure_can_view(&group, user)?;
        if group.status == BookingGroupStatus::Cancelled {
            return Err(LabError::AlreadyCancelled);
        }

        let group: BookingGroup = self
            .supabase
            .update(
                "lab_booking_groups",
                &format!("id=eq.{}&status=eq.booked", group.id),
                Some(auth_token),
                json!({ "status": BookingGroupStatus::Cancelled }),
            )
            .await
            .map_err(|e| if e.is_not_found() { LabError::AlreadyCancelled } else { e.into() })?;

        let bookings: Vec<LabBooking> = self
            .supabase
            .update_many(
                "lab_bookings",
                &format!("group_id=eq.{}&status=eq.booked", group.id),
                Some(auth_token),
                json!({ "status": LabBookingStatus::Cancelled }),
            )
            .await?;

        info!("Lab booking group {} cancelled with {} bookings", group.id, bookings.len());
        Ok(BookingGroupDetails { group, bookings })
    }
}
