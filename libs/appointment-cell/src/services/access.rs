use shared_models::auth::{Role, User};

use crate::models::{Appointment, AppointmentError};

/// The appointment's patient or doctor.
pub fn is_participant(user: &User, appointment: &Appointment) -> bool {
    user.is_self(&appointment.patient_id) || user.is_self(&appointment.doctor_id)
}

pub fn ensure_can_view(user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if is_participant(user, appointment) || user.is_staff_or_admin() {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized)
    }
}

/// Clinical outcomes are recorded by the treating doctor or clinic staff.
pub fn ensure_can_record_outcome(user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if (user.has_role(Role::Doctor) && user.is_self(&appointment.doctor_id)) || user.is_staff_or_admin() {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized)
    }
}
