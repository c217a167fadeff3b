use shared_models::auth::{Role, User};

use crate::models::DoctorError;

/// The doctor themselves, clinic staff or an admin.
pub fn ensure_can_manage(user: &User, doctor_id: &str) -> Result<(), DoctorError> {
    if (user.has_role(Role::Doctor) && user.is_self(&doctor_id)) || user.is_staff_or_admin() {
        Ok(())
    } else {
        Err(DoctorError::UnauthorizedAccess)
    }
}

pub fn ensure_admin(user: &User) -> Result<(), DoctorError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(DoctorError::UnauthorizedAccess)
    }
}

pub fn ensure_staff_or_admin(user: &User) -> Result<(), DoctorError> {
    if user.is_staff_or_admin() {
        Ok(())
    } else {
        Err(DoctorError::UnauthorizedAccess)
    }
}
