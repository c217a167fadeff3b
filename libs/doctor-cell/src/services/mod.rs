pub mod access;
pub mod availability;
pub mod clinic;
pub mod conflict;
pub mod doctor;
pub mod leave;
pub mod slot_generator;
pub mod slots;

pub use availability::AvailabilityService;
pub use clinic::ClinicService;
pub use conflict::{ConflictChecker, LeaveChecker};
pub use doctor::DoctorService;
pub use leave::LeaveService;
pub use slots::{invalidate_slots, slot_cache_key, SlotService};
