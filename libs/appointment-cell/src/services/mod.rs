pub mod access;
pub mod booking;
pub mod history;
pub mod lifecycle;
pub mod prescription;
pub mod queue;

pub use booking::AppointmentBookingService;
pub use history::HistoryLog;
pub use prescription::PrescriptionService;
pub use queue::QueueService;
