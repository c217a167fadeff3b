pub mod otp;
pub mod sms;
pub mod users;

pub use otp::OtpService;
pub use users::UserDirectory;
