pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::AuthError;
pub use router::{auth_routes, auth_routes_with_gateway};
pub use services::sms::{LogSmsGateway, SmsGateway};
