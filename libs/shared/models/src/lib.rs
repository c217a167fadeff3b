pub mod auth;
pub mod error;
pub mod validation;

pub use error::AppError;
pub use validation::FieldErrors;
