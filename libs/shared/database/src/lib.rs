pub mod error;
pub mod supabase;

pub use error::DatabaseError;
pub use supabase::{return_representation, SupabaseClient};

/// Escape a value for use inside a PostgREST filter (`col=eq.<value>`).
pub fn filter_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
