use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, DatabaseError, SupabaseClient};
use shared_models::auth::Role;

use crate::models::AppUser;

/// Looks up login identities. Runs with the service role because callers
/// have no token yet.
pub struct UserDirectory {
    supabase: SupabaseClient,
}

impl UserDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::service_role(config),
        }
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<AppUser>, DatabaseError> {
        let query = format!("phone=eq.{}&limit=1", filter_value(phone));
        self.supabase.select_one("app_users", &query, None).await
    }

    pub async fn find_or_create(&self, phone: &str) -> Result<AppUser, DatabaseError> {
        if let Some(user) = self.find_by_phone(phone).await? {
            debug!("Existing user {} signed in", user.id);
            return Ok(user);
        }

        let row = json!({
            "id": Uuid::new_v4().to_string(),
            "phone": phone,
            "role": Role::Patient.as_str(),
        });

        match self.supabase.insert::<AppUser>("app_users", None, row).await {
            Ok(user) => {
                info!("Registered new user {}", user.id);
                Ok(user)
            }
            // Lost a race with a concurrent first login for the same phone.
            Err(e) if e.is_conflict() => self
                .find_by_phone(phone)
                .await?
                .ok_or_else(|| DatabaseError::NotFound("app user".to_string())),
            Err(e) => Err(e),
        }
    }
}
