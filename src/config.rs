//! Command-line and environment settings shared by the binaries.

use std::path::PathBuf;

use clap::Args;

use crate::auth::{Credentials, Role};
use crate::error::{OpsError, Result};
use crate::store::SurrealStore;

#[derive(Args, Debug, Clone)]
pub struct StoreSettings {
    /// Path to the embedded database
    #[arg(long, env = "OPS_DB_PATH", default_value = "data/operations.db")]
    pub db_path: String,

    #[arg(long, env = "OPS_DB_NAMESPACE", default_value = "logistics")]
    pub namespace: String,

    #[arg(long, env = "OPS_DB_NAME", default_value = "operations")]
    pub database: String,
}

impl StoreSettings {
    pub async fn connect(&self) -> Result<SurrealStore> {
        SurrealStore::connect(&self.db_path, &self.namespace, &self.database).await
    }
}

#[derive(Args, Debug, Clone)]
pub struct AuthSettings {
    #[arg(long, env = "OPS_VIEWER_USER", default_value = "viewer")]
    pub viewer_user: String,

    #[arg(long, env = "OPS_VIEWER_PASSWORD", hide_env_values = true)]
    pub viewer_password: Option<String>,

    #[arg(long, env = "OPS_ADMIN_USER", default_value = "admin")]
    pub admin_user: String,

    /// Without an admin password, uploads and usage metrics are disabled
    #[arg(long, env = "OPS_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl AuthSettings {
    /// Configured credential pairs. A viewer password is mandatory.
    pub fn credentials(&self) -> Result<Vec<Credentials>> {
        let viewer_password = self
            .viewer_password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| OpsError::Config("OPS_VIEWER_PASSWORD is not set".to_string()))?;

        let mut credentials = vec![Credentials::new(&self.viewer_user, viewer_password, Role::Viewer)];
        if let Some(admin_password) = self.admin_password.as_deref().filter(|p| !p.is_empty()) {
            if self.admin_user == self.viewer_user {
                return Err(OpsError::Config(
                    "admin and viewer users must differ".to_string(),
                ));
            }
            credentials.push(Credentials::new(&self.admin_user, admin_password, Role::Admin));
        }
        Ok(credentials)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SessionSettings {
    /// Local file that receives sessions the store could not record
    #[arg(long, env = "OPS_SESSION_LOG", default_value = "logs/user_sessions.json")]
    pub session_log: PathBuf,
}
