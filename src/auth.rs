//! Basic-auth credential gate with two roles.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::{OpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Admin,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
    pub role: Role,
}

impl Credentials {
    pub fn new(username: &str, password: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Identity attached to a request once its credentials check out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn require_admin(&self) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Viewer => Err(OpsError::Forbidden(format!(
                "'{}' is not an administrator",
                self.username
            ))),
        }
    }
}

/// Splits a `Basic` authorization header into user and password.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

pub fn authenticate(credentials: &[Credentials], header: Option<&str>) -> Result<AuthenticatedUser> {
    let header = header.ok_or_else(|| OpsError::Unauthorized("missing credentials".to_string()))?;
    let (user, password) =
        parse_basic(header).ok_or_else(|| OpsError::Unauthorized("malformed credentials".to_string()))?;
    credentials
        .iter()
        .find(|c| c.username == user && c.password == password)
        .map(|c| AuthenticatedUser {
            username: c.username.clone(),
            role: c.role,
        })
        .ok_or_else(|| OpsError::Unauthorized("invalid user or password".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
    }

    fn creds() -> Vec<Credentials> {
        vec![
            Credentials::new("viewer", "v-pass", Role::Viewer),
            Credentials::new("admin", "a-pass", Role::Admin),
        ]
    }

    #[test]
    fn test_roles_resolved() {
        let user = authenticate(&creds(), Some(&basic("admin", "a-pass"))).unwrap();
        assert_eq!(user.role, Role::Admin);
        assert!(user.require_admin().is_ok());

        let user = authenticate(&creds(), Some(&basic("viewer", "v-pass"))).unwrap();
        assert!(matches!(user.require_admin(), Err(OpsError::Forbidden(_))));
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(authenticate(&creds(), None), Err(OpsError::Unauthorized(_))));
        assert!(authenticate(&creds(), Some(&basic("viewer", "a-pass"))).is_err());
        assert!(authenticate(&creds(), Some("Bearer abc")).is_err());
        assert!(authenticate(&creds(), Some("Basic !!!")).is_err());
    }

    #[test]
    fn test_password_may_contain_colon() {
        let creds = vec![Credentials::new("u", "a:b", Role::Viewer)];
        assert!(authenticate(&creds, Some(&basic("u", "a:b"))).is_ok());
    }

    #[test]
    fn test_debug_hides_password() {
        let shown = format!("{:?}", Credentials::new("u", "secret", Role::Viewer));
        assert!(!shown.contains("secret"));
    }
}
