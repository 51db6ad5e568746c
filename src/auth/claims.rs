use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::Role;

/// JWT payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,        // user ID
    pub username: String, // login name at issue time
    pub role: Role,       // authorization role
    pub iat: usize,       // issued at (unix timestamp)
    pub exp: usize,       // expires at (unix timestamp)
    pub iss: String,      // issuer
    pub aud: String,      // audience
}

/// Authenticated caller as asserted by a verified token.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            username: c.username,
            role: c.role,
        }
    }
}
