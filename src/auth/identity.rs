//! Parsing the identity headers set by the identity proxy.

use axum::http::HeaderMap;

use crate::user::{User, UserID};

/// The header carrying the user's unique ID.
pub const UID_HEADER: &str = "x-authentik-uid";
/// The header carrying the user's email address.
pub const EMAIL_HEADER: &str = "x-authentik-email";
/// The header carrying the user's username.
pub const USERNAME_HEADER: &str = "x-authentik-username";
/// The header carrying the user's display name.
pub const NAME_HEADER: &str = "x-authentik-name";
/// The header carrying a comma separated list of the user's groups.
pub const GROUPS_HEADER: &str = "x-authentik-groups";

/// The identity of the caller as asserted by the identity proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The user's unique ID.
    pub id: UserID,
    /// The user's username, falls back to the email address.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's display name, falls back to the username and then the email address.
    pub name: String,
    /// The groups the user belongs to.
    pub groups: Vec<String>,
}

impl Identity {
    /// Read the identity from the request headers.
    ///
    /// Returns `None` if the user ID or email header is missing or empty.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let uid = get_header(headers, UID_HEADER)?;
        let email = get_header(headers, EMAIL_HEADER)?;
        let username = get_header(headers, USERNAME_HEADER);
        let name = get_header(headers, NAME_HEADER)
            .or_else(|| username.clone())
            .unwrap_or_else(|| email.clone());
        let groups = get_header(headers, GROUPS_HEADER)
            .map(|groups| groups.split(',').map(str::to_owned).collect())
            .unwrap_or_default();

        Some(Self {
            id: UserID::new(&uid),
            username: username.unwrap_or_else(|| email.clone()),
            email,
            name,
            groups,
        })
    }

    /// The user record for this identity.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

fn get_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
