use serde::{Deserialize, Serialize};

const DEFAULT_AVATAR: &str =
    "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=150&h=150&fit=crop&crop=face";

/// The signed-in administrator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub photo_url: String,
}

impl AuthUser {
    pub fn new(
        id: String,
        email: String,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Self {
        Self {
            id,
            name: display_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "User".to_string()),
            email,
            role: "Civic Administrator".to_string(),
            photo_url: photo_url
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
        }
    }
}
