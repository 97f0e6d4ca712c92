//! Domain records, request payloads and the JSON response envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored user account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub bio: Option<String>,
    /// Storage path of the current profile picture.
    pub profile_picture: Option<String>,
    pub last_place_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub bio: Option<String>,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub last_place_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    /// Builds the public view, resolving the picture path to a URL.
    pub fn from_user(user: &User, picture_url: impl Fn(&str) -> String) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            profile_picture: user.profile_picture.as_deref().map(picture_url),
            last_place_count: user.last_place_count,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub username: String,
    pub last_place_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Token plus user, returned by signup and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Partial update; absent or empty fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
}

/// `{"success": true, "data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// `{"success": false, "error": "<message>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub from: u64,
    pub to: u64,
}

impl Pagination {
    /// Page metadata for `total` items; `per_page` must be non-zero.
    pub fn new(total: u64, per_page: u64, current_page: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page);

        let (from, to) = if total == 0 {
            (0, 0)
        } else {
            let from = current_page
                .saturating_sub(1)
                .saturating_mul(per_page)
                .saturating_add(1);
            let to = from.saturating_add(per_page - 1).min(total);
            (from, to)
        };

        Self {
            total,
            per_page,
            current_page,
            last_page,
            from,
            to,
        }
    }
}

/// `{"success": true, "data": [...], "pagination": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: u64, per_page: u64, current_page: u64) -> Self {
        Self {
            success: true,
            data,
            pagination: Pagination::new(total, per_page, current_page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(25, 10, 1);
        assert_eq!((p.last_page, p.from, p.to), (3, 1, 10));

        let p = Pagination::new(25, 10, 3);
        assert_eq!((p.last_page, p.from, p.to), (3, 21, 25));

        let p = Pagination::new(0, 10, 1);
        assert_eq!((p.last_page, p.from, p.to), (0, 0, 0));
    }

    #[test]
    fn test_page_past_the_end() {
        // `to` is capped at total even when `from` overshoots it
        let p = Pagination::new(5, 10, 2);
        assert_eq!(p.from, 11);
        assert_eq!(p.to, 5);
    }

    #[test]
    fn test_huge_page_saturates() {
        let p = Pagination::new(5, 10, u64::MAX);
        assert_eq!(p.current_page, u64::MAX);
        assert_eq!(p.from, u64::MAX);
        assert_eq!(p.to, 5);
    }

    #[test]
    fn test_envelopes_serialize() {
        let ok = serde_json::to_value(ApiResponse::new(serde_json::json!({"status": "ok"}))).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": {"status": "ok"}}));

        let err = serde_json::to_value(ErrorResponse::new("User not found")).unwrap();
        assert_eq!(err, serde_json::json!({"success": false, "error": "User not found"}));

        let page = serde_json::to_value(PaginatedResponse::new(vec![1, 2], 12, 2, 1)).unwrap();
        assert_eq!(page["pagination"]["last_page"], 6);
        assert_eq!(page["pagination"]["per_page"], 2);
        assert_eq!(page["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_user_response_hides_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            password_hash: "$argon2id$secret".into(),
            bio: None,
            profile_picture: Some("/uploads/a.png".into()),
            last_place_count: 2,
            created_at: now,
            updated_at: now,
        };

        let response = UserResponse::from_user(&user, |path| format!("https://cdn.example.com{path}"));
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("bio"));
        assert_eq!(
            response.profile_picture.as_deref(),
            Some("https://cdn.example.com/uploads/a.png")
        );
    }
}
