use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    // Both reset fields are set on a reset request and cleared together on
    // consume; a user never carries only one of them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_password_expires: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    /// Response projection: everything a client may see. The password hash
    /// and the reset-token fields never leave the server.
    pub fn sanitized(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "phoneNumber": self.phone_number,
            "role": self.role.as_str(),
            "profilePicture": self.profile_picture,
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Guide,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Guide => "guide",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDto {
    #[validate(length(min = 1, message = "All fields are required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginDto {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileDto {
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordDto {
    #[validate(email(message = "Email is required"))]
    pub email: String,
}

/// Reset payload. The token may instead arrive in the path or query string;
/// `newPassword` is preferred, `password` is accepted for older clients.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordDto {
    pub token: Option<String>,
    pub new_password: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateUserDto {
    #[validate(length(min = 1, message = "Name, email and password are required"))]
    pub name: String,
    #[validate(email(message = "Name, email and password are required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserDto {
    pub name: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        let now = DateTime::from_millis(Utc::now().timestamp_millis());
        User {
            id: Some(ObjectId::new()),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: "$2b$10$secret".to_string(),
            phone_number: Some("9800000000".to_string()),
            role: Role::User,
            profile_picture: None,
            reset_password_token: Some("deadbeef".to_string()),
            reset_password_expires: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sanitized_projection_never_exposes_secrets() {
        let value = sample_user().sanitized();
        let rendered = value.to_string();
        assert!(!rendered.contains("password"));
        assert!(!rendered.contains("$2b$10$secret"));
        assert!(!rendered.contains("resetPasswordToken"));
        assert!(!rendered.contains("deadbeef"));
        assert_eq!(value["email"], "asha@example.com");
        assert_eq!(value["role"], "user");
    }

    #[test]
    fn roles_use_lowercase_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Guide).unwrap(), "\"guide\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"user\"").unwrap(),
            Role::User
        );
    }

    #[test]
    fn register_dto_enforces_password_length() {
        let dto = RegisterDto {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: "short".to_string(),
            phone_number: None,
        };
        assert!(validator::Validate::validate(&dto).is_err());
    }
}
