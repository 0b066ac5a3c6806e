use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Columns selected for every profile read. Never includes the password hash.
pub const PROFILE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, role, \
     department_id, position, experience, date_of_joining, available_leaves, \
     profile_image_path, passport_number, created_at, updated_at";

/// Employee/admin profile as stored in `users`, without credentials.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_code": "EMP-001",
    "first_name": "John",
    "last_name": "Doe",
    "full_name": "John Doe",
    "email": "john.doe@company.com",
    "role": "employee",
    "department_id": 10,
    "position": "Software Engineer",
    "experience": 3,
    "date_of_joining": "2024-01-01",
    "available_leaves": 30,
    "profile_image_path": null,
    "passport_number": null,
    "created_at": "2024-01-01T00:00:00Z",
    "updated_at": "2024-01-01T00:00:00Z"
}))]
pub struct UserProfile {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: Option<String>,
    #[sqlx(skip)]
    pub full_name: String,
    pub email: String,
    #[schema(example = "employee")]
    pub role: String,
    pub department_id: u64,
    pub position: Option<String>,
    pub experience: u32,
    #[schema(value_type = String, format = "date")]
    pub date_of_joining: NaiveDate,
    pub available_leaves: i32,
    pub profile_image_path: Option<String>,
    pub passport_number: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fills the derived `full_name`, which is not a column.
    pub fn with_full_name(mut self) -> Self {
        self.full_name = full_name(&self.first_name, self.last_name.as_deref());
        self
    }
}

/// Row used by login and password checks.
#[derive(Debug, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: String,
}

pub fn full_name(first_name: &str, last_name: Option<&str>) -> String {
    format!("{} {}", first_name.trim(), last_name.unwrap_or("").trim())
        .trim()
        .to_string()
}

/// Emails are unique case-insensitively; they are stored lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A deliberately loose check: one `@` with text on both sides and a dot in the domain.
pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_skips_missing_last_name() {
        assert_eq!(full_name("John", Some("Doe")), "John Doe");
        assert_eq!(full_name("John", None), "John");
        assert_eq!(full_name(" John ", Some("  ")), "John");
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  John.Doe@Company.COM "), "john.doe@company.com");
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a@.com"));
    }
}
