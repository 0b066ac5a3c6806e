use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::model::role::Role;
use crate::model::user::{MIN_PASSWORD_LEN, is_valid_email};

/// Payload for self-registration and for admins creating an employee.
#[derive(Deserialize, ToSchema)]
pub struct NewUserReq {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
    #[schema(example = "john@company.com")]
    pub email: String,
    #[schema(example = "s3cretpass")]
    pub password: String,
    pub role: Option<Role>,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = "Software Engineer")]
    pub position: Option<String>,
    #[schema(example = 2)]
    pub experience: Option<u32>,
    #[schema(example = "2026-01-01", value_type = Option<String>, format = "date")]
    pub date_of_joining: Option<NaiveDate>,
    pub passport_number: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "john@company.com")]
    pub email: String,
    #[schema(example = "s3cretpass")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// User email
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl NewUserReq {
    /// Field checks that need no database access.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.employee_code.trim().is_empty()
            || self.first_name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || self.department_id == 0
        {
            return Err(ApiError::bad_request("Please provide all required fields."));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> NewUserReq {
        NewUserReq {
            employee_code: "EMP-1".into(),
            first_name: "Jane".into(),
            last_name: None,
            email: "jane@company.com".into(),
            password: "longenough".into(),
            role: None,
            department_id: 1,
            position: None,
            experience: None,
            date_of_joining: None,
            passport_number: None,
        }
    }

    #[test]
    fn complete_request_is_valid() {
        assert!(req().validate().is_ok());
    }

    #[test]
    fn required_fields_are_enforced() {
        let mut r = req();
        r.first_name = "  ".into();
        assert!(r.validate().is_err());

        let mut r = req();
        r.department_id = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn weak_password_and_bad_email_are_rejected() {
        let mut r = req();
        r.password = "short".into();
        assert!(r.validate().is_err());

        let mut r = req();
        r.email = "jane.company.com".into();
        assert!(r.validate().is_err());
    }
}
