use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Employee,
}

impl Role {
    /// Parses the value stored in `users.role` / `salary_structures.role`.
    pub fn parse(value: &str) -> Option<Self> {
        Role::from_str(value.trim()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_values() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" employee "), Some(Role::Employee));
        assert_eq!(Role::parse("hr"), None);
    }

    #[test]
    fn displays_as_stored_value() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::Employee.as_ref(), "employee");
    }

    #[test]
    fn json_uses_lowercase() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");

        let role: Role = serde_json::from_str("\"employee\"").unwrap();
        assert_eq!(role, Role::Employee);
    }
}
