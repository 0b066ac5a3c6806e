use crate::{error::ApiError, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::unauthorized("Not authenticated")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    pub fn require_employee(&self) -> Result<(), ApiError> {
        if self.role == Role::Employee {
            Ok(())
        } else {
            Err(ApiError::forbidden("Employee only"))
        }
    }

    /// Admins may act on anyone; everyone else only on their own records.
    pub fn require_self_or_admin(&self, user_id: u64) -> Result<(), ApiError> {
        if self.role == Role::Admin || self.user_id == user_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Access denied"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn user(id: u64, role: Role) -> AuthUser {
        AuthUser {
            user_id: id,
            email: format!("user{id}@company.com"),
            role,
        }
    }

    #[test]
    fn role_guards() {
        let admin = user(1, Role::Admin);
        let employee = user(2, Role::Employee);

        assert!(admin.require_admin().is_ok());
        assert!(employee.require_admin().is_err());
        assert!(employee.require_employee().is_ok());
        assert!(admin.require_employee().is_err());
    }

    #[test]
    fn self_or_admin() {
        let admin = user(1, Role::Admin);
        let employee = user(2, Role::Employee);

        assert!(admin.require_self_or_admin(2).is_ok());
        assert!(employee.require_self_or_admin(2).is_ok());
        assert!(employee.require_self_or_admin(3).is_err());
    }

    #[actix_web::test]
    async fn extractor_reads_extensions() {
        let req = TestRequest::default().to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());

        req.extensions_mut().insert(user(5, Role::Employee));
        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.user_id, 5);
    }
}
