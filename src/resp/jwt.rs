use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Header, Validation};
use rocket::http::Status;
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::util::date_time_as_unix_seconds;
use crate::data::user::User;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::security::{JwtKeys, Security};

pub static AUTH_HEADER_NAME: &str = "Authorization";
static BEARER_PREFIX: &str = "Bearer ";

/// Claims of a bearer token. Decoded once per request and passed explicitly
/// into every operation that needs to know who is calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoleToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
    pub role: Role,
}

impl UserRoleToken {
    pub fn new(user: &User, ttl: chrono::Duration) -> UserRoleToken {
        Self::for_user(user.id, user.role, ttl)
    }

    pub fn for_user(user: Uuid, role: Role, ttl: chrono::Duration) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + ttl,
            user,
            role,
        }
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.exp
    }

    pub fn encode_jwt(&self, keys: &JwtKeys) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(keys.algorithm());
        encode(&header, &self, &keys.encoding_key()?)
    }

    pub fn decode_jwt(
        token: impl AsRef<str>,
        keys: &JwtKeys,
    ) -> Result<UserRoleToken, jsonwebtoken::errors::Error> {
        decode::<UserRoleToken>(
            token.as_ref(),
            &keys.decoding_key()?,
            &Validation::new(keys.algorithm()),
        )
        .map(|data| data.claims)
    }

    /// Fails with Forbidden unless the caller has exactly `role`.
    pub fn require_role(&self, role: Role) -> Result<(), Problem> {
        if self.role != role {
            return Err(problems::forbidden(format!(
                "Access denied. Only {}s can do this.",
                role
            )));
        }
        Ok(())
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
        .detail(detail)
        .clone()
}

pub fn extract_claims(
    authorization: Option<&str>,
    keys: &JwtKeys,
) -> Result<UserRoleToken, Problem> {
    let token = match authorization {
        Some(value) if value.starts_with(BEARER_PREFIX) => value[BEARER_PREFIX.len()..].trim(),
        _ => return Err(auth_problem("No token, authorization denied")),
    };
    if token.is_empty() {
        return Err(auth_problem("No token, authorization denied"));
    }
    tracing::trace!("extracted bearer token from header");

    match UserRoleToken::decode_jwt(token, keys) {
        Ok(it) => {
            tracing::debug!("decoded user role token for user: {}", it.user);
            Ok(it)
        }
        Err(e) => {
            tracing::debug!("rejected bearer token: {}", e);
            Err(auth_problem("Token is not valid"))
        }
    }
}

/// Guard failure kept for the 401 catcher, which can't see the guard's error.
#[derive(Debug, Default)]
pub struct AuthFailure(pub Option<Problem>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                tracing::error!("security information isn't managed by the server");
                return Error((
                    Status::InternalServerError,
                    problems::from_status(Status::InternalServerError),
                ));
            }
        };

        tracing::trace!("extracting user role token from request headers");
        match extract_claims(req.headers().get_one(AUTH_HEADER_NAME), &security.jwt_keys) {
            Ok(claims) => Success(claims),
            Err(e) => {
                req.local_cache(|| AuthFailure(Some(e.clone())));
                Error((Status::Unauthorized, e))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> Self {
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            )
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    pub fn test_keys() -> JwtKeys {
        JwtKeys::Secret(b"unit-test-secret".to_vec())
    }

    #[test]
    fn jwt_configured_properly() {
        let now = Utc::now().round_subsecs(0);
        let user = Uuid::new_v4();

        let urt = UserRoleToken {
            iat: now,
            exp: now + Duration::hours(24),
            user,
            role: Role::Instructor,
        };

        let token = urt
            .encode_jwt(&test_keys())
            .expect("encoding should work for example");
        let decoded = UserRoleToken::decode_jwt(&token, &test_keys())
            .expect("unable to decode encoded token");

        assert_eq!(now, decoded.iat);
        assert_eq!(now + Duration::hours(24), decoded.exp);
        assert_eq!(user, decoded.user);
        assert_eq!(decoded.role, Role::Instructor);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let urt = UserRoleToken::for_user(Uuid::new_v4(), Role::Student, Duration::hours(-2));
        let token = urt.encode_jwt(&test_keys()).unwrap();

        let header = format!("Bearer {}", token);
        let err = extract_claims(Some(header.as_str()), &test_keys()).unwrap_err();
        assert_eq!(err.status, Status::Unauthorized);
    }

    #[test]
    fn tokens_signed_with_other_keys_are_rejected() {
        let urt = UserRoleToken::for_user(Uuid::new_v4(), Role::Admin, Duration::hours(1));
        let token = urt
            .encode_jwt(&JwtKeys::Secret(b"someone-else".to_vec()))
            .unwrap();

        let header = format!("Bearer {}", token);
        assert!(extract_claims(Some(header.as_str()), &test_keys()).is_err());
    }

    #[test]
    fn header_must_be_bearer() {
        let urt = UserRoleToken::for_user(Uuid::new_v4(), Role::Admin, Duration::hours(1));
        let token = urt.encode_jwt(&test_keys()).unwrap();

        assert!(extract_claims(None, &test_keys()).is_err());
        assert!(extract_claims(Some(token.as_str()), &test_keys()).is_err());
        assert!(extract_claims(Some("Bearer "), &test_keys()).is_err());
        assert!(extract_claims(Some("Bearer not.a.jwt"), &test_keys()).is_err());

        let header = format!("Bearer {}", token);
        let claims = extract_claims(Some(header.as_str()), &test_keys()).unwrap();
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn require_role_is_exact() {
        let urt = UserRoleToken::for_user(Uuid::new_v4(), Role::Admin, Duration::hours(1));
        assert!(urt.require_role(Role::Admin).is_ok());
        assert_eq!(
            urt.require_role(Role::Instructor).unwrap_err().status,
            Status::Forbidden
        );
    }
}
