use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::MessageResponse;
use crate::config::Config;
use crate::data::course::db::CourseDbExt;
use crate::data::user::db::{problem as user_problem, LoginData, RegisterData, UserDbExt};
use crate::data::user::ProfileResponse;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::security::Security;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginResponse:{}", self.user.id)
    }
}

/// Register a new account
///
/// Instructors start unapproved and can't log in until an admin approves them.
/// Registering as `admin` is refused with 403 unless the email is listed in
/// the `admin_emails` setting, which is empty by default.
#[utoipa::path(
    request_body = RegisterData,
    responses(
        (status = 201, description = "User registered", body = MessageResponse),
        (status = 400, description = "Invalid input or email already used", body = Problem),
        (status = 403, description = "Email may not register as admin", body = Problem),
    )
)]
#[post("/auth/register", format = "json", data = "<data>")]
#[tracing::instrument(skip(db, config, security))]
pub async fn register(
    data: Json<RegisterData>,
    db: &State<Database>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<(Status, Json<MessageResponse>), Problem> {
    data.validate(&config.admin_emails)?;

    let user = db
        .create_user(data.into_inner(), security.password_cost)
        .await?;
    tracing::info!("Registered {} {}", user.role, user.id);

    Ok((
        Status::Created,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    request_body = LoginData,
    responses(
        (status = 200, description = "Signed bearer token", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = Problem),
        (status = 403, description = "Instructor pending approval", body = Problem),
    )
)]
#[post("/auth/login", format = "json", data = "<data>")]
#[tracing::instrument(skip(db, security))]
pub async fn login(
    data: Json<LoginData>,
    db: &State<Database>,
    security: &State<Security>,
) -> Result<Json<LoginResponse>, Problem> {
    let data = data.into_inner();
    let stored = db.find_user_by_email(&data.email).await?;

    // bcrypt is slow on purpose; keep it off the async workers.
    let user = tokio::task::spawn_blocking(move || data.authenticate(stored))
        .await
        .map_err(|e| {
            tracing::error!("password verification task failed: {}", e);
            problems::from_status(Status::InternalServerError)
        })??;

    let token = UserRoleToken::new(&user, security.token_ttl)
        .encode_jwt(&security.jwt_keys)
        .map_err(|e| {
            tracing::error!("unable to sign token: {}", e);
            problems::from_status(Status::InternalServerError)
        })?;
    tracing::debug!("user {} logged in", user.id);

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            name: user.name,
            role: user.role,
        },
    }))
}

/// Profile of the calling user
#[utoipa::path(
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/auth/me")]
#[tracing::instrument(skip(db))]
pub async fn me(auth: UserRoleToken, db: &State<Database>) -> Result<Json<ProfileResponse>, Problem> {
    let user = db
        .get_user(auth.user)
        .await?
        .ok_or_else(|| user_problem::not_found(auth.user))?;
    let enrolled_courses = db.enrolled_course_ids(auth.user).await?;

    Ok(Json(ProfileResponse {
        user: user.into(),
        enrolled_courses,
    }))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::data::user::db::UserDbExt;
    use crate::route::tests::{bearer, client};
    use crate::role::Role;

    async fn register(client: &Client, email: &str, role: Role) -> Uuid {
        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({ "name": "Ian", "email": email, "password": "secret1", "role": role })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let db = client.rocket().state::<Database>().expect("database");
        db.find_user_by_email(email)
            .await
            .expect("user lookup")
            .expect("registered user")
            .id
    }

    async fn approve(client: &Client, id: Uuid) -> Status {
        client
            .put("/api/admin/approve-instructor")
            .header(ContentType::JSON)
            .header(bearer(Role::Admin))
            .body(json!({ "instructorId": id }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[rocket::async_test]
    async fn register_rejects_invalid_input() {
        let client = client().await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({ "name": "Jane", "email": "not-an-email", "password": "secret1" })
                    .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.expect("problem json");
        assert_eq!(body["message"], "Not a valid e-mail address.");
    }

    #[rocket::async_test]
    async fn register_admin_requires_listed_email() {
        let client = client().await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "name": "Mallory",
                    "email": "mallory@example.com",
                    "password": "secret1",
                    "role": "admin"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn me_requires_token() {
        let client = client().await;

        let response = client.get("/api/auth/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let body: Value = response.into_json().await.expect("problem json");
        assert_eq!(body["message"], "No token, authorization denied");
    }

    #[rocket::async_test]
    async fn malformed_token_is_unauthorized() {
        let client = client().await;

        let response = client
            .get("/api/auth/me")
            .header(rocket::http::Header::new("Authorization", "Bearer nope"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let body: Value = response.into_json().await.expect("problem json");
        assert_eq!(body["message"], "Token is not valid");
    }

    #[rocket::async_test]
    #[ignore = "needs a running MongoDB"]
    async fn registered_user_can_log_in() {
        let client = client().await;
        let email = format!("{}@example.com", uuid::Uuid::new_v4());

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({ "name": "Sam", "email": email, "password": "secret1", "role": "student" })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": "secret1" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = response.into_json().await.expect("login json");
        assert_eq!(body["user"]["role"], "student");
        let token = body["token"].as_str().expect("token");

        let response = client
            .get("/api/auth/me")
            .header(rocket::http::Header::new(
                "Authorization",
                format!("Bearer {}", token),
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    #[ignore = "needs a running MongoDB"]
    async fn instructors_wait_for_approval() {
        let client = client().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let id = register(&client, &email, Role::Instructor).await;

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": "wrong-password" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": "secret1" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        // only an admin may approve
        let response = client
            .put("/api/admin/approve-instructor")
            .header(ContentType::JSON)
            .header(bearer(Role::Instructor))
            .body(json!({ "instructorId": id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        assert_eq!(approve(&client, id).await, Status::Ok);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": "secret1" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("login json");
        assert_eq!(body["user"]["role"], "instructor");
        assert_eq!(body["user"]["id"], id.to_string());
    }

    #[rocket::async_test]
    #[ignore = "needs a running MongoDB"]
    async fn only_instructors_can_be_approved() {
        let client = client().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let student = register(&client, &email, Role::Student).await;

        assert_eq!(approve(&client, student).await, Status::NotFound);
        assert_eq!(approve(&client, Uuid::new_v4()).await, Status::NotFound);

        let db = client.rocket().state::<Database>().expect("database");
        let unchanged = db.get_user(student).await.unwrap().expect("student");
        assert_eq!(unchanged.role, Role::Student);
    }
}
