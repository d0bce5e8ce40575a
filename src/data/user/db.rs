use std::collections::HashMap;

use bson::doc;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{User, UserSummary};
use crate::data::filter;
use crate::resp::problem::{is_duplicate_key, problems, Problem};
use crate::middleware::paging::PageState;
use crate::role::Role;

pub static USER_COLLECTION_NAME: &str = "users";

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_name(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad name.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn already_exists(email: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Conflict.")
            .insert_str("email", email)
            .detail("User already exists")
            .to_owned()
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "User doesn't exist.")
            .insert("id", id.to_string())
            .detail("User not found")
            .to_owned()
    }

    #[inline]
    pub fn instructor_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Instructor doesn't exist.")
            .insert("id", id.to_string())
            .detail("Instructor not found")
            .to_owned()
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email or password.")
            .detail("Invalid Credentials")
            .to_owned()
    }

    #[inline]
    pub fn pending_approval() -> Problem {
        Problem::new_untyped(Status::Forbidden, "Pending approval.")
            .detail("Your instructor account is pending admin approval.")
            .to_owned()
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct RegisterData {
    pub name: String,
    #[schema(format = "email")]
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl std::fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegisterData:{}:{}", self.email, self.role)
    }
}

impl RegisterData {
    /// Checks the registration fields. The `admin` role is only granted to
    /// emails in `admin_emails`; anyone else gets a forbidden problem.
    pub fn validate(&self, admin_emails: &[String]) -> Result<(), Problem> {
        if self.name.trim().is_empty() {
            return Err(problem::bad_name("Name is required."));
        }

        if !self.email.contains('@') || self.email.trim().len() < 3 {
            return Err(problem::bad_email(
                &self.email,
                "Not a valid e-mail address.",
            ));
        }

        if self.password.len() < 6 {
            return Err(problem::bad_password(
                "Password must be at least 6 characters (bytes) long.",
            ));
        }

        if self.password.len() > 1024 {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        if self.role == Role::Admin
            && !admin_emails
                .iter()
                .any(|it| it.eq_ignore_ascii_case(self.email.trim()))
        {
            return Err(problems::forbidden(
                "Admin accounts can't be registered with this email.",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginData {
    #[schema(format = "email")]
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.email)
    }
}

impl LoginData {
    /// Checks a stored user against the submitted credentials.
    ///
    /// Credentials are checked before the approval flag, so an unknown
    /// password never reveals that an instructor account exists.
    pub fn authenticate(&self, user: Option<User>) -> Result<User, Problem> {
        let user = user.ok_or_else(problem::bad_login)?;

        if !user.pw_hash.verify(&self.password) {
            return Err(problem::bad_login());
        }

        if !user.can_log_in() {
            return Err(problem::pending_approval());
        }

        Ok(user)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_users: u64,
    pub total_courses: u64,
    pub total_instructors: u64,
}

pub trait UserDbExt {
    async fn ensure_user_indexes(&self) -> Result<(), mongodb::error::Error>;

    async fn create_user(&self, data: RegisterData, password_cost: u32) -> Result<User, Problem>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem>;

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, Problem>;

    async fn list_users(&self, page: Option<PageState>) -> Result<Vec<User>, Problem>;

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, UserSummary>, Problem>;

    async fn approve_instructor(&self, id: Uuid) -> Result<User, Problem>;

    async fn complete_lesson(&self, id: Uuid, lesson: Uuid) -> Result<User, Problem>;

    async fn count_users(&self, role: Option<Role>) -> Result<u64, Problem>;
}

impl UserDbExt for Database {
    async fn ensure_user_indexes(&self) -> Result<(), mongodb::error::Error> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection::<User>(USER_COLLECTION_NAME)
            .create_index(index, None)
            .await?;
        Ok(())
    }

    async fn create_user(&self, data: RegisterData, password_cost: u32) -> Result<User, Problem> {
        if self.find_user_by_email(&data.email).await?.is_some() {
            return Err(problem::already_exists(&data.email));
        }

        let email = data.email.clone();
        let user = tokio::task::spawn_blocking(move || {
            User::new(
                data.name.trim(),
                data.email.trim(),
                &data.password,
                data.role,
                password_cost,
            )
        })
        .await
        .map_err(|e| {
            tracing::error!("password hashing task failed: {}", e);
            problems::from_status(rocket::http::Status::InternalServerError)
        })?;

        match self
            .collection::<User>(USER_COLLECTION_NAME)
            .insert_one(&user, None)
            .await
        {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(problem::already_exists(&email)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, Problem> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_email(email.as_ref().trim()), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_users(&self, page: Option<PageState>) -> Result<Vec<User>, Problem> {
        let options = page.map(|p| {
            FindOptions::builder()
                .sort(doc! { "created": 1 })
                .skip(p.skip())
                .limit(p.limit())
                .build()
        });

        self.collection::<User>(USER_COLLECTION_NAME)
            .find(None, options)
            .await?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, UserSummary>, Problem> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users: Vec<User> = self
            .collection::<User>(USER_COLLECTION_NAME)
            .find(filter::by_ids(ids), None)
            .await?
            .try_collect()
            .await?;

        Ok(users
            .iter()
            .map(|user| (user.id, UserSummary::from(user)))
            .collect())
    }

    async fn approve_instructor(&self, id: Uuid) -> Result<User, Problem> {
        let mut user = match self.get_user(id).await? {
            Some(user) if user.role == Role::Instructor => user,
            _ => return Err(problem::instructor_not_found(id)),
        };

        self.collection::<User>(USER_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$set": { "is_approved": true } },
                None,
            )
            .await?;
        tracing::info!("Approved instructor {}", id);

        user.is_approved = true;
        Ok(user)
    }

    async fn complete_lesson(&self, id: Uuid, lesson: Uuid) -> Result<User, Problem> {
        let result = self
            .collection::<User>(USER_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$addToSet": { "completed_lessons": bson::Uuid::from(lesson) } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(problem::not_found(id));
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| problem::not_found(id))
    }

    async fn count_users(&self, role: Option<Role>) -> Result<u64, Problem> {
        let filter = role.map(|role| doc! { "role": role });

        self.collection::<User>(USER_COLLECTION_NAME)
            .count_documents(filter, None)
            .await
            .map_err(Problem::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    fn register(role: Role) -> RegisterData {
        RegisterData {
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            password: "hunter22".to_string(),
            role,
        }
    }

    #[test]
    fn registration_validation() {
        assert!(register(Role::Student).validate(&[]).is_ok());
        assert!(register(Role::Instructor).validate(&[]).is_ok());

        let mut data = register(Role::Student);
        data.email = "not-an-email".to_string();
        assert_eq!(data.validate(&[]).unwrap_err().status, Status::BadRequest);

        let mut data = register(Role::Student);
        data.name = "   ".to_string();
        assert!(data.validate(&[]).is_err());

        let mut data = register(Role::Student);
        data.password = "short".to_string();
        assert!(data.validate(&[]).is_err());
    }

    #[test]
    fn admin_registration_needs_listed_email() {
        let data = register(Role::Admin);
        assert_eq!(data.validate(&[]).unwrap_err().status, Status::Forbidden);
        assert!(data.validate(&["JANE@example.com".to_string()]).is_ok());
    }

    #[test]
    fn missing_role_defaults_to_student() {
        let data: RegisterData = serde_json::from_str(
            r#"{"name":"a","email":"a@b.c","password":"secret1"}"#,
        )
        .unwrap();
        assert_eq!(data.role, Role::Student);
        assert!(!format!("{:?}", data).contains("secret1"));
    }

    fn login(password: &str) -> LoginData {
        LoginData {
            email: "jane@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn login_requires_known_user_and_password() {
        let user = User::new("Jane", "jane@example.com", "hunter22", Role::Student, 4);

        assert_eq!(
            login("hunter22").authenticate(None).unwrap_err().status,
            Status::BadRequest
        );
        assert_eq!(
            login("wrong").authenticate(Some(user.clone())).unwrap_err().status,
            Status::BadRequest
        );
        assert_eq!(login("hunter22").authenticate(Some(user)).unwrap().name, "Jane");
    }

    #[test]
    fn unapproved_instructors_are_pending() {
        let mut instructor = User::new("Ian", "ian@example.com", "hunter22", Role::Instructor, 4);

        let err = login("hunter22")
            .authenticate(Some(instructor.clone()))
            .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
        assert_eq!(
            err.message(),
            "Your instructor account is pending admin approval."
        );

        // wrong password is still reported as bad credentials
        let err = login("nope").authenticate(Some(instructor.clone())).unwrap_err();
        assert_eq!(err.status, Status::BadRequest);

        instructor.is_approved = true;
        assert!(login("hunter22").authenticate(Some(instructor)).is_ok());
    }
}
