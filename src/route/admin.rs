use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::MessageResponse;
use crate::data::category::{CategoryCreateData, CategoryDbExt, CategoryResponse};
use crate::data::course::db::CourseDbExt;
use crate::data::user::db::{Analytics, UserDbExt};
use crate::data::user::UserResponse;
use crate::middleware::paging::PageState;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::Problem;
use crate::role::Role;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveInstructorData {
    pub instructor_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCreated {
    pub message: String,
    pub new_category: CategoryResponse,
}

/// Platform totals
///
/// Counts are taken independently and may be skewed by concurrent writes.
#[utoipa::path(
    responses(
        (status = 200, description = "Totals", body = Analytics),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/analytics")]
#[tracing::instrument(skip(db))]
pub async fn admin_analytics(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Analytics>, Problem> {
    auth.require_role(Role::Admin)?;

    Ok(Json(Analytics {
        total_users: db.count_users(None).await?,
        total_courses: db.count_courses().await?,
        total_instructors: db.count_users(Some(Role::Instructor)).await?,
    }))
}

/// All user accounts without password material
#[utoipa::path(
    responses(
        (status = 200, description = "Users", body = Vec<UserResponse>),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/users")]
#[tracing::instrument(skip(db))]
pub async fn admin_users(
    page: Option<PageState>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<UserResponse>>, Problem> {
    auth.require_role(Role::Admin)?;

    let users = db.list_users(page).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Course categories
///
/// Available to every logged in user so instructors can pick one.
#[utoipa::path(
    responses(
        (status = 200, description = "Categories", body = Vec<CategoryResponse>),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/categories")]
#[tracing::instrument(skip(db))]
pub async fn admin_categories(
    _auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<CategoryResponse>>, Problem> {
    let categories = db.list_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    request_body = CategoryCreateData,
    responses(
        (status = 201, description = "Category created", body = CategoryCreated),
        (status = 400, description = "Empty or duplicate name", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/category", format = "json", data = "<data>")]
#[tracing::instrument(skip(db))]
pub async fn admin_category_create(
    data: Json<CategoryCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<(Status, Json<CategoryCreated>), Problem> {
    auth.require_role(Role::Admin)?;

    let category = db.create_category(data.into_inner()).await?;

    Ok((
        Status::Created,
        Json(CategoryCreated {
            message: "Category created successfully".to_string(),
            new_category: category.into(),
        }),
    ))
}

/// Delete a category
///
/// Succeeds whether or not the category exists. Courses keep their category text.
#[utoipa::path(
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/admin/category/<id>")]
#[tracing::instrument(skip(db))]
pub async fn admin_category_delete(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<MessageResponse>, Problem> {
    auth.require_role(Role::Admin)?;

    db.delete_category(id).await?;
    Ok(Json(MessageResponse::new("Category deleted successfully")))
}

#[utoipa::path(
    request_body = ApproveInstructorData,
    responses(
        (status = 200, description = "Instructor approved", body = MessageResponse),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "No such instructor", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/admin/approve-instructor", format = "json", data = "<data>")]
#[tracing::instrument(skip(db))]
pub async fn admin_approve_instructor(
    data: Json<ApproveInstructorData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<MessageResponse>, Problem> {
    auth.require_role(Role::Admin)?;

    db.approve_instructor(data.instructor_id).await?;
    Ok(Json(MessageResponse::new("Instructor approved successfully")))
}
