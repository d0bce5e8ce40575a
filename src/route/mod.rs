use std::collections::BTreeMap;

use rocket::{Build, Catcher, Rocket, Route};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod admin;
pub mod auth;
pub mod catchers;
pub mod courses;
pub mod files;

use admin::*;
use auth::*;
use catchers::*;
use courses::*;
use files::*;

use crate::{
    data::{
        category::{CategoryCreateData, CategoryResponse},
        course::{
            quiz::{QuizAnswers, QuizResult},
            view::{
                AssignmentResponse, AssignmentSubmissions, CourseResponse, InstructorInfo,
                LessonResponse, QuestionResponse, SubmissionResponse,
            },
            AssignmentData, CompleteLessonData, ContentType, CourseCreateData, GradeData,
            LessonData, QuestionData, SubmissionStatus,
        },
        user::db::{Analytics, LoginData, RegisterData},
        user::{ProfileResponse, UserResponse, UserSummary},
    },
    resp::{jwt::doc::JWTAuth, problem::Problem},
    role::Role,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl ToString) -> MessageResponse {
        MessageResponse {
            message: message.to_string(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        register,
        login,
        me,
        course_list,
        course_create,
        course_enrolled,
        course_get,
        course_delete,
        course_enroll,
        course_unenroll,
        course_add_lesson,
        course_add_quiz,
        course_add_assignment,
        course_submit_quiz,
        course_submit_assignment,
        course_grade_assignment,
        course_complete_lesson,
        course_students,
        course_submissions,
        admin_analytics,
        admin_users,
        admin_categories,
        admin_category_create,
        admin_category_delete,
        admin_approve_instructor,
    ),
    components(schemas(
        Role,
        MessageResponse,
        RegisterData,
        LoginData,
        LoginUser,
        LoginResponse,
        UserResponse,
        ProfileResponse,
        UserSummary,
        ContentType,
        SubmissionStatus,
        CourseCreateData,
        LessonData,
        QuestionData,
        AssignmentData,
        GradeData,
        CompleteLessonData,
        QuizAnswers,
        QuizResult,
        InstructorInfo,
        LessonResponse,
        QuestionResponse,
        SubmissionResponse,
        AssignmentResponse,
        CourseResponse,
        AssignmentSubmissions,
        CourseMessage,
        EnrollmentResponse,
        CourseDeleted,
        QuizSubmitted,
        AssignmentSubmitted,
        SubmissionUploadDoc,
        GradeResponse,
        LessonCompleted,
        Analytics,
        CategoryCreateData,
        CategoryResponse,
        CategoryCreated,
        ApproveInstructorData,
        Problem
    )),
    modifiers(&JWTAuth, &API_PREFIX)
)]
pub struct ApiDoc;

pub struct PathPrefix(pub &'static str);
static API_PREFIX: PathPrefix = PathPrefix("/api");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api() -> Vec<Route> {
    routes![
        register,
        login,
        me,
        course_list,
        course_create,
        course_enrolled,
        course_get,
        course_delete,
        course_enroll,
        course_unenroll,
        course_add_lesson,
        course_add_quiz,
        course_add_assignment,
        course_submit_quiz,
        course_submit_assignment,
        course_grade_assignment,
        course_complete_lesson,
        course_students,
        course_submissions,
        admin_analytics,
        admin_users,
        admin_categories,
        admin_category_create,
        admin_category_delete,
        admin_approve_instructor,
    ]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .mount("/", routes![app, app_path])
        .register("/", catchers())
}
