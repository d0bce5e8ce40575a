//! JSON shapes of course records returned by the API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    Assignment, ContentType, Course, Lesson, Question, Submission, SubmissionStatus,
};
use crate::data::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstructorInfo {
    pub id: Uuid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonResponse {
    pub id: Uuid,
    pub title: String,
    pub content_url: String,
    pub content_type: ContentType,
}

impl From<&Lesson> for LessonResponse {
    fn from(value: &Lesson) -> Self {
        LessonResponse {
            id: value.id,
            title: value.title.clone(),
            content_url: value.content_url.clone(),
            content_type: value.content_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    /// Only shown to the course instructor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer_index: Option<u32>,
}

impl QuestionResponse {
    fn new(value: &Question, full: bool) -> Self {
        QuestionResponse {
            id: value.id,
            question: value.question.clone(),
            options: value.options.clone(),
            correct_answer_index: full.then_some(value.correct_answer_index),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub student: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_info: Option<UserSummary>,
    pub file_url: String,
    pub grade: Option<f64>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl SubmissionResponse {
    pub fn new(value: &Submission, student_info: Option<UserSummary>) -> Self {
        SubmissionResponse {
            id: value.id,
            student: value.student,
            student_info,
            file_url: value.file_url.clone(),
            grade: value.grade,
            status: value.status,
            submitted_at: value.submitted_at,
            graded_at: value.graded_at,
        }
    }
}

impl From<&Submission> for SubmissionResponse {
    fn from(value: &Submission) -> Self {
        SubmissionResponse::new(value, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub title: String,
    pub instructions: String,
    /// Only shown to the course instructor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<SubmissionResponse>>,
}

impl AssignmentResponse {
    fn new(value: &Assignment, full: bool) -> Self {
        AssignmentResponse {
            id: value.id,
            title: value.title.clone(),
            instructions: value.instructions.clone(),
            submissions: full.then(|| value.submissions.iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub instructor: InstructorInfo,
    pub lessons: Vec<LessonResponse>,
    pub quizzes: Vec<QuestionResponse>,
    pub assignments: Vec<AssignmentResponse>,
    pub students_enrolled: Vec<Uuid>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl CourseResponse {
    /// `full` views include answer keys and submissions and are meant for
    /// the owning instructor only.
    pub fn new(course: &Course, instructor_name: Option<String>, full: bool) -> Self {
        CourseResponse {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            category: course.category.clone(),
            instructor: InstructorInfo {
                id: course.instructor,
                name: instructor_name,
            },
            lessons: course.lessons.iter().map(Into::into).collect(),
            quizzes: course
                .quizzes
                .iter()
                .map(|q| QuestionResponse::new(q, full))
                .collect(),
            assignments: course
                .assignments
                .iter()
                .map(|a| AssignmentResponse::new(a, full))
                .collect(),
            students_enrolled: course.students_enrolled.clone(),
            created: course.created,
            updated: course.updated,
        }
    }

    pub fn owned(course: &Course) -> Self {
        Self::new(course, None, true)
    }
}

/// Submissions of one assignment, for the instructor's grading view.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSubmissions {
    pub assignment_title: String,
    pub assignment_id: Uuid,
    pub submissions: Vec<SubmissionResponse>,
}

impl Course {
    /// Student ids referenced by any submission.
    pub fn submitting_students(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .assignments
            .iter()
            .flat_map(|a| a.submissions.iter().map(|s| s.student))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn submissions_by_assignment(
        &self,
        students: &HashMap<Uuid, UserSummary>,
    ) -> Vec<AssignmentSubmissions> {
        self.assignments
            .iter()
            .map(|a| AssignmentSubmissions {
                assignment_title: a.title.clone(),
                assignment_id: a.id,
                submissions: a
                    .submissions
                    .iter()
                    .map(|s| SubmissionResponse::new(s, students.get(&s.student).cloned()))
                    .collect(),
            })
            .collect()
    }

    /// Enrolled students in enrollment order; ids without a user record are skipped.
    pub fn enrolled_students(&self, students: &HashMap<Uuid, UserSummary>) -> Vec<UserSummary> {
        self.students_enrolled
            .iter()
            .filter_map(|id| students.get(id).cloned())
            .collect()
    }
}
