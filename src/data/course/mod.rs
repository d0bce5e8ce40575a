use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::util::uuid_list_as_binary;

pub mod db;
pub mod quiz;
pub mod view;

pub static COURSE_COLLECTION_NAME: &str = "courses";

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use uuid::Uuid;

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Course").insert("id", id).to_owned()
    }

    #[inline]
    pub fn assignment_not_found(id: Uuid) -> Problem {
        problems::not_found("Assignment").insert("id", id).to_owned()
    }

    #[inline]
    pub fn submission_not_found(id: Uuid) -> Problem {
        problems::not_found("Submission").insert("id", id).to_owned()
    }

    #[inline]
    pub fn lesson_not_found(id: Uuid) -> Problem {
        problems::not_found("Lesson").insert("id", id).to_owned()
    }

    #[inline]
    pub fn not_owner() -> Problem {
        problems::forbidden("Access denied: You are not the instructor of this course")
    }

    #[inline]
    pub fn already_enrolled() -> Problem {
        problems::conflict("Already enrolled in this course")
    }

    #[inline]
    pub fn not_enrolled() -> Problem {
        problems::conflict("You are not enrolled in this course")
    }

    #[inline]
    pub fn enrollment_required() -> Problem {
        problems::forbidden("You must be enrolled in this course")
    }

    #[inline]
    pub fn no_file() -> Problem {
        problems::invalid_input("file", "No file was uploaded")
    }

    #[inline]
    pub fn unsupported_file_type(content_type: Option<String>) -> Problem {
        problems::invalid_input("file", "Only PDF or Word documents are allowed")
            .insert("contentType", content_type)
            .to_owned()
    }

    #[inline]
    pub fn file_too_large(limit: u64) -> Problem {
        problems::invalid_input(
            "file",
            format!(
                "File is too large. Maximum size is {}MB.",
                limit / (1024 * 1024)
            ),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Pdf,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub title: String,
    pub content_url: String,
    pub content_type: ContentType,
}

/// A single quiz question. A course's questions form its quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SubmissionStatus {
    Pending,
    Graded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub student: Uuid,
    pub file_url: String,
    #[serde(default)]
    pub grade: Option<f64>,
    pub status: SubmissionStatus,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn new(student: Uuid, file_url: impl ToString) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            student,
            file_url: file_url.to_string(),
            grade: None,
            status: SubmissionStatus::Pending,
            submitted_at: Utc::now(),
            graded_at: None,
        }
    }

    /// Pending -> Graded. Re-grading overwrites the grade and stays Graded.
    pub fn grade(&mut self, grade: f64) {
        self.grade = Some(grade);
        self.status = SubmissionStatus::Graded;
        self.graded_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Free-text category name. Not a reference: deleting a category leaves it as is.
    pub category: String,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub instructor: Uuid,

    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub quizzes: Vec<Question>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// Only record of enrollment; a student's course list is queried from here.
    #[serde(default, with = "uuid_list_as_binary")]
    pub students_enrolled: Vec<Uuid>,

    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

fn required(field: &str, value: &str) -> Result<String, Problem> {
    let value = value.trim();
    if value.is_empty() {
        return Err(problems::invalid_input(
            field,
            format!("Field '{}' is required", field),
        ));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CourseCreateData {
    pub title: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonData {
    pub title: String,
    #[serde(default)]
    pub content_url: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: u32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignmentData {
    pub title: String,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradeData {
    pub course_id: Uuid,
    pub assignment_id: Uuid,
    pub submission_id: Uuid,
    /// Number or numeric string.
    #[serde(default)]
    #[schema(value_type = f64)]
    pub grade: Value,
}

impl GradeData {
    pub fn parse_grade(&self) -> Result<f64, Problem> {
        let grade = match &self.grade {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
            Value::Null => {
                return Err(problems::invalid_input(
                    "grade",
                    "Grade is required and must be a valid number",
                ))
            }
            Value::String(_) => {
                return Err(problems::invalid_input(
                    "grade",
                    "Grade is required and must be a valid number",
                ))
            }
            _ => None,
        };

        match grade {
            Some(g) if g.is_finite() && g >= 0.0 => Ok(g),
            _ => Err(problems::invalid_input(
                "grade",
                "Grade must be a valid positive number",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonData {
    pub course_id: Uuid,
    pub lesson_id: Uuid,
}

impl Course {
    /// Only instructors create courses; the creator owns the course for good.
    pub fn new(auth: &UserRoleToken, data: CourseCreateData) -> Result<Course, Problem> {
        if auth.role != Role::Instructor {
            return Err(problems::forbidden(
                "Access denied. Only instructors can create courses.",
            ));
        }

        let now = Utc::now();
        Ok(Course {
            id: Uuid::new_v4(),
            title: required("title", &data.title)?,
            description: required("description", &data.description)?,
            category: required("category", &data.category)?,
            instructor: auth.user,
            lessons: vec![],
            quizzes: vec![],
            assignments: vec![],
            students_enrolled: vec![],
            created: now,
            updated: now,
        })
    }

    pub fn is_owner(&self, auth: &UserRoleToken) -> bool {
        self.instructor == auth.user
    }

    pub fn ensure_owner(&self, auth: &UserRoleToken) -> Result<(), Problem> {
        if !self.is_owner(auth) {
            tracing::debug!(
                "user {} tried to modify course {} owned by {}",
                auth.user,
                self.id,
                self.instructor
            );
            return Err(problem::not_owner());
        }
        Ok(())
    }

    pub fn is_enrolled(&self, student: Uuid) -> bool {
        self.students_enrolled.contains(&student)
    }

    pub fn ensure_enrolled(&self, auth: &UserRoleToken) -> Result<(), Problem> {
        if !self.is_enrolled(auth.user) {
            return Err(problem::enrollment_required());
        }
        Ok(())
    }

    pub fn lesson(&self, id: Uuid) -> Option<&Lesson> {
        self.lessons.iter().find(|it| it.id == id)
    }

    pub fn assignment(&self, id: Uuid) -> Result<&Assignment, Problem> {
        self.assignments
            .iter()
            .find(|it| it.id == id)
            .ok_or_else(|| problem::assignment_not_found(id))
    }

    fn assignment_mut(&mut self, id: Uuid) -> Result<&mut Assignment, Problem> {
        self.assignments
            .iter_mut()
            .find(|it| it.id == id)
            .ok_or_else(|| problem::assignment_not_found(id))
    }

    pub fn add_lesson(&mut self, auth: &UserRoleToken, data: LessonData) -> Result<&Lesson, Problem> {
        self.ensure_owner(auth)?;

        self.lessons.push(Lesson {
            id: Uuid::new_v4(),
            title: required("title", &data.title)?,
            content_url: data.content_url.trim().to_string(),
            content_type: data.content_type,
        });
        self.updated = Utc::now();

        Ok(&self.lessons[self.lessons.len() - 1])
    }

    pub fn add_question(
        &mut self,
        auth: &UserRoleToken,
        data: QuestionData,
    ) -> Result<&Question, Problem> {
        self.ensure_owner(auth)?;

        let question = required("question", &data.question)?;
        if data.options.len() < 2 {
            return Err(problems::invalid_input(
                "options",
                "A question needs at least two options",
            ));
        }
        if data.correct_answer_index as usize >= data.options.len() {
            return Err(problems::invalid_input(
                "correctAnswerIndex",
                "Correct answer index must point to one of the options",
            ));
        }

        self.quizzes.push(Question {
            id: Uuid::new_v4(),
            question,
            options: data.options,
            correct_answer_index: data.correct_answer_index,
        });
        self.updated = Utc::now();

        Ok(&self.quizzes[self.quizzes.len() - 1])
    }

    pub fn add_assignment(
        &mut self,
        auth: &UserRoleToken,
        data: AssignmentData,
    ) -> Result<&Assignment, Problem> {
        self.ensure_owner(auth)?;

        self.assignments.push(Assignment {
            id: Uuid::new_v4(),
            title: required("title", &data.title)?,
            instructions: data.instructions,
            submissions: vec![],
        });
        self.updated = Utc::now();

        Ok(&self.assignments[self.assignments.len() - 1])
    }

    /// Adds a student to the course. A student appears at most once.
    pub fn enroll(&mut self, auth: &UserRoleToken) -> Result<(), Problem> {
        auth.require_role(Role::Student)?;

        if self.is_enrolled(auth.user) {
            return Err(problem::already_enrolled());
        }
        self.students_enrolled.push(auth.user);
        Ok(())
    }

    pub fn unenroll(&mut self, auth: &UserRoleToken) -> Result<(), Problem> {
        if !self.is_enrolled(auth.user) {
            return Err(problem::not_enrolled());
        }
        self.students_enrolled.retain(|it| *it != auth.user);
        Ok(())
    }

    /// Records a Pending submission of an already staged file.
    pub fn submit_assignment(
        &mut self,
        auth: &UserRoleToken,
        assignment: Uuid,
        file_url: impl ToString,
    ) -> Result<Submission, Problem> {
        self.ensure_enrolled(auth)?;

        let submission = Submission::new(auth.user, file_url);
        self.assignment_mut(assignment)?
            .submissions
            .push(submission.clone());

        Ok(submission)
    }

    pub fn grade_submission(
        &mut self,
        auth: &UserRoleToken,
        assignment: Uuid,
        submission: Uuid,
        grade: f64,
    ) -> Result<&Submission, Problem> {
        self.ensure_owner(auth)?;

        let target = self
            .assignment_mut(assignment)?
            .submissions
            .iter_mut()
            .find(|it| it.id == submission)
            .ok_or_else(|| problem::submission_not_found(submission))?;

        target.grade(grade);
        Ok(target)
    }
}
