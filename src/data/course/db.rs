use bson::{doc, Bson, Document};
use chrono::Utc;
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{
    problem, AssignmentData, Course, CourseCreateData, LessonData, QuestionData, Submission,
    COURSE_COLLECTION_NAME,
};
use crate::data::filter;
use crate::middleware::paging::PageState;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::Problem;

fn courses(db: &Database) -> Collection<Course> {
    db.collection::<Course>(COURSE_COLLECTION_NAME)
}

#[inline]
fn by_student(student: Uuid) -> Document {
    doc! { "students_enrolled": bson::Uuid::from(student) }
}

/// Id-only projection of a course document.
#[derive(Deserialize)]
struct CourseId {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    id: Uuid,
}

/// Problem for a conditional update that changed nothing. The course may
/// have been deleted since it was read.
fn missed_update(course_exists: bool, id: Uuid, conflict: Problem) -> Problem {
    if course_exists {
        conflict
    } else {
        problem::not_found(id)
    }
}

#[inline]
fn touch() -> Document {
    doc! { "updated": bson::to_bson(&Utc::now()).unwrap_or(Bson::Null) }
}

pub trait CourseDbExt {
    async fn ensure_course_indexes(&self) -> Result<(), mongodb::error::Error>;

    async fn create_course(
        &self,
        auth: &UserRoleToken,
        data: CourseCreateData,
    ) -> Result<Course, Problem>;

    async fn list_courses(&self, page: Option<PageState>) -> Result<Vec<Course>, Problem>;

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, Problem>;

    /// Like `get_course`, but a missing course is a NotFound problem.
    async fn require_course(&self, id: Uuid) -> Result<Course, Problem>;

    async fn courses_of_student(&self, student: Uuid) -> Result<Vec<Course>, Problem>;

    async fn enrolled_course_ids(&self, student: Uuid) -> Result<Vec<Uuid>, Problem>;

    async fn count_enrolled(&self, student: Uuid) -> Result<u64, Problem>;

    async fn add_lesson(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        data: LessonData,
    ) -> Result<Course, Problem>;

    async fn add_question(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        data: QuestionData,
    ) -> Result<Course, Problem>;

    async fn add_assignment(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        data: AssignmentData,
    ) -> Result<Course, Problem>;

    async fn enroll(&self, id: Uuid, auth: &UserRoleToken) -> Result<Course, Problem>;

    async fn unenroll(&self, id: Uuid, auth: &UserRoleToken) -> Result<Course, Problem>;

    async fn delete_course(&self, id: Uuid, auth: &UserRoleToken) -> Result<Course, Problem>;

    async fn submit_assignment(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        assignment: Uuid,
        file_url: String,
    ) -> Result<Submission, Problem>;

    async fn grade_submission(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        assignment: Uuid,
        submission: Uuid,
        grade: f64,
    ) -> Result<Submission, Problem>;

    async fn count_courses(&self) -> Result<u64, Problem>;
}

/// Appends `item` to the array `field` of a course.
async fn push_item(
    db: &Database,
    id: Uuid,
    field: &str,
    item: Bson,
) -> Result<(), Problem> {
    let mut update = Document::new();
    update.insert(field, item);

    let result = courses(db)
        .update_one(
            filter::by_id(id),
            doc! { "$push": update, "$set": touch() },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        // deleted between read and write
        return Err(problem::not_found(id));
    }
    Ok(())
}

impl CourseDbExt for Database {
    async fn ensure_course_indexes(&self) -> Result<(), mongodb::error::Error> {
        let index = IndexModel::builder()
            .keys(doc! { "students_enrolled": 1 })
            .options(IndexOptions::builder().sparse(true).build())
            .build();

        courses(self).create_index(index, None).await?;
        Ok(())
    }

    async fn create_course(
        &self,
        auth: &UserRoleToken,
        data: CourseCreateData,
    ) -> Result<Course, Problem> {
        let course = Course::new(auth, data)?;

        courses(self).insert_one(&course, None).await?;
        tracing::info!("Instructor {} created course {}", auth.user, course.id);

        Ok(course)
    }

    async fn list_courses(&self, page: Option<PageState>) -> Result<Vec<Course>, Problem> {
        let options = page.map(|p| {
            FindOptions::builder()
                .sort(doc! { "created": 1 })
                .skip(p.skip())
                .limit(p.limit())
                .build()
        });

        courses(self)
            .find(None, options)
            .await?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, Problem> {
        courses(self)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn require_course(&self, id: Uuid) -> Result<Course, Problem> {
        self.get_course(id)
            .await?
            .ok_or_else(|| problem::not_found(id))
    }

    async fn courses_of_student(&self, student: Uuid) -> Result<Vec<Course>, Problem> {
        courses(self)
            .find(by_student(student), None)
            .await?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn enrolled_course_ids(&self, student: Uuid) -> Result<Vec<Uuid>, Problem> {
        let options = FindOptions::builder().projection(doc! { "_id": 1 }).build();

        let ids: Vec<CourseId> = self
            .collection::<CourseId>(COURSE_COLLECTION_NAME)
            .find(by_student(student), options)
            .await?
            .try_collect()
            .await?;

        Ok(ids.into_iter().map(|it| it.id).collect())
    }

    async fn count_enrolled(&self, student: Uuid) -> Result<u64, Problem> {
        courses(self)
            .count_documents(by_student(student), None)
            .await
            .map_err(Problem::from)
    }

    async fn add_lesson(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        data: LessonData,
    ) -> Result<Course, Problem> {
        let mut course = self.require_course(id).await?;
        let lesson = bson::to_bson(course.add_lesson(auth, data)?)?;

        push_item(self, id, "lessons", lesson).await?;
        Ok(course)
    }

    async fn add_question(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        data: QuestionData,
    ) -> Result<Course, Problem> {
        let mut course = self.require_course(id).await?;
        let question = bson::to_bson(course.add_question(auth, data)?)?;

        push_item(self, id, "quizzes", question).await?;
        Ok(course)
    }

    async fn add_assignment(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        data: AssignmentData,
    ) -> Result<Course, Problem> {
        let mut course = self.require_course(id).await?;
        let assignment = bson::to_bson(course.add_assignment(auth, data)?)?;

        push_item(self, id, "assignments", assignment).await?;
        Ok(course)
    }

    async fn enroll(&self, id: Uuid, auth: &UserRoleToken) -> Result<Course, Problem> {
        let mut course = self.require_course(id).await?;
        course.enroll(auth)?;

        let student = bson::Uuid::from(auth.user);
        // Membership filter keeps concurrent enrolls from adding a duplicate.
        let result = courses(self)
            .update_one(
                doc! { "_id": bson::Uuid::from(id), "students_enrolled": { "$ne": student } },
                doc! { "$push": { "students_enrolled": student } },
                None,
            )
            .await?;

        if result.modified_count == 0 {
            let exists = self.get_course(id).await?.is_some();
            return Err(missed_update(exists, id, problem::already_enrolled()));
        }
        tracing::info!("Student {} enrolled in course {}", auth.user, id);

        Ok(course)
    }

    async fn unenroll(&self, id: Uuid, auth: &UserRoleToken) -> Result<Course, Problem> {
        let mut course = self.require_course(id).await?;
        course.unenroll(auth)?;

        let student = bson::Uuid::from(auth.user);
        let result = courses(self)
            .update_one(
                doc! { "_id": bson::Uuid::from(id), "students_enrolled": student },
                doc! { "$pull": { "students_enrolled": student } },
                None,
            )
            .await?;

        if result.modified_count == 0 {
            let exists = self.get_course(id).await?.is_some();
            return Err(missed_update(exists, id, problem::not_enrolled()));
        }
        tracing::info!("Student {} left course {}", auth.user, id);

        Ok(course)
    }

    async fn delete_course(&self, id: Uuid, auth: &UserRoleToken) -> Result<Course, Problem> {
        let course = self.require_course(id).await?;
        course.ensure_owner(auth)?;

        // Enrollment only lives on the course, so removing it also drops it
        // from every student's course list.
        courses(self).delete_one(filter::by_id(id), None).await?;
        tracing::info!(
            "Course {} deleted by {}; {} student(s) unenrolled",
            id,
            auth.user,
            course.students_enrolled.len()
        );

        Ok(course)
    }

    async fn submit_assignment(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        assignment: Uuid,
        file_url: String,
    ) -> Result<Submission, Problem> {
        let mut course = self.require_course(id).await?;
        let submission = course.submit_assignment(auth, assignment, file_url)?;

        let result = courses(self)
            .update_one(
                doc! { "_id": bson::Uuid::from(id), "assignments._id": bson::Uuid::from(assignment) },
                doc! {
                    "$push": { "assignments.$.submissions": bson::to_bson(&submission)? },
                    "$set": touch(),
                },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(problem::assignment_not_found(assignment));
        }
        tracing::info!(
            "Student {} submitted {} for assignment {}",
            auth.user,
            submission.id,
            assignment
        );

        Ok(submission)
    }

    async fn grade_submission(
        &self,
        id: Uuid,
        auth: &UserRoleToken,
        assignment: Uuid,
        submission: Uuid,
        grade: f64,
    ) -> Result<Submission, Problem> {
        let mut course = self.require_course(id).await?;
        let graded = course
            .grade_submission(auth, assignment, submission, grade)?
            .clone();

        // Positional update touches only the graded submission, so grading
        // different submissions concurrently never loses a write.
        let options = UpdateOptions::builder()
            .array_filters(vec![
                doc! { "a._id": bson::Uuid::from(assignment) },
                doc! { "s._id": bson::Uuid::from(submission) },
            ])
            .build();

        let result = courses(self)
            .update_one(
                filter::by_id(id),
                doc! {
                    "$set": {
                        "assignments.$[a].submissions.$[s].grade": graded.grade,
                        "assignments.$[a].submissions.$[s].status": bson::to_bson(&graded.status)?,
                        "assignments.$[a].submissions.$[s].graded_at": bson::to_bson(&graded.graded_at)?,
                        "updated": bson::to_bson(&Utc::now())?,
                    }
                },
                options,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(problem::not_found(id));
        }
        tracing::info!(
            "Submission {} graded {} by {}",
            submission,
            grade,
            auth.user
        );

        Ok(graded)
    }

    async fn count_courses(&self) -> Result<u64, Problem> {
        courses(self)
            .count_documents(None, None)
            .await
            .map_err(Problem::from)
    }
}
