use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use crypto::util::fixed_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::role::Role;
use crate::security::{salt_from_bytes, Security};
use crate::util::{bytes_as_binary, uuid_list_as_binary};

pub mod db;

/// Salted bcrypt hash of the SHA-256 digest of a password.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub cost: u32,
    #[serde(with = "bytes_as_binary")]
    pub salt: Vec<u8>,
    #[serde(with = "bytes_as_binary")]
    pub hash: Vec<u8>,
}

fn bcrypt_digest(cost: u32, salt: &[u8; 16], password: &str) -> [u8; 24] {
    let mut sha = Sha256::new();
    sha2::Digest::update(&mut sha, password.as_bytes());

    let mut pw_hash: [u8; 24] = [0; 24];
    bcrypt(cost, salt, sha.finalize().as_slice(), &mut pw_hash);
    pw_hash
}

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, cost: u32) -> PasswordHash {
        let salt = Security::random_salt();
        let cost = cost.clamp(4, 31);

        PasswordHash {
            cost,
            salt: salt.to_vec(),
            hash: bcrypt_digest(cost, &salt, password.as_ref()).to_vec(),
        }
    }

    pub fn verify(&self, password: impl AsRef<str>) -> bool {
        let salt = match salt_from_bytes(&self.salt) {
            Some(it) => it,
            None => {
                tracing::warn!("stored password salt has an invalid length");
                return false;
            }
        };
        if !(4..32).contains(&self.cost) {
            tracing::warn!("stored password cost {} is out of range", self.cost);
            return false;
        }

        let candidate = bcrypt_digest(self.cost, &salt, password.as_ref());
        fixed_time_eq(&candidate, &self.hash)
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordHash(cost: {})", self.cost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub pw_hash: PasswordHash,
    pub role: Role,
    pub is_approved: bool,
    #[serde(default, with = "uuid_list_as_binary")]
    pub completed_lessons: Vec<Uuid>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: impl ToString,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
        role: Role,
        password_cost: u32,
    ) -> User {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new {} with UUID: {}", role, id);

        User {
            id,
            name: name.to_string(),
            email: email.as_ref().to_lowercase(),
            pw_hash: PasswordHash::new(password, password_cost),
            role,
            is_approved: role.approved_by_default(),
            completed_lessons: vec![],
            created: Utc::now(),
        }
    }

    /// Instructors can't authenticate until an admin approves them.
    pub fn can_log_in(&self) -> bool {
        self.role != Role::Instructor || self.is_approved
    }
}

/// Public part of a user record; never includes password material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_approved: bool,
    pub completed_lessons: Vec<Uuid>,
    pub created: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        UserResponse {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
            is_approved: value.is_approved,
            completed_lessons: value.completed_lessons,
            created: value.created,
        }
    }
}

/// Profile of the calling user including the derived enrolled-course list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub enrolled_courses: Vec<Uuid>,
}

/// Projection used wherever a course shows who a user is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(value: &User) -> Self {
        UserSummary {
            id: value.id,
            name: value.name.clone(),
            email: value.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_original() {
        let hash = PasswordHash::new("correct horse", 4);

        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("correct horse "));
        assert!(!hash.verify(""));
    }

    #[test]
    fn password_hashes_are_salted() {
        let a = PasswordHash::new("same password", 4);
        let b = PasswordHash::new("same password", 4);

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert!(a.verify("same password") && b.verify("same password"));
    }

    #[test]
    fn corrupt_hashes_never_verify() {
        let mut hash = PasswordHash::new("pw", 4);
        hash.salt.truncate(3);
        assert!(!hash.verify("pw"));

        let mut hash = PasswordHash::new("pw", 4);
        hash.cost = 40;
        assert!(!hash.verify("pw"));
    }

    #[test]
    fn approval_defaults_follow_role() {
        let student = User::new("S", "S@Example.com", "pw", Role::Student, 4);
        let instructor = User::new("I", "i@example.com", "pw", Role::Instructor, 4);
        let admin = User::new("A", "a@example.com", "pw", Role::Admin, 4);

        assert_eq!(student.email, "s@example.com");
        assert!(student.is_approved && student.can_log_in());
        assert!(admin.is_approved && admin.can_log_in());
        assert!(!instructor.is_approved);
        assert!(!instructor.can_log_in());
    }

    #[test]
    fn user_documents_keep_password_out_of_responses() {
        let user = User::new("Jane", "jane@example.com", "pw", Role::Student, 4);
        let document = bson::to_document(&user).expect("serializable user");
        assert!(document.contains_key("pw_hash"));

        let back: User = bson::from_document(document).expect("deserializable user");
        assert!(back.pw_hash.verify("pw"));

        let json = serde_json::to_value(UserResponse::from(back)).unwrap();
        assert!(json.get("pwHash").is_none());
        assert_eq!(json["isApproved"], true);
        assert_eq!(json["role"], "student");
    }
}
