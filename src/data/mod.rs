pub mod category;
pub mod course;
pub mod user;

pub mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": bson::Uuid::from(id) }
    }

    #[inline]
    pub fn by_ids(ids: &[Uuid]) -> Document {
        let ids: Vec<bson::Uuid> = ids.iter().copied().map(bson::Uuid::from).collect();
        doc! { "_id": { "$in": ids } }
    }

    #[inline]
    pub fn by_email(email: impl AsRef<str>) -> Document {
        doc! { "email": email.as_ref().to_lowercase() }
    }

    #[inline]
    pub fn by_name(name: impl AsRef<str>) -> Document {
        doc! { "name": name.as_ref() }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use bson::Bson;

        #[test]
        fn ids_are_binary_uuids() {
            let id = Uuid::new_v4();
            match by_id(id).get("_id") {
                Some(Bson::Binary(bin)) => assert_eq!(bin.bytes, id.as_bytes().to_vec()),
                other => panic!("unexpected id filter: {:?}", other),
            }
        }

        #[test]
        fn emails_are_case_insensitive() {
            assert_eq!(
                by_email("Jane@Example.com"),
                doc! { "email": "jane@example.com" }
            );
        }
    }
}
