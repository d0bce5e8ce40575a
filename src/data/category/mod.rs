use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::resp::problem::{is_duplicate_key, problems, Problem};

pub static CATEGORY_COLLECTION_NAME: &str = "categories";

/// A flat tag. Courses copy the name; nothing references the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(value: Category) -> Self {
        CategoryResponse {
            id: value.id,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryCreateData {
    pub name: String,
}

impl CategoryCreateData {
    pub fn name(&self) -> Result<&str, Problem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(problems::invalid_input("name", "Category name is required"));
        }
        Ok(name)
    }
}

#[inline]
fn already_exists(name: &str) -> Problem {
    problems::conflict("Category already exists")
        .insert_str("name", name)
        .to_owned()
}

pub trait CategoryDbExt {
    async fn ensure_category_indexes(&self) -> Result<(), mongodb::error::Error>;

    async fn create_category(&self, data: CategoryCreateData) -> Result<Category, Problem>;

    async fn list_categories(&self) -> Result<Vec<Category>, Problem>;

    /// Deletes unconditionally; courses keep the category name they copied.
    async fn delete_category(&self, id: Uuid) -> Result<Option<Category>, Problem>;
}

impl CategoryDbExt for Database {
    async fn ensure_category_indexes(&self) -> Result<(), mongodb::error::Error> {
        let index = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection::<Category>(CATEGORY_COLLECTION_NAME)
            .create_index(index, None)
            .await?;
        Ok(())
    }

    async fn create_category(&self, data: CategoryCreateData) -> Result<Category, Problem> {
        let name = data.name()?;
        let collection = self.collection::<Category>(CATEGORY_COLLECTION_NAME);

        if collection
            .find_one(filter::by_name(name), None)
            .await?
            .is_some()
        {
            return Err(already_exists(name));
        }

        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created: Utc::now(),
        };

        match collection.insert_one(&category, None).await {
            Ok(_) => {
                tracing::info!("Created category '{}'", category.name);
                Ok(category)
            }
            Err(e) if is_duplicate_key(&e) => Err(already_exists(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>, Problem> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();

        self.collection::<Category>(CATEGORY_COLLECTION_NAME)
            .find(None, options)
            .await?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn delete_category(&self, id: Uuid) -> Result<Option<Category>, Problem> {
        let removed = self
            .collection::<Category>(CATEGORY_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await?;

        if let Some(category) = &removed {
            tracing::info!("Deleted category '{}'", category.name);
        }
        Ok(removed)
    }
}
