use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    Collection, Database,
};

use crate::db::mongo::BLOGS;
use crate::error::ApiError;
use crate::models::blog::{Blog, BlogAuthor, BlogRequest, BlogResponse};
use crate::models::parse_object_id;
use crate::services::user_store::UserStore;

#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn insert(&self, blog: Blog) -> Result<Blog, ApiError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Blog>, ApiError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Blog>, ApiError>;

    /// Replaces the stored document; `None` when the id is unknown.
    async fn replace(&self, blog: &Blog) -> Result<Option<Blog>, ApiError>;

    async fn delete(&self, id: ObjectId) -> Result<bool, ApiError>;

    async fn count(&self) -> Result<u64, ApiError>;
}

pub struct MongoBlogStore {
    collection: Collection<Blog>,
}

impl MongoBlogStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(BLOGS),
        }
    }
}

#[async_trait]
impl BlogStore for MongoBlogStore {
    async fn insert(&self, mut blog: Blog) -> Result<Blog, ApiError> {
        let result = self.collection.insert_one(&blog).await?;
        blog.id = result.inserted_id.as_object_id();
        Ok(blog)
    }

    async fn list(&self) -> Result<Vec<Blog>, ApiError> {
        let cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Blog>, ApiError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn replace(&self, blog: &Blog) -> Result<Option<Blog>, ApiError> {
        let id = blog
            .id
            .ok_or_else(|| ApiError::Internal("Blog has no id".to_string()))?;
        let result = self.collection.replace_one(doc! { "_id": id }, blog).await?;
        Ok((result.matched_count > 0).then(|| blog.clone()))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, ApiError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self) -> Result<u64, ApiError> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn author_id(raw: Option<String>) -> Result<Option<ObjectId>, ApiError> {
    non_empty(raw)
        .map(|raw| parse_object_id(&raw, "author"))
        .transpose()
}

/// Resolves author ids with a single `$in` lookup. Unknown authors render as null.
async fn with_authors(
    users: &dyn UserStore,
    blogs: &[Blog],
) -> Result<Vec<BlogResponse>, ApiError> {
    let mut ids: Vec<ObjectId> = blogs.iter().filter_map(|b| b.author).collect();
    ids.sort();
    ids.dedup();

    let authors: HashMap<ObjectId, BlogAuthor> = users
        .find_by_ids(&ids)
        .await?
        .into_iter()
        .filter_map(|user| {
            user.id.map(|id| {
                (
                    id,
                    BlogAuthor {
                        id: id.to_hex(),
                        name: user.name,
                        email_id: user.email_id,
                    },
                )
            })
        })
        .collect();

    Ok(blogs
        .iter()
        .map(|blog| {
            let author = blog.author.and_then(|id| authors.get(&id).cloned());
            BlogResponse::new(blog, author)
        })
        .collect())
}

async fn single_response(users: &dyn UserStore, blog: &Blog) -> Result<BlogResponse, ApiError> {
    let mut responses = with_authors(users, std::slice::from_ref(blog)).await?;
    responses
        .pop()
        .ok_or_else(|| ApiError::Internal("Blog response missing".to_string()))
}

pub async fn create_blog(
    blogs: &dyn BlogStore,
    users: &dyn UserStore,
    req: BlogRequest,
) -> Result<BlogResponse, ApiError> {
    let (Some(title), Some(content)) = (non_empty(req.title), non_empty(req.content)) else {
        return Err(ApiError::validation("Title and content are required"));
    };

    let now = DateTime::now();
    let blog = Blog {
        id: None,
        title,
        content,
        image: non_empty(req.image),
        author: author_id(req.author)?,
        created_at: now,
        updated_at: now,
    };

    let blog = blogs.insert(blog).await?;
    log::info!("Created blog {:?}", blog.id);
    single_response(users, &blog).await
}

pub async fn list_blogs(
    blogs: &dyn BlogStore,
    users: &dyn UserStore,
) -> Result<Vec<BlogResponse>, ApiError> {
    let all = blogs.list().await?;
    with_authors(users, &all).await
}

pub async fn get_blog(
    blogs: &dyn BlogStore,
    users: &dyn UserStore,
    id: ObjectId,
) -> Result<BlogResponse, ApiError> {
    let blog = blogs
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog not found"))?;
    single_response(users, &blog).await
}

/// Applies the provided fields only; blank values are ignored.
pub async fn update_blog(
    blogs: &dyn BlogStore,
    users: &dyn UserStore,
    id: ObjectId,
    req: BlogRequest,
) -> Result<BlogResponse, ApiError> {
    let mut blog = blogs
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog not found"))?;

    if let Some(title) = non_empty(req.title) {
        blog.title = title;
    }
    if let Some(content) = non_empty(req.content) {
        blog.content = content;
    }
    if let Some(image) = non_empty(req.image) {
        blog.image = Some(image);
    }
    if let Some(author) = author_id(req.author)? {
        blog.author = Some(author);
    }
    blog.updated_at = DateTime::now();

    let blog = blogs
        .replace(&blog)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog not found"))?;
    single_response(users, &blog).await
}

pub async fn delete_blog(blogs: &dyn BlogStore, id: ObjectId) -> Result<(), ApiError> {
    if blogs.delete(id).await? {
        log::info!("Deleted blog {}", id);
        Ok(())
    } else {
        Err(ApiError::not_found("Blog not found"))
    }
}
