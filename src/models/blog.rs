use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::to_rfc3339;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    /// HTML body
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize)]
pub struct BlogRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogAuthor {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub author: Option<BlogAuthor>,
    pub created_at: String,
    pub updated_at: String,
}

impl BlogResponse {
    pub fn new(blog: &Blog, author: Option<BlogAuthor>) -> Self {
        BlogResponse {
            id: blog.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: blog.title.clone(),
            content: blog.content.clone(),
            image: blog.image.clone(),
            author,
            created_at: to_rfc3339(blog.created_at),
            updated_at: to_rfc3339(blog.updated_at),
        }
    }
}
