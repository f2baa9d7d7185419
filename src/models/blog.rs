use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file_name: Option<String>,
    pub status: BlogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    Published,
}

impl BlogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogDto {
    #[validate(length(min = 1, message = "Title and content are required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Title and content are required"))]
    pub content: String,
    pub excerpt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<BlogStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogDto {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<BlogStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blog_status_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&BlogStatus::Published).unwrap(),
            "\"published\""
        );
        assert_eq!(
            serde_json::from_str::<BlogStatus>("\"draft\"").unwrap(),
            BlogStatus::Draft
        );
    }
}
