use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Trek {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub duration_days: i32,
    pub price: f64,
    pub location: String,
    pub max_group_size: i32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
        }
    }
}

pub const DEFAULT_MAX_GROUP_SIZE: i32 = 10;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrekDto {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, message = "Duration must be at least one day"))]
    pub duration_days: i32,
    #[validate(custom = "validate_price")]
    pub price: f64,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    pub max_group_size: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrekDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, message = "Duration must be at least one day"))]
    pub duration_days: Option<i32>,
    #[validate(custom = "validate_price")]
    pub price: Option<f64>,
    pub location: Option<String>,
    pub max_group_size: Option<i32>,
    pub is_active: Option<bool>,
}

pub fn validate_price(price: f64) -> Result<(), ValidationError> {
    if price > 0.0 {
        Ok(())
    } else {
        let mut error = ValidationError::new("price");
        error.message = Some("Price must be greater than zero".into());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&Difficulty::Moderate).unwrap(),
            "\"moderate\""
        );
        assert_eq!(
            serde_json::from_str::<Difficulty>("\"hard\"").unwrap(),
            Difficulty::Hard
        );
    }

    #[test]
    fn price_must_be_positive() {
        assert!(validate_price(0.0).is_err());
        assert!(validate_price(-12.5).is_err());
        assert!(validate_price(0.5).is_ok());
        assert!(validate_price(1200.0).is_ok());
    }
}
