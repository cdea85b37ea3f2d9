use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a post.
///
/// The in-memory store hands out sequential integers while the PostgreSQL
/// store lets the database generate a UUID, so both shapes serialize as a
/// bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Number(i64),
    Text(String),
}

impl PostId {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            PostId::Number(n) => Some(*n),
            PostId::Text(_) => None,
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Number(n) => write!(f, "{}", n),
            PostId::Text(s) => f.write_str(s),
        }
    }
}

/// Post entity: a title plus optional sensor and location readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A validated post that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewPost {
    /// Attach an identifier and optional creation time
    pub fn into_post(self, id: PostId, created_at: Option<DateTime<Utc>>) -> Post {
        Post {
            id,
            title: self.title,
            acceleration_x: self.acceleration_x,
            acceleration_y: self.acceleration_y,
            acceleration_z: self.acceleration_z,
            latitude: self.latitude,
            longitude: self.longitude,
            created_at,
        }
    }
}

/// Request body for creating a new post.
/// `title` is optional here so that a missing title surfaces as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CreatePostRequest {
    /// Validate the create post request
    pub fn validate(&self) -> Result<(), String> {
        match self.title.as_deref() {
            None => Err("Title is required".to_string()),
            Some("") => Err("Title cannot be empty".to_string()),
            Some(_) => Ok(()),
        }
    }

    /// Validate and convert into a storable `NewPost`.
    /// The title is stored exactly as sent.
    pub fn into_new_post(self) -> Result<NewPost, String> {
        self.validate()?;

        Ok(NewPost {
            title: self.title.unwrap_or_default(),
            acceleration_x: self.acceleration_x,
            acceleration_y: self.acceleration_y,
            acceleration_z: self.acceleration_z,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(title: Option<&str>) -> CreatePostRequest {
        CreatePostRequest {
            title: title.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_post_request_validation() {
        assert!(request(Some("Morning run")).validate().is_ok());

        // Missing title
        assert!(request(None).validate().is_err());

        // Empty title
        assert!(request(Some("")).validate().is_err());

        // Whitespace is still a title
        assert!(request(Some("   ")).validate().is_ok());
    }

    #[test]
    fn test_into_new_post_keeps_title_and_readings() {
        let req = CreatePostRequest {
            title: Some("  Bike ride  ".to_string()),
            acceleration_x: Some(0.12),
            latitude: Some(25.03),
            longitude: Some(121.56),
            ..Default::default()
        };

        let new_post = req.into_new_post().unwrap();

        assert_eq!(new_post.title, "  Bike ride  ");
        assert_eq!(new_post.acceleration_x, Some(0.12));
        assert_eq!(new_post.acceleration_y, None);
        assert_eq!(new_post.acceleration_z, None);
        assert_eq!(new_post.latitude, Some(25.03));
        assert_eq!(new_post.longitude, Some(121.56));
    }

    #[test]
    fn test_create_post_request_deserialization() {
        let json = r#"{"title":"Walk","acceleration_x":1.5,"acceleration_y":-0.25,"acceleration_z":9.81,"latitude":35.68,"longitude":139.69}"#;
        let request: CreatePostRequest =
            serde_json::from_str(json).expect("Failed to deserialize CreatePostRequest");

        assert_eq!(request.title.as_deref(), Some("Walk"));
        assert_eq!(request.acceleration_z, Some(9.81));
        assert_eq!(request.longitude, Some(139.69));

        // Title only, null readings
        let json = r#"{"title":"Walk","latitude":null}"#;
        let request: CreatePostRequest =
            serde_json::from_str(json).expect("Failed to deserialize CreatePostRequest");
        assert_eq!(request.latitude, None);
        assert_eq!(request.acceleration_x, None);

        // Missing title still parses, validation rejects it later
        let request: CreatePostRequest = serde_json::from_str("{}").unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_post_serialization_with_null_readings() {
        let post = NewPost {
            title: "Test Post".to_string(),
            acceleration_x: None,
            acceleration_y: None,
            acceleration_z: None,
            latitude: None,
            longitude: None,
        }
        .into_post(PostId::Number(1), None);

        let json = serde_json::to_string(&post).expect("Failed to serialize post");
        let expected = r#"{"id":1,"title":"Test Post","acceleration_x":null,"acceleration_y":null,"acceleration_z":null,"latitude":null,"longitude":null}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_post_serialization_with_store_id_and_timestamp() {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let post = Post {
            id: PostId::Text("123e4567-e89b-12d3-a456-426614174000".to_string()),
            title: "Test Post".to_string(),
            acceleration_x: Some(0.5),
            acceleration_y: None,
            acceleration_z: None,
            latitude: None,
            longitude: None,
            created_at: Some(created_at),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["id"], "123e4567-e89b-12d3-a456-426614174000");
        assert_eq!(value["acceleration_x"], 0.5);
        assert_eq!(value["created_at"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_post_id_deserialization() {
        let id: PostId = serde_json::from_str("7").unwrap();
        assert_eq!(id, PostId::Number(7));
        assert_eq!(id.as_number(), Some(7));

        let id: PostId = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(id, PostId::Text("abc".to_string()));
        assert_eq!(id.as_number(), None);
        assert_eq!(id.to_string(), "abc");
    }
}
