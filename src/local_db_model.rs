//! Data model definitions for the review and favorite partitions.
//!
//! Every object written to the store is one of these types serialized as JSON.
//! [`Review`] is shared by the main and offline partitions; the two id spaces
//! never mix inside one partition.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;

/// A restaurant review as stored in `main-reviews` or `offline-reviews`.
///
/// `id` is the server-assigned id for posted reviews and the local sequence
/// number for queued ones.
///
/// ```rust
/// use restaurant_offline_core::local_db_model::Review;
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let review = Review {
///     id: 0,
///     restaurant_id: 3,
///     name: "Ana".to_string(),
///     rating: "5".to_string(),
///     comments: "Great arepas".to_string(),
///     created_at: now,
///     updated_at: now,
/// };
///
/// let json = serde_json::to_value(&review)?;
/// assert!(json.get("createdAt").is_some());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Review {
    pub id: u64,
    pub restaurant_id: u64,
    pub name: String,
    pub rating: String,
    pub comments: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Presence in `fav-restaurants` marks the restaurant as favorite.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteMarker {
    pub id: u64,
}

/// Raw review form fields, as typed by the user.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ReviewForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub comments: String,
}

impl ReviewForm {
    pub fn new(name: impl Into<String>, rating: impl Into<String>, comments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rating: rating.into(),
            comments: comments.into(),
        }
    }

    /// Required-field check. Nothing else about the values is validated.
    pub fn validate(&self) -> Result<(), AppResponse> {
        let missing = [&self.name, &self.rating, &self.comments]
            .iter()
            .any(|field| field.trim().is_empty());
        if missing {
            return Err(AppResponse::ValidationError("All fields are required".to_string()));
        }
        Ok(())
    }

    pub fn into_new_review(self, restaurant_id: u64) -> NewReview {
        NewReview {
            restaurant_id,
            name: self.name,
            rating: self.rating,
            comments: self.comments,
        }
    }
}

/// Body of `POST <reviews_url>`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NewReview {
    pub restaurant_id: u64,
    pub name: String,
    pub rating: String,
    pub comments: String,
}

impl From<&Review> for NewReview {
    fn from(review: &Review) -> Self {
        NewReview {
            restaurant_id: review.restaurant_id,
            name: review.name.clone(),
            rating: review.rating.clone(),
            comments: review.comments.clone(),
        }
    }
}

/// The part of the server's reply to a review POST that the store keeps.
///
/// Timestamps are left raw; the server has been seen to send epoch millis as
/// numbers and as strings, and ISO dates.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostedReview {
    pub id: u64,
    #[serde(rename = "createdAt")]
    pub created_at: JsonValue,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<JsonValue>,
}

impl PostedReview {
    /// Builds the stored entity from the submitted body and the server reply.
    pub fn into_review(self, submitted: &NewReview) -> Result<Review, AppResponse> {
        let created_at = normalize_timestamp(&self.created_at).ok_or_else(|| {
            AppResponse::SerializationError(format!("Unrecognized createdAt value: {}", self.created_at))
        })?;
        let updated_at = self
            .updated_at
            .as_ref()
            .and_then(normalize_timestamp)
            .unwrap_or(created_at);

        Ok(Review {
            id: self.id,
            restaurant_id: submitted.restaurant_id,
            name: submitted.name.clone(),
            rating: submitted.rating.clone(),
            comments: submitted.comments.clone(),
            created_at,
            updated_at,
        })
    }
}

/// Normalizes a server timestamp into UTC.
///
/// Accepts epoch milliseconds (number or numeric string) and RFC 3339 strings.
pub fn normalize_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(ms).single();
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}
