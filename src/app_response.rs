use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

/// Result envelope shared by every operation and every FFI call.
///
/// Errors are explicit variants; `Ok` carries the JSON payload returned to
/// FFI callers.
#[derive(Debug, Serialize, Deserialize, thiserror::Error)]
pub enum AppResponse {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The server answered with a 4xx other than 429.
    #[error("Rejected by server: {0}")]
    RejectedError(String),
    #[error("Ok: {0}")]
    Ok(String),
}

impl From<lmdb::Error> for AppResponse {
    fn from(err: lmdb::Error) -> Self {
        match err {
            lmdb::Error::NotFound => AppResponse::NotFound("Key or partition not found".to_string()),
            lmdb::Error::MapFull => {
                AppResponse::DatabaseError("Store is full, raise map_size_mb".to_string())
            }
            lmdb::Error::DbsFull => {
                AppResponse::DatabaseError("Too many named partitions".to_string())
            }
            lmdb::Error::Corrupted => AppResponse::DatabaseError("Store is corrupted".to_string()),
            _ => AppResponse::DatabaseError(format!("LMDB error: {err}")),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {err}"))
    }
}

impl From<std::io::Error> for AppResponse {
    fn from(err: std::io::Error) -> Self {
        AppResponse::DatabaseError(format!("IO error: {err}"))
    }
}

impl From<reqwest::Error> for AppResponse {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppResponse::SerializationError(format!("Invalid response body: {err}"))
        } else if let Some(status) = err.status() {
            if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                AppResponse::RejectedError(format!("HTTP {status}: {err}"))
            } else {
                AppResponse::NetworkError(format!("HTTP {status}: {err}"))
            }
        } else {
            AppResponse::NetworkError(err.to_string())
        }
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    /// Wraps a serializable payload into `Ok`.
    pub fn json<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(json) => AppResponse::Ok(json),
            Err(e) => AppResponse::from(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AppResponse::Ok(_))
    }

    /// Connection failures, timeouts, 5xx and 429 may succeed on a later
    /// attempt; everything else will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppResponse::NetworkError(_))
    }
}
