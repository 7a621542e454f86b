//! Deterministic bookstore backend.
//!
//! Every operation answers with a fixed message; only the shelf id is echoed
//! back. Empty string fields are left out of responses, the way proto3 JSON
//! does for default values.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::backend::{BusinessError, DispatchRequest, Dispatcher};

#[derive(Debug, Serialize)]
struct Shelf {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    theme: String,
}

#[derive(Debug, Serialize)]
struct Book {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    title: String,
}

impl Shelf {
    fn new(id: impl Into<String>, theme: &str) -> Self {
        Self {
            id: id.into(),
            theme: theme.to_string(),
        }
    }
}

/// Toy bookstore dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bookstore;

impl Bookstore {
    pub fn new() -> Self {
        Self
    }

    /// Shelf id from the message (path variables are already merged in),
    /// falling back to the raw path variable. Absent means empty.
    fn shelf_id(request: &DispatchRequest) -> Result<String, BusinessError> {
        let raw = match request.message.get("shelf_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) | None => request
                .path_variables
                .get("shelf_id")
                .cloned()
                .unwrap_or_default(),
            Some(other) => {
                return Err(BusinessError::invalid_argument(format!(
                    "shelf_id must be an integer, got {other}"
                )))
            }
        };
        if raw.is_empty() {
            return Ok(raw);
        }
        raw.parse::<i64>()
            .map(|id| id.to_string())
            .map_err(|_| BusinessError::invalid_argument(format!("shelf_id `{raw}` is not an integer")))
    }

    fn to_value<T: Serialize>(message: T) -> Result<Value, BusinessError> {
        serde_json::to_value(message)
            .map_err(|e| BusinessError::new(tonic::Code::Internal, e.to_string()))
    }
}

#[async_trait]
impl Dispatcher for Bookstore {
    async fn dispatch(&self, request: DispatchRequest) -> Result<Value, BusinessError> {
        match request.operation.as_str() {
            "GetShelf" => Self::to_value(Shelf::new(Self::shelf_id(&request)?, "Unknown Shelf")),
            "ListShelves" => Ok(json!({
                "shelves": [
                    Shelf::new("123", "Shakspeare"),
                    Shelf::new("124", "Hamlet"),
                ]
            })),
            "CreateShelf" => Self::to_value(Shelf::new("1", "New Shelf")),
            "CreateBook" => Self::to_value(Book {
                id: Self::shelf_id(&request)?,
                title: "New Book".to_string(),
            }),
            "GetBook" => Self::to_value(Book {
                id: Self::shelf_id(&request)?,
                title: "Unknown Book".to_string(),
            }),
            "DeleteBook" => {
                Self::shelf_id(&request)?;
                Ok(json!({}))
            }
            other => Err(BusinessError::unimplemented(format!(
                "operation `{other}` is not implemented"
            ))),
        }
    }
}
