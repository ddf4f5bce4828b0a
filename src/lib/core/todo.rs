use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: i64,
    pub description: String,
    pub created_date: NaiveDateTime,
    pub uploaded_image_id: Option<String>,
}

/// A validated create submission, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTodo {
    pub description: String,
    pub created_date: NaiveDateTime,
}

/// A validated edit submission. Carries no image reference, so an edit can
/// never rebind `uploaded_image_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoUpdate {
    pub id: i64,
    pub description: String,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Detail projection of a todo. `upload_pic_url` is empty when the todo has
/// no image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoViewModel {
    pub id: i64,
    pub description: String,
    pub created_date: NaiveDateTime,
    pub upload_pic_url: String,
}

impl TodoViewModel {
    pub fn new(todo: Todo, upload_pic_url: String) -> Self {
        Self {
            id: todo.id,
            description: todo.description,
            created_date: todo.created_date,
            upload_pic_url,
        }
    }
}
