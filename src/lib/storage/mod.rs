pub mod sqlite;

use async_trait::async_trait;
use crate::core::{NewTodo, Todo, TodoError, TodoUpdate};

#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Todo>, TodoError>;
    async fn find(&self, id: i64) -> Result<Option<Todo>, TodoError>;
    async fn exists(&self, id: i64) -> Result<bool, TodoError>;
    async fn insert(
        &self,
        todo: &NewTodo,
        uploaded_image_id: Option<&str>,
    ) -> Result<Todo, TodoError>;
    /// Returns the number of rows written. Zero means the row the caller read
    /// is no longer the row in the store.
    async fn update(&self, update: &TodoUpdate) -> Result<u64, TodoError>;
    async fn delete(&self, id: i64) -> Result<u64, TodoError>;
}
