use async_trait::async_trait;

use crate::core::{NewTodo, Todo, TodoError, TodoUpdate};
use crate::storage::TodoStore;
use crate::storage::sqlite::SqliteTodoStore;

/// Reports every update as lost while the row stays put.
pub(crate) struct LosingStore(SqliteTodoStore);

impl LosingStore {
    pub(crate) async fn new_memory() -> Self {
        Self(SqliteTodoStore::new_memory().await.unwrap())
    }
}

#[async_trait]
impl TodoStore for LosingStore {
    async fn list(&self) -> Result<Vec<Todo>, TodoError> {
        self.0.list().await
    }

    async fn find(&self, id: i64) -> Result<Option<Todo>, TodoError> {
        self.0.find(id).await
    }

    async fn exists(&self, id: i64) -> Result<bool, TodoError> {
        self.0.exists(id).await
    }

    async fn insert(
        &self,
        todo: &NewTodo,
        uploaded_image_id: Option<&str>,
    ) -> Result<Todo, TodoError> {
        self.0.insert(todo, uploaded_image_id).await
    }

    async fn update(&self, _update: &TodoUpdate) -> Result<u64, TodoError> {
        Ok(0)
    }

    async fn delete(&self, id: i64) -> Result<u64, TodoError> {
        self.0.delete(id).await
    }
}
