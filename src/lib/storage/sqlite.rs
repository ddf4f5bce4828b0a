use async_trait::async_trait;
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};

use crate::core::{NewTodo, Todo, TodoError, TodoUpdate};
use crate::storage::TodoStore;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const SELECT_TODO: &str = "SELECT id, description, created_date, uploaded_image_id FROM Todo";

#[derive(Clone)]
pub struct SqliteTodoStore {
    pool: SqlitePool,
}

impl SqliteTodoStore {
    /// Opens (creating if needed) the database at `url` and brings its schema
    /// up to date.
    pub async fn new(url: &str) -> Result<Self, TodoError> {
        if !Sqlite::database_exists(url).await? {
            #[cfg(feature = "tracing")]
            info!(url = %url, "Creating database");
            Sqlite::create_database(url).await?;
        }
        let pool = SqlitePool::connect(url).await?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database. Every pooled connection to
    /// `sqlite::memory:` opens its own database, so the pool holds exactly one
    /// connection and never recycles it.
    pub async fn new_memory() -> Result<Self, TodoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, TodoError> {
        MIGRATOR.run(&pool).await?;
        #[cfg(feature = "tracing")]
        debug!("Todo schema is up to date");
        Ok(Self { pool })
    }
}

#[async_trait]
impl TodoStore for SqliteTodoStore {
    async fn list(&self) -> Result<Vec<Todo>, TodoError> {
        let todos = sqlx::query_as::<_, Todo>(&format!("{SELECT_TODO} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(todos)
    }

    async fn find(&self, id: i64) -> Result<Option<Todo>, TodoError> {
        let todo = sqlx::query_as::<_, Todo>(&format!("{SELECT_TODO} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(todo)
    }

    async fn exists(&self, id: i64) -> Result<bool, TodoError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM Todo WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, todo)))]
    async fn insert(
        &self,
        todo: &NewTodo,
        uploaded_image_id: Option<&str>,
    ) -> Result<Todo, TodoError> {
        let result = sqlx::query(
            "INSERT INTO Todo (description, created_date, uploaded_image_id) VALUES (?, ?, ?)",
        )
        .bind(&todo.description)
        .bind(todo.created_date)
        .bind(uploaded_image_id)
        .execute(&self.pool)
        .await?;
        Ok(Todo {
            id: result.last_insert_rowid(),
            description: todo.description.clone(),
            created_date: todo.created_date,
            uploaded_image_id: uploaded_image_id.map(str::to_string),
        })
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, update), fields(todo_id = update.id)))]
    async fn update(&self, update: &TodoUpdate) -> Result<u64, TodoError> {
        let result = sqlx::query("UPDATE Todo SET description = ?, created_date = ? WHERE id = ?")
            .bind(&update.description)
            .bind(update.created_date)
            .bind(update.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn delete(&self, id: i64) -> Result<u64, TodoError> {
        let result = sqlx::query("DELETE FROM Todo WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
