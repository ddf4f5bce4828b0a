use std::sync::Arc;

use uuid::Uuid;

use crate::blob::BlobStore;
use crate::core::{
    FormView, ImageUpload, Todo, TodoCreateForm, TodoEditForm, TodoError, TodoViewModel,
};
use crate::storage::TodoStore;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Todo),
    Invalid(FormView<TodoCreateForm>),
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// The write lost a race and the row is still there. Nothing sensible can
    /// be done with it, so callers treat it as fatal.
    Conflict,
    Invalid(FormView<TodoEditForm>),
}

/// The todo controller: every operation the routes expose, written against
/// injected store and blob handles.
pub struct TodoService<S: TodoStore, B: BlobStore> {
    store: Arc<S>,
    blobs: Arc<B>,
    base_uri: String,
}

impl<S: TodoStore, B: BlobStore> TodoService<S, B> {
    pub fn new(store: Arc<S>, blobs: Arc<B>, base_uri: impl Into<String>) -> Self {
        Self {
            store,
            blobs,
            base_uri: base_uri.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Todo>, TodoError> {
        self.store.list().await
    }

    /// Looks up `id`, treating an absent id like an unknown one.
    pub async fn find(&self, id: Option<i64>) -> Result<Todo, TodoError> {
        let id = id.ok_or_else(|| TodoError::not_found("(none)"))?;
        self.store
            .find(id)
            .await?
            .ok_or_else(|| TodoError::not_found(id))
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn details(&self, id: Option<i64>) -> Result<TodoViewModel, TodoError> {
        let todo = self.find(id).await?;
        let upload_pic_url = match todo.uploaded_image_id.as_deref() {
            Some(image_id) => self.blobs.signed_read_url(image_id, &self.base_uri),
            None => String::new(),
        };
        Ok(TodoViewModel::new(todo, upload_pic_url))
    }

    /// Uploads the image first and writes the row second. A failed row write
    /// leaves an orphaned blob behind, never a row pointing at nothing.
    #[cfg_attr(
        feature = "tracing",
        instrument(skip(self, form, image), fields(has_image = image.is_some()))
    )]
    pub async fn create(
        &self,
        form: TodoCreateForm,
        image: Option<ImageUpload>,
    ) -> Result<CreateOutcome, TodoError> {
        let new_todo = match form.validate() {
            Ok(new_todo) => new_todo,
            Err(errors) => {
                #[cfg(feature = "tracing")]
                debug!(errors = errors.len(), "Rejected create form");
                return Ok(CreateOutcome::Invalid(FormView::invalid(form, errors)));
            }
        };

        self.blobs.ensure_container().await?;

        let image_id = match image {
            Some(image) => {
                let image_id = Uuid::new_v4().to_string();
                self.blobs.upload(&image_id, image.bytes).await?;
                #[cfg(feature = "tracing")]
                info!(
                    blob_id = %image_id,
                    file_name = ?image.file_name,
                    content_type = ?image.content_type,
                    "Stored todo image"
                );
                Some(image_id)
            }
            None => None,
        };

        let todo = self.store.insert(&new_todo, image_id.as_deref()).await?;
        #[cfg(feature = "tracing")]
        info!(todo_id = todo.id, "Created todo");
        Ok(CreateOutcome::Created(todo))
    }

    /// `path_id` must name the same record the form was rendered for. A
    /// mismatch is answered as not found before the form is even validated.
    #[cfg_attr(feature = "tracing", instrument(skip(self, form)))]
    pub async fn update(
        &self,
        path_id: i64,
        form: TodoEditForm,
    ) -> Result<UpdateOutcome, TodoError> {
        if form.submitted_id() != Some(path_id) {
            #[cfg(feature = "tracing")]
            warn!(submitted_id = ?form.id, "Edit submitted for a different todo");
            return Ok(UpdateOutcome::NotFound);
        }

        let update = match form.validate() {
            Ok(update) => update,
            Err(errors) => {
                return Ok(UpdateOutcome::Invalid(FormView::invalid(form, errors)));
            }
        };

        if self.store.update(&update).await? > 0 {
            #[cfg(feature = "tracing")]
            info!(todo_id = update.id, "Updated todo");
            return Ok(UpdateOutcome::Updated);
        }

        if self.store.exists(update.id).await? {
            #[cfg(feature = "tracing")]
            warn!(todo_id = update.id, "Concurrent modification left the row in place");
            Ok(UpdateOutcome::Conflict)
        } else {
            Ok(UpdateOutcome::NotFound)
        }
    }

    /// Removes the row without looking first. The image blob, if any, is kept.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn delete(&self, id: i64) -> Result<(), TodoError> {
        if self.store.delete(id).await? == 0 {
            return Err(TodoError::MissingRow(id));
        }
        #[cfg(feature = "tracing")]
        info!(todo_id = id, "Deleted todo");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{
        DEVELOPMENT_ACCOUNT_KEY, DEVELOPMENT_ACCOUNT_NAME, MemoryBlobStore, SharedKeySigner,
    };
    use crate::storage::sqlite::SqliteTodoStore;
    use crate::tests::support::LosingStore;
    use bytes::Bytes;
    use chrono::{DateTime, Duration, NaiveDateTime, Utc};
    use std::collections::HashMap;

    const BASE_URI: &str = "https://todos.blob.core.windows.net/";

    async fn service() -> (
        TodoService<SqliteTodoStore, MemoryBlobStore>,
        Arc<MemoryBlobStore>,
    ) {
        let store = Arc::new(SqliteTodoStore::new_memory().await.unwrap());
        let blobs = Arc::new(MemoryBlobStore::new(
            SharedKeySigner::new(DEVELOPMENT_ACCOUNT_NAME, DEVELOPMENT_ACCOUNT_KEY).unwrap(),
        ));
        (TodoService::new(store, blobs.clone(), BASE_URI), blobs)
    }

    fn create_form(description: &str, created_date: &str) -> TodoCreateForm {
        TodoCreateForm {
            description: Some(description.to_string()),
            created_date: Some(created_date.to_string()),
        }
    }

    fn image() -> ImageUpload {
        ImageUpload {
            file_name: Some("milk.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    async fn created(
        service: &TodoService<impl TodoStore, impl BlobStore>,
        form: TodoCreateForm,
        image: Option<ImageUpload>,
    ) -> Todo {
        match service.create(form, image).await.unwrap() {
            CreateOutcome::Created(todo) => todo,
            CreateOutcome::Invalid(view) => {
                panic!("unexpected validation errors: {:?}", view.errors)
            }
        }
    }

    fn query_params(url: &str) -> HashMap<String, String> {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
    }

    fn sas_time(raw: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
            .unwrap()
            .and_utc()
    }

    #[tokio::test]
    async fn buy_milk_without_image() {
        let (service, blobs) = service().await;
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), None).await;

        let todos = service.list().await.unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].description, "Buy milk");
        assert_eq!(todos[0].uploaded_image_id, None);

        let details = service.details(Some(todo.id)).await.unwrap();
        assert_eq!(details.upload_pic_url, "");
        assert_eq!(details.created_date.to_string(), "2024-01-01 00:00:00");
        assert_eq!(blobs.len().await, 0);
    }

    #[tokio::test]
    async fn image_is_uploaded_and_linked_with_a_fresh_signature() {
        let (service, blobs) = service().await;
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), Some(image())).await;

        let image_id = todo.uploaded_image_id.clone().unwrap();
        assert_eq!(blobs.get(&image_id).await, Some(Bytes::from_static(b"\x89PNG")));

        let before = Utc::now();
        let details = service.details(Some(todo.id)).await.unwrap();
        let after = Utc::now();

        let expected_prefix = format!("{BASE_URI}images/{image_id}?");
        assert!(details.upload_pic_url.starts_with(&expected_prefix));
        let params = query_params(&details.upload_pic_url);
        assert!(params.contains_key("sig"));
        let start = sas_time(&params["st"]);
        let expiry = sas_time(&params["se"]);
        assert!(start <= before - Duration::minutes(15) + Duration::seconds(2));
        assert!(start >= before - Duration::minutes(15) - Duration::seconds(2));
        assert!(expiry >= after + Duration::minutes(15) - Duration::seconds(2));
        assert!(expiry <= after + Duration::minutes(15) + Duration::seconds(2));
    }

    #[tokio::test]
    async fn invalid_create_writes_nothing() {
        let (service, blobs) = service().await;
        let form = create_form("", "2024-01-01");
        match service.create(form.clone(), Some(image())).await.unwrap() {
            CreateOutcome::Invalid(view) => {
                assert_eq!(view.form, form);
                assert_eq!(view.errors[0].field, "description");
            }
            CreateOutcome::Created(todo) => panic!("created {todo:?}"),
        }
        assert!(service.list().await.unwrap().is_empty());
        assert_eq!(blobs.len().await, 0);
    }

    #[tokio::test]
    async fn unknown_or_absent_ids_are_not_found() {
        let (service, _) = service().await;
        assert!(matches!(service.details(Some(7)).await, Err(TodoError::NotFound(_))));
        assert!(matches!(service.details(None).await, Err(TodoError::NotFound(_))));
        assert!(matches!(service.find(Some(7)).await, Err(TodoError::NotFound(_))));
    }

    #[tokio::test]
    async fn edit_with_mismatched_id_is_not_found_even_when_invalid() {
        let (service, _) = service().await;
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), None).await;

        let form = TodoEditForm {
            id: Some((todo.id + 1).to_string()),
            description: None,
            created_date: Some("garbage".to_string()),
        };
        assert!(matches!(
            service.update(todo.id, form).await.unwrap(),
            UpdateOutcome::NotFound
        ));
        assert_eq!(service.find(Some(todo.id)).await.unwrap(), todo);
    }

    #[tokio::test]
    async fn edit_keeps_the_image_reference() {
        let (service, _) = service().await;
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), Some(image())).await;

        let form = TodoEditForm {
            id: Some(todo.id.to_string()),
            description: Some("Buy oat milk".to_string()),
            created_date: Some("2024-02-02".to_string()),
        };
        assert!(matches!(
            service.update(todo.id, form).await.unwrap(),
            UpdateOutcome::Updated
        ));

        let stored = service.find(Some(todo.id)).await.unwrap();
        assert_eq!(stored.description, "Buy oat milk");
        assert_eq!(stored.created_date.to_string(), "2024-02-02 00:00:00");
        assert_eq!(stored.uploaded_image_id, todo.uploaded_image_id);
    }

    #[tokio::test]
    async fn edit_of_a_deleted_row_is_not_found() {
        let (service, _) = service().await;
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), None).await;
        service.delete(todo.id).await.unwrap();

        let form = TodoEditForm::from(&todo);
        assert!(matches!(
            service.update(todo.id, form).await.unwrap(),
            UpdateOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn lost_update_on_a_live_row_is_a_conflict() {
        let store = Arc::new(LosingStore::new_memory().await);
        let blobs = Arc::new(MemoryBlobStore::new(
            SharedKeySigner::new(DEVELOPMENT_ACCOUNT_NAME, DEVELOPMENT_ACCOUNT_KEY).unwrap(),
        ));
        let service = TodoService::new(store, blobs, BASE_URI);
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), None).await;

        let form = TodoEditForm::from(&todo);
        assert!(matches!(
            service.update(todo.id, form).await.unwrap(),
            UpdateOutcome::Conflict
        ));
    }

    #[tokio::test]
    async fn delete_removes_the_row_but_keeps_the_blob() {
        let (service, blobs) = service().await;
        let todo = created(&service, create_form("Buy milk", "2024-01-01"), Some(image())).await;
        let keep = created(&service, create_form("Walk dog", "2024-01-02"), None).await;

        service.delete(todo.id).await.unwrap();

        let remaining = service.list().await.unwrap();
        assert_eq!(remaining, vec![keep]);
        assert!(blobs.contains(todo.uploaded_image_id.as_deref().unwrap()).await);
    }

    #[tokio::test]
    async fn deleting_a_vanished_row_is_fatal() {
        let (service, _) = service().await;
        assert!(matches!(service.delete(99).await, Err(TodoError::MissingRow(99))));
    }
}
