use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Serialize;

use crate::blob::BlobStore;
use crate::core::{
    CreateOutcome, FormView, ImageUpload, Todo, TodoCreateForm, TodoEditForm, TodoError,
    TodoService, TodoViewModel, UpdateOutcome, parse_id,
};
use crate::storage::TodoStore;

#[cfg(feature = "tracing")]
use tracing::{error, warn};

pub const LIST_PATH: &str = "/Todos";
/// Upper bound on a create request, image included.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

type SharedService<S, B> = Arc<TodoService<S, B>>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TodoError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            TodoError::Multipart(_) => {
                #[cfg(feature = "tracing")]
                warn!(error = %self, "Rejected upload");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            _ => {
                #[cfg(feature = "tracing")]
                error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred while processing your request.".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub fn router<S, B>(service: TodoService<S, B>) -> Router
where
    S: TodoStore + 'static,
    B: BlobStore + 'static,
{
    let router = Router::new()
        .route("/health", get(health_route))
        .route(LIST_PATH, get(index::<S, B>))
        .route("/Todos/Index", get(index::<S, B>))
        .route("/Todos/Details", get(missing_id))
        .route("/Todos/Details/{id}", get(details::<S, B>))
        .route(
            "/Todos/Create",
            get(create_form)
                .post(create::<S, B>)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/Todos/Edit", get(missing_id).post(missing_id))
        .route("/Todos/Edit/{id}", get(edit::<S, B>).post(update::<S, B>))
        .route("/Todos/Delete", get(missing_id).post(missing_id))
        .route(
            "/Todos/Delete/{id}",
            get(delete::<S, B>).post(delete_confirmed::<S, B>),
        )
        .with_state(Arc::new(service));

    #[cfg(feature = "tracing")]
    let router = router.layer(
        tower_http::trace::TraceLayer::new_for_http().make_span_with(
            |request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("http_request", method = ?request.method(), uri)
            },
        ),
    );

    router
}

async fn health_route() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn missing_id() -> TodoError {
    TodoError::not_found("(none)")
}

async fn index<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
) -> Result<Json<Vec<Todo>>, TodoError> {
    Ok(Json(service.list().await?))
}

async fn details<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
    Path(id): Path<String>,
) -> Result<Json<TodoViewModel>, TodoError> {
    Ok(Json(service.details(parse_id(&id)).await?))
}

async fn create_form() -> Json<FormView<TodoCreateForm>> {
    Json(FormView::new(TodoCreateForm::default()))
}

async fn create<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
    mut multipart: Multipart,
) -> Result<Response, TodoError> {
    let mut form = TodoCreateForm::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "description" => form.description = Some(field.text().await?),
            "created_date" => form.created_date = Some(field.text().await?),
            "upload_pic" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }

    match service.create(form, image).await? {
        CreateOutcome::Created(_) => Ok(Redirect::to(LIST_PATH).into_response()),
        CreateOutcome::Invalid(view) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(view)).into_response())
        }
    }
}

async fn edit<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, TodoError> {
    Ok(Json(service.find(parse_id(&id)).await?))
}

async fn update<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
    Path(id): Path<String>,
    Form(form): Form<TodoEditForm>,
) -> Result<Response, TodoError> {
    let id = parse_id(&id).ok_or_else(|| TodoError::not_found(&id))?;
    match service.update(id, form).await? {
        UpdateOutcome::Updated => Ok(Redirect::to(LIST_PATH).into_response()),
        UpdateOutcome::NotFound => Err(TodoError::not_found(id)),
        UpdateOutcome::Conflict => Err(TodoError::Conflict(id)),
        UpdateOutcome::Invalid(view) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(view)).into_response())
        }
    }
}

async fn delete<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, TodoError> {
    Ok(Json(service.find(parse_id(&id)).await?))
}

async fn delete_confirmed<S: TodoStore, B: BlobStore>(
    State(service): State<SharedService<S, B>>,
    Path(id): Path<String>,
) -> Result<Redirect, TodoError> {
    let id = parse_id(&id).ok_or_else(|| TodoError::not_found(&id))?;
    service.delete(id).await?;
    Ok(Redirect::to(LIST_PATH))
}
