use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{error, info};

use crate::{
    CatalogSlot, Classroom, DayOfWeek, ErrorKind, Group, LessonFields, LessonFilter, LessonSlot,
    LessonView, StoreError, StoreResult, Subject, Teacher, Timetable,
};

#[derive(Clone)]
pub struct AppState {
    timetable: Arc<Timetable>,
}

impl AppState {
    pub fn new(timetable: Timetable) -> Self {
        Self {
            timetable: Arc::new(timetable),
        }
    }

    pub fn with_shared(timetable: Arc<Timetable>) -> Self {
        Self { timetable }
    }

    fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    /// Runs a mutation on the blocking pool. Commits hold the write lock
    /// across file IO, which must stay off the async workers.
    async fn mutate<R, F>(&self, op: F) -> Result<R, ApiError>
    where
        R: Send + 'static,
        F: FnOnce(&Timetable) -> StoreResult<R> + Send + 'static,
    {
        let timetable = Arc::clone(&self.timetable);
        tokio::task::spawn_blocking(move || op(&timetable))
            .await
            .map_err(|err| {
                StoreError::InternalInconsistency(format!("mutation task failed: {err}"))
            })?
            .map_err(ApiError::from)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Reference => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict | ErrorKind::DuplicateKey => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::IoFailure | ErrorKind::InternalInconsistency => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self {
            kind: value.kind(),
            message: value.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::invalid(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        ApiError::invalid(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::invalid(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind.as_str(), message = %self.message, "request failed");
        }
        let body = Json(ErrorBody {
            error: self.kind.as_str(),
            message: self.message,
        });
        (status, body).into_response()
    }
}

/// A catalog kind exposed over HTTP, with its request body.
trait CatalogResource: CatalogSlot + Send + Sync + 'static {
    type Payload: DeserializeOwned + Send + 'static;

    fn into_key(payload: Self::Payload) -> String;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TeacherPayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassroomPayload {
    room_number: String,
}

impl CatalogResource for Group {
    type Payload = NamePayload;

    fn into_key(payload: NamePayload) -> String {
        payload.name
    }
}

impl CatalogResource for Subject {
    type Payload = NamePayload;

    fn into_key(payload: NamePayload) -> String {
        payload.name
    }
}

impl CatalogResource for Teacher {
    type Payload = TeacherPayload;

    fn into_key(payload: TeacherPayload) -> String {
        payload.full_name
    }
}

impl CatalogResource for Classroom {
    type Payload = ClassroomPayload;

    fn into_key(payload: ClassroomPayload) -> String {
        payload.room_number
    }
}

/// Lesson request body. Day and lesson number arrive loosely typed so that
/// out-of-domain values surface as validation errors from the store.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LessonPayload {
    group_id: i64,
    subject_id: i64,
    teacher_id: i64,
    classroom_id: i64,
    day_of_week: String,
    lesson_number: i64,
}

impl TryFrom<LessonPayload> for LessonFields {
    type Error = StoreError;

    fn try_from(payload: LessonPayload) -> Result<Self, Self::Error> {
        let day_of_week: DayOfWeek = payload.day_of_week.parse()?;
        let lesson_number = u8::try_from(payload.lesson_number).map_err(|_| {
            StoreError::validation(format!(
                "lesson_number {} is out of range",
                payload.lesson_number
            ))
        })?;
        Ok(LessonFields {
            group_id: payload.group_id,
            subject_id: payload.subject_id,
            teacher_id: payload.teacher_id,
            classroom_id: payload.classroom_id,
            day_of_week,
            lesson_number,
        })
    }
}

/// Schedule listing filters. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
struct ScheduleQuery {
    group_id: Option<String>,
    day_of_week: Option<String>,
}

impl TryFrom<ScheduleQuery> for LessonFilter {
    type Error = StoreError;

    fn try_from(query: ScheduleQuery) -> Result<Self, Self::Error> {
        let mut filter = LessonFilter::all();
        if let Some(raw) = query.group_id.filter(|raw| !raw.trim().is_empty()) {
            let group_id = raw.trim().parse::<i64>().map_err(|_| {
                StoreError::validation(format!("invalid group_id '{}'", raw.trim()))
            })?;
            filter = filter.with_group(group_id);
        }
        if let Some(raw) = query.day_of_week.filter(|raw| !raw.trim().is_empty()) {
            filter = filter.with_day(raw.parse()?);
        }
        Ok(filter)
    }
}

#[derive(Debug, Serialize)]
struct CatalogDeleted {
    deleted: i64,
    removed_lessons: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/groups",
            get(list_entries::<Group>).post(create_entry::<Group>),
        )
        .route(
            "/api/groups/:id",
            get(get_entry::<Group>)
                .put(update_entry::<Group>)
                .delete(delete_entry::<Group>),
        )
        .route(
            "/api/teachers",
            get(list_entries::<Teacher>).post(create_entry::<Teacher>),
        )
        .route(
            "/api/teachers/:id",
            get(get_entry::<Teacher>)
                .put(update_entry::<Teacher>)
                .delete(delete_entry::<Teacher>),
        )
        .route(
            "/api/subjects",
            get(list_entries::<Subject>).post(create_entry::<Subject>),
        )
        .route(
            "/api/subjects/:id",
            get(get_entry::<Subject>)
                .put(update_entry::<Subject>)
                .delete(delete_entry::<Subject>),
        )
        .route(
            "/api/classrooms",
            get(list_entries::<Classroom>).post(create_entry::<Classroom>),
        )
        .route(
            "/api/classrooms/:id",
            get(get_entry::<Classroom>)
                .put(update_entry::<Classroom>)
                .delete(delete_entry::<Classroom>),
        )
        .route("/api/schedule", get(list_lessons).post(create_lesson))
        .route(
            "/api/schedule/:id",
            get(get_lesson).put(update_lesson).delete(delete_lesson),
        )
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, timetable: Arc<Timetable>) -> std::io::Result<()> {
    let state = AppState::with_shared(timetable);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "timetable HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_entries<T: CatalogResource>(
    State(state): State<AppState>,
) -> Result<Json<Vec<T>>, ApiError> {
    Ok(Json(state.timetable().list_entries::<T>()?))
}

async fn get_entry<T: CatalogResource>(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<T>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.timetable().get_entry::<T>(id)?))
}

async fn create_entry<T: CatalogResource>(
    State(state): State<AppState>,
    payload: Result<Json<T::Payload>, JsonRejection>,
) -> Result<(StatusCode, Json<T>), ApiError> {
    let Json(payload) = payload?;
    let key = T::into_key(payload);
    let created = state
        .mutate(move |timetable| timetable.create_entry::<T>(&key))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_entry<T: CatalogResource>(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<T::Payload>, JsonRejection>,
) -> Result<Json<T>, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let key = T::into_key(payload);
    let updated = state
        .mutate(move |timetable| timetable.update_entry::<T>(id, &key))
        .await?;
    Ok(Json(updated))
}

async fn delete_entry<T: CatalogResource>(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<CatalogDeleted>, ApiError> {
    let Path(id) = id?;
    let removed_lessons = state
        .mutate(move |timetable| timetable.delete_entry::<T>(id))
        .await?;
    Ok(Json(CatalogDeleted {
        deleted: id,
        removed_lessons,
    }))
}

async fn list_lessons(
    State(state): State<AppState>,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Json<Vec<LessonView>>, ApiError> {
    let Query(query) = query?;
    let filter = LessonFilter::try_from(query)?;
    Ok(Json(state.timetable().list_lessons(&filter)?))
}

async fn get_lesson(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<LessonSlot>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.timetable().get_lesson(id)?))
}

async fn create_lesson(
    State(state): State<AppState>,
    payload: Result<Json<LessonPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<LessonSlot>), ApiError> {
    let Json(payload) = payload?;
    let fields = LessonFields::try_from(payload)?;
    let created = state
        .mutate(move |timetable| timetable.create_lesson(fields))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_lesson(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<LessonPayload>, JsonRejection>,
) -> Result<Json<LessonSlot>, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let fields = LessonFields::try_from(payload)?;
    let updated = state
        .mutate(move |timetable| timetable.update_lesson(id, fields))
        .await?;
    Ok(Json(updated))
}

async fn delete_lesson(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = id?;
    state
        .mutate(move |timetable| timetable.delete_lesson(id))
        .await?;
    Ok(Json(json!({ "deleted": id })))
}
