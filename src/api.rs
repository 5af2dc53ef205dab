use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    error::PipelineError,
    extract, math, mindmap,
    models::{GeneratedContent, MediaType, QuizQuestion, SourceDocument},
    quiz::{self, AttemptPhase, QuizAttempt},
};

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct AnalyzeTextPayload {
    text: String,
}

#[derive(Deserialize)]
pub struct QuizPayload {
    text: String,
    #[serde(rename = "questionCount", default = "default_question_count")]
    question_count: u32,
    #[serde(default = "default_difficulty")]
    difficulty: String,
}

fn default_question_count() -> u32 {
    5
}

fn default_difficulty() -> String {
    "medium".to_string()
}

#[derive(Deserialize)]
pub struct MathPayload {
    problem: String,
    #[serde(default = "default_solver")]
    solver: math::SolverKind,
}

fn default_solver() -> math::SolverKind {
    math::SolverKind::Ai
}

#[derive(Deserialize)]
pub struct StartQuizPayload {
    questions: Vec<QuizQuestion>,
}

#[derive(Deserialize)]
pub struct AnswerPayload {
    answer: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Traduce cada error del pipeline a una respuesta HTTP con una
/// notificación distinta y legible; ningún fallo se traga en silencio.
fn to_api_error(err: PipelineError) -> ApiError {
    let status = match err {
        PipelineError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PipelineError::CorruptDocument(_)
        | PipelineError::EmptyDocument
        | PipelineError::NoReadableText
        | PipelineError::InvalidQuizFormat(_)
        | PipelineError::InvalidExpression(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::GenerationFailed(_) | PipelineError::AnalysisFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    error!("Fallo del pipeline: {err}");
    (status, Json(json!({ "error": err.to_string() })))
}

// --- Router ---

/// Margen sobre el tope de subida para las cabeceras y el separador
/// multipart; la comprobación de tamaño del handler es la que decide.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn create_router(app_state: AppState) -> Router {
    // axum limita el cuerpo a 2 MB por defecto, por debajo del tope de
    // subida configurado; se eleva aquí para que el límite propio gobierne.
    let body_limit = DefaultBodyLimit::max(app_state.config.max_upload_bytes + UPLOAD_BODY_SLACK);
    Router::new()
        .route("/api/analyze-document", post(analyze_document_handler))
        .route("/api/scan", post(scan_handler))
        .route("/api/analyze", post(analyze_text_handler))
        .route("/api/quiz", post(quiz_handler))
        .route("/api/quiz/start", post(quiz_start_handler))
        .route("/api/quiz/answer", post(quiz_answer_handler))
        .route("/api/quiz/tick", post(quiz_tick_handler))
        .route("/api/quiz/retry", post(quiz_retry_handler))
        .route("/api/quiz/session", get(quiz_session_handler))
        .route("/api/math", post(math_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .layer(body_limit)
        .with_state(app_state)
}

// --- Handlers ---

/// Subida de documento (multipart, campo `file`): extracción + análisis.
#[axum::debug_handler]
async fn analyze_document_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (bytes, declared_mime) = read_upload(multipart, state.config.max_upload_bytes).await?;

    let media_type = MediaType::from_declared(&declared_mime).map_err(to_api_error)?;
    let document = SourceDocument { bytes, media_type };

    let text = extract::extract_text(&document).map_err(to_api_error)?;
    let content = run_analysis(&state, &text).await?;
    Ok(Json(render_content(&content)))
}

/// Captura de cámara (multipart, campo `image`): OCR + análisis.
#[axum::debug_handler]
async fn scan_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut image: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        if field.name() == Some("image") {
            image = Some(field.bytes().await.map_err(bad_upload)?.to_vec());
        }
    }
    let image = image.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Falta el campo 'image' en la petición."})),
        )
    })?;

    let text = state.ocr.recognize(&image).await.map_err(to_api_error)?;
    let content = run_analysis(&state, &text).await?;
    Ok(Json(render_content(&content)))
}

/// Entrada directa de texto crudo ya extraído.
#[axum::debug_handler]
async fn analyze_text_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeTextPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let content = run_analysis(&state, &payload.text).await?;
    Ok(Json(render_content(&content)))
}

#[axum::debug_handler]
async fn quiz_handler(
    State(state): State<AppState>,
    Json(payload): Json<QuizPayload>,
) -> Result<Json<Vec<QuizQuestion>>, ApiError> {
    let questions = quiz::generate_quiz(
        state.analyzer.generator(),
        &payload.text,
        payload.question_count,
        &payload.difficulty,
    )
    .await
    .map_err(to_api_error)?;
    Ok(Json(questions))
}

/// Arranca un intento de cuestionario sobre las preguntas recibidas. El
/// intento anterior, si existía, se descarta.
#[axum::debug_handler]
async fn quiz_start_handler(
    State(state): State<AppState>,
    Json(payload): Json<StartQuizPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if payload.questions.is_empty() {
        return Err(to_api_error(PipelineError::InvalidQuizFormat(
            "no hay preguntas con las que empezar".to_string(),
        )));
    }

    let attempt = QuizAttempt::new(payload.questions, state.config.quiz_timer_secs);
    let view = session_view(&attempt);
    *state.quiz_session.lock().unwrap() = Some(attempt);
    Ok(Json(view))
}

#[axum::debug_handler]
async fn quiz_answer_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnswerPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_session(&state, |attempt| attempt.submit(&payload.answer))
}

/// Un segundo de la cuenta atrás del intento en curso.
#[axum::debug_handler]
async fn quiz_tick_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_session(&state, QuizAttempt::tick)
}

#[axum::debug_handler]
async fn quiz_retry_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_session(&state, QuizAttempt::retry)
}

#[axum::debug_handler]
async fn quiz_session_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_session(&state, |_| {})
}

#[axum::debug_handler]
async fn math_handler(
    State(state): State<AppState>,
    Json(payload): Json<MathPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let solution = match payload.solver {
        math::SolverKind::Deterministic => {
            math::solve_deterministic(&payload.problem).map_err(to_api_error)?
        }
        math::SolverKind::Ai => math::solve_with_ai(state.analyzer.generator(), &payload.problem)
            .await
            .map_err(to_api_error)?,
    };
    Ok(Json(json!({ "solution": solution })))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.lock().unwrap().clone())
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

// --- Utilidades ---

/// Vista JSON del agregado de análisis: la serialización normal más la
/// variante de presentación del mapa mental, con etiquetas partidas para el
/// lienzo.
fn render_content(content: &GeneratedContent) -> serde_json::Value {
    let mut value = serde_json::to_value(content).unwrap_or_else(|_| json!({}));
    if let Some(tree) = &content.mind_map {
        value["mindMapData"] = mindmap::with_display_labels(tree);
    }
    value
}

/// Aplica una operación al intento en curso y devuelve su vista. Sin
/// intento activo la petición no tiene sentido.
fn with_session(
    state: &AppState,
    op: impl FnOnce(&mut QuizAttempt),
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut guard = state.quiz_session.lock().unwrap();
    let Some(attempt) = guard.as_mut() else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No hay ningún cuestionario en curso."})),
        ));
    };
    op(attempt);
    Ok(Json(session_view(attempt)))
}

/// Vista JSON del intento que consume el frontend en cada transición.
fn session_view(attempt: &QuizAttempt) -> serde_json::Value {
    json!({
        "phase": match attempt.phase() {
            AttemptPhase::InProgress => "inProgress",
            AttemptPhase::Completed => "completed",
        },
        "currentIndex": attempt.current_index(),
        "total": attempt.total(),
        "score": attempt.score(),
        "timeRemaining": attempt.time_remaining(),
        "userAnswers": attempt.user_answers(),
        "currentQuestion": attempt.current_question(),
    })
}

/// Ejecuta el análisis actualizando el estado compartido que consulta el
/// frontend, al estilo del endpoint de estado.
async fn run_analysis(
    state: &AppState,
    text: &str,
) -> Result<GeneratedContent, ApiError> {
    {
        let mut status = state.status.lock().unwrap();
        status.is_busy = true;
        status.message = "Analizando contenido...".to_string();
        status.progress = 0.0;
    }

    let result = state.analyzer.analyze(text).await;

    let mut status = state.status.lock().unwrap();
    status.is_busy = false;
    status.progress = 0.0;
    match &result {
        Ok(_) => status.message = "Análisis completado.".to_string(),
        Err(err) => status.message = format!("Error en el análisis: {err}"),
    }
    drop(status);

    result.map_err(to_api_error)
}

/// Lee el campo `file` de una subida multipart aplicando el límite de
/// tamaño y resolviendo el tipo de medio declarado (con el nombre del
/// fichero como respaldo cuando el navegador no lo envía).
async fn read_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(Vec<u8>, String), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        if field.name() != Some("file") {
            continue;
        }

        let declared_mime = field.content_type().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(bad_upload)?;

        if bytes.len() > max_bytes {
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({
                    "error": format!("El fichero supera el límite de {} MB.", max_bytes / (1024 * 1024))
                })),
            ));
        }

        let mime = declared_mime
            .or_else(|| {
                filename
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|m| m.to_string())
            })
            .unwrap_or_default();

        return Ok((bytes.to_vec(), mime));
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Falta el campo 'file' en la petición."})),
    ))
}

fn bad_upload(err: axum::extract::multipart::MultipartError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": format!("Subida inválida: {err}")})),
    )
}
