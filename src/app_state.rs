use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{analyzer::ContentAnalyzer, config::AppConfig, ocr::OcrAdapter, quiz::QuizAttempt};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub analyzer: ContentAnalyzer,
    pub ocr: OcrAdapter,
    pub status: Arc<Mutex<Status>>,
    pub quiz_session: Arc<Mutex<Option<QuizAttempt>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}
