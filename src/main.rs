// Módulos de la aplicación
mod ai;
mod analyzer;
mod api;
mod app_state;
mod config;
mod error;
mod extract;
mod math;
mod mindmap;
mod models;
mod ocr;
mod quiz;
mod retry;

use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    ai::{AiGenerator, ChatClient, RigChatClient},
    analyzer::ContentAnalyzer,
    app_state::{AppState, Status},
    ocr::{OcrAdapter, TesseractCliEngine},
};

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Construir el cliente de IA y los adaptadores del pipeline
    let chat_client: Arc<dyn ChatClient> = Arc::new(RigChatClient::from_config(&cfg));
    if !chat_client.is_available() {
        warn!("La capacidad de IA no está disponible; las generaciones fallarán hasta configurar el proveedor.");
    }
    let analyzer = ContentAnalyzer::new(AiGenerator::from_config(&cfg, chat_client));
    let ocr = OcrAdapter::from_config(
        &cfg,
        Arc::new(TesseractCliEngine::new(cfg.tesseract_cmd.clone())),
    );

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        analyzer,
        ocr,
        status: Arc::new(Mutex::new(Status {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        })),
        quiz_session: Arc::new(Mutex::new(None)),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .nest("/", api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .unwrap();
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .unwrap();

    info!("✅ Servidor cerrado correctamente.");
}
