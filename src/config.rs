//! Carga y gestión de configuración de la aplicación (servidor + LLM + OCR).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

#[derive(Clone, Debug)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_chat_model: String,

    /// Tamaño máximo de fichero aceptado en la subida (bytes).
    pub max_upload_bytes: usize,

    /// Reintentos de las llamadas de generación de IA.
    pub ai_max_attempts: u32,
    pub ai_retry_base: Duration,

    /// Reintentos del motor OCR.
    pub ocr_max_attempts: u32,
    pub ocr_retry_delay: Duration,

    /// Binario del motor OCR externo.
    pub tesseract_cmd: String,

    /// Segundos de cuenta atrás por pregunta del cuestionario.
    pub quiz_timer_secs: u32,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    /// Todos los valores tienen un defecto razonable; no hay variables obligatorias.
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        let llm_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let max_upload_bytes = read_usize("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;

        let ai_max_attempts = read_u32("AI_MAX_ATTEMPTS", 3)?;
        let ai_retry_base = Duration::from_millis(read_u64("AI_RETRY_BASE_MS", 1000)?);

        let ocr_max_attempts = read_u32("OCR_MAX_ATTEMPTS", 3)?;
        let ocr_retry_delay = Duration::from_millis(read_u64("OCR_RETRY_MS", 500)?);

        let tesseract_cmd =
            env::var("TESSERACT_CMD").unwrap_or_else(|_| "tesseract".to_string());

        let quiz_timer_secs = read_u32("QUIZ_TIMER_SECS", 30)?;

        Ok(Self {
            server_addr,
            llm_provider,
            llm_chat_model,
            max_upload_bytes,
            ai_max_attempts,
            ai_retry_base,
            ocr_max_attempts,
            ocr_retry_delay,
            tesseract_cmd,
            quiz_timer_secs,
        })
    }
}

fn read_u32(key: &str, default: u32) -> Result<u32> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| anyhow!("{key} no es un entero válido: {v}")),
        Err(_) => Ok(default),
    }
}

fn read_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| anyhow!("{key} no es un entero válido: {v}")),
        Err(_) => Ok(default),
    }
}

fn read_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| anyhow!("{key} no es un entero válido: {v}")),
        Err(_) => Ok(default),
    }
}
