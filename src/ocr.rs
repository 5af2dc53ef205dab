//! Adaptador OCR sobre un motor externo tratado como caja negra.
//!
//! El motor se inyecta mediante el trait `OcrEngine`; la implementación de
//! serie delega en el binario de Tesseract. El adaptador tolera errores
//! transitorios del motor (hasta 3 intentos con espera fija) y normaliza el
//! texto reconocido antes de entregarlo.

use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::{
    config::AppConfig,
    error::PipelineError,
    retry::{Backoff, RetryPolicy},
};

/// Contrato mínimo del motor de reconocimiento: una imagen fija ya validada
/// como decodificable entra, texto crudo sale.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

/// Motor de serie: invoca el binario `tesseract` sobre un fichero temporal
/// y lee el texto por la salida estándar.
pub struct TesseractCliEngine {
    command: String,
}

impl TesseractCliEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl OcrEngine for TesseractCliEngine {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .context("no se pudo crear el fichero temporal para el OCR")?;
        tmp.write_all(image)
            .context("no se pudo volcar la imagen al fichero temporal")?;

        let output = tokio::process::Command::new(&self.command)
            .arg(tmp.path())
            .arg("stdout")
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("no se pudo lanzar el motor OCR '{}'", self.command))?;

        if !output.status.success() {
            return Err(anyhow!(
                "el motor OCR terminó con error: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Adaptador con reintentos y post-procesado.
#[derive(Clone)]
pub struct OcrAdapter {
    engine: Arc<dyn OcrEngine>,
    policy: RetryPolicy,
}

impl OcrAdapter {
    pub fn new(engine: Arc<dyn OcrEngine>, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    pub fn from_config(cfg: &AppConfig, engine: Arc<dyn OcrEngine>) -> Self {
        Self::new(
            engine,
            RetryPolicy::new(cfg.ocr_max_attempts, Backoff::Fixed(cfg.ocr_retry_delay)),
        )
    }

    /// Reconoce el texto de una captura. Hasta 3 intentos con espera fija
    /// entre ellos; después, normalización de espacios y lista blanca de
    /// caracteres. Un resultado en blanco tras normalizar es `NoReadableText`.
    pub async fn recognize(&self, image: &[u8]) -> Result<String, PipelineError> {
        let raw = self
            .policy
            .run(|_attempt| self.engine.recognize(image), |_| true)
            .await
            .map_err(|e| {
                tracing::error!("El motor OCR agotó los reintentos: {e}");
                PipelineError::NoReadableText
            })?;

        let processed = normalize_text(&raw);
        if processed.is_empty() {
            return Err(PipelineError::NoReadableText);
        }

        info!("OCR completado: {} caracteres reconocidos", processed.len());
        Ok(processed)
    }
}

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\r\n|\n|\r){3,}").unwrap());
static INLINE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\w\s.,!?;:'"()%&/\\@#$€£¥-]"#).unwrap());

/// Normaliza el texto reconocido: 3+ saltos de línea se convierten en 2,
/// las rachas de espacios en uno solo y los caracteres fuera de la lista
/// blanca desaparecen.
pub fn normalize_text(raw: &str) -> String {
    let collapsed_newlines = EXCESS_NEWLINES.replace_all(raw, "\n\n");
    let collapsed_spaces = INLINE_WHITESPACE.replace_all(&collapsed_newlines, " ");
    DISALLOWED.replace_all(&collapsed_spaces, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyEngine {
        failures: u32,
        calls: AtomicU32,
        payload: String,
    }

    impl FlakyEngine {
        fn new(payload: &str, failures: u32) -> Self {
            Self { failures, calls: AtomicU32::new(0), payload: payload.to_string() }
        }
    }

    #[async_trait]
    impl OcrEngine for FlakyEngine {
        async fn recognize(&self, _image: &[u8]) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(anyhow!("fallo transitorio del motor"))
            } else {
                Ok(self.payload.clone())
            }
        }
    }

    fn adapter(engine: Arc<FlakyEngine>) -> OcrAdapter {
        OcrAdapter::new(engine, RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(5))))
    }

    #[tokio::test(start_paused = true)]
    async fn dos_fallos_del_motor_se_toleran() {
        let engine = Arc::new(FlakyEngine::new("Texto reconocido", 2));
        let result = adapter(engine.clone()).recognize(b"imagen").await.unwrap();
        assert_eq!(result, "Texto reconocido");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn el_motor_que_siempre_falla_es_no_readable_text() {
        let engine = Arc::new(FlakyEngine::new("", u32::MAX));
        let result = adapter(engine.clone()).recognize(b"imagen").await;
        assert!(matches!(result, Err(PipelineError::NoReadableText)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn el_resultado_en_blanco_es_no_readable_text() {
        let engine = Arc::new(FlakyEngine::new("  \n\n  ", 0));
        let result = adapter(engine).recognize(b"imagen").await;
        assert!(matches!(result, Err(PipelineError::NoReadableText)));
    }

    #[test]
    fn la_normalizacion_colapsa_saltos_y_espacios() {
        let raw = "Linea uno\n\n\n\n\nLinea   dos\t\ttres";
        assert_eq!(normalize_text(raw), "Linea uno\n\nLinea dos tres");
    }

    #[test]
    fn los_caracteres_fuera_de_la_lista_blanca_se_eliminan() {
        let raw = "Precio: 25€ ≈ ¶30™";
        let normalized = normalize_text(raw);
        assert!(normalized.contains('€'));
        assert!(!normalized.contains('≈'));
        assert!(!normalized.contains('¶'));
        assert!(!normalized.contains('™'));
    }
}
