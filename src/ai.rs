//! Cliente de generación de IA sobre Rig, con reintentos y limpieza de la
//! respuesta. De momento se implementa OpenAI; Gemini/Ollama quedan
//! preparados para el futuro.
//!
//! La capacidad de chat se modela como una dependencia inyectada
//! (`ChatClient`) en lugar de un objeto global, de modo que cada componente
//! que la necesita puede recibir un doble de pruebas.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::{
    config::{AppConfig, LlmProvider},
    error::PipelineError,
    retry::{Backoff, RetryPolicy},
};

/// Capacidad mínima que este repositorio exige al servicio de IA:
/// comprobación de existencia y una llamada petición/respuesta, sin streaming.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// ¿Está presente la capacidad en este momento? Se comprueba antes de
    /// intentar ninguna llamada.
    fn is_available(&self) -> bool;

    /// Envía un prompt y devuelve la carga textual de la respuesta.
    async fn chat(&self, prompt: &str) -> Result<String>;
}

/// Qué clase de artefacto se está generando; sólo etiqueta los logs y los
/// mensajes de error, cada generador aporta su propia plantilla de prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Summary,
    StudyPlan,
    MindMap,
    Quiz,
    Math,
}

impl GenerationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Summary => "resumen",
            Self::StudyPlan => "plan de estudio",
            Self::MindMap => "mapa mental",
            Self::Quiz => "cuestionario",
            Self::Math => "solución matemática",
        }
    }
}

/// Implementación real sobre Rig.
#[derive(Debug, Clone)]
pub struct RigChatClient {
    provider: LlmProvider,
    chat_model: String,
}

impl RigChatClient {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        }
    }

    async fn chat_with_openai(&self, prompt: &str) -> Result<String> {
        use rig::client::CompletionClient as _;
        use rig::completion::Prompt;
        use rig::providers::openai;

        let client = openai::Client::from_env();

        let model_name = if self.chat_model.is_empty() {
            "gpt-4o-mini"
        } else {
            self.chat_model.as_str()
        };

        let agent = client.agent(model_name).build();
        let answer = agent.prompt(prompt).await?;
        Ok(answer)
    }
}

#[async_trait]
impl ChatClient for RigChatClient {
    fn is_available(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAI => std::env::var("OPENAI_API_KEY").is_ok(),
            LlmProvider::Gemini => std::env::var("GEMINI_API_KEY").is_ok(),
            LlmProvider::Ollama => true,
        }
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.chat_with_openai(prompt).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            )),
        }
    }
}

/// Cliente de generación reutilizado por todos los generadores de alto
/// nivel (resumen, plan, mapa mental, cuestionario).
#[derive(Clone)]
pub struct AiGenerator {
    client: Arc<dyn ChatClient>,
    policy: RetryPolicy,
}

impl AiGenerator {
    pub fn new(client: Arc<dyn ChatClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn from_config(cfg: &AppConfig, client: Arc<dyn ChatClient>) -> Self {
        Self::new(
            client,
            RetryPolicy::new(cfg.ai_max_attempts, Backoff::Linear(cfg.ai_retry_base)),
        )
    }

    /// Envía el prompt con reintentos de espera lineal. Una respuesta vacía
    /// cuenta como intento fallido. Tras agotar los intentos devuelve
    /// `GenerationFailed` con el último error; quien llama nunca ve los
    /// fallos intermedios.
    pub async fn generate(
        &self,
        prompt: &str,
        kind: GenerationKind,
    ) -> Result<String, PipelineError> {
        if !self.client.is_available() {
            return Err(PipelineError::ServiceUnavailable);
        }

        info!("Iniciando generación de {}", kind.label());

        let result = self
            .policy
            .run(
                |attempt| async move {
                    debug!("Generación de {}: intento {}", kind.label(), attempt);
                    let content = self.client.chat(prompt).await?;
                    if content.trim().is_empty() {
                        return Err(anyhow!("respuesta de IA vacía"));
                    }
                    Ok(content)
                },
                |_| true,
            )
            .await;

        match result {
            Ok(content) => Ok(clean_response(&content)),
            Err(err) => Err(PipelineError::GenerationFailed(err.to_string())),
        }
    }
}

static LEADING_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s*").unwrap());

/// Limpia la respuesta del LLM: elimina un marcador de encabezado inicial y
/// las vallas de código, y recorta espacios.
pub fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_heading = LEADING_HEADING.replace(trimmed, "");
    without_heading
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeChatClient;
    use super::*;
    use std::time::Duration;

    fn generator(client: FakeChatClient) -> (Arc<FakeChatClient>, AiGenerator) {
        let client = Arc::new(client);
        let policy = RetryPolicy::new(3, Backoff::Linear(Duration::from_millis(10)));
        (client.clone(), AiGenerator::new(client, policy))
    }

    #[tokio::test(start_paused = true)]
    async fn dos_fallos_y_un_exito_devuelven_la_carga() {
        let (client, generator) = generator(FakeChatClient::new("Contenido generado", 2));
        let result = generator.generate("prompt", GenerationKind::Summary).await.unwrap();
        assert_eq!(result, "Contenido generado");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn el_agotamiento_produce_generation_failed_en_tres_intentos() {
        let (client, generator) = generator(FakeChatClient::new("", u32::MAX));
        let result = generator.generate("prompt", GenerationKind::StudyPlan).await;
        assert!(matches!(result, Err(PipelineError::GenerationFailed(_))));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn una_respuesta_vacia_cuenta_como_intento_fallido() {
        let (client, generator) = generator(FakeChatClient::new("   ", 0));
        let result = generator.generate("prompt", GenerationKind::Summary).await;
        assert!(matches!(result, Err(PipelineError::GenerationFailed(_))));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn sin_capacidad_no_se_intenta_ninguna_llamada() {
        let (client, generator) = generator(FakeChatClient::unavailable());
        let result = generator.generate("prompt", GenerationKind::Quiz).await;
        assert!(matches!(result, Err(PipelineError::ServiceUnavailable)));
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn la_limpieza_quita_encabezado_y_vallas() {
        assert_eq!(clean_response("## Resumen importante"), "Resumen importante");
        assert_eq!(clean_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_response("  texto normal  "), "texto normal");
    }
}
