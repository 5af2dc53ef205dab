//! Modelos de dominio del pipeline (documentos de entrada, árbol de mapa
//! mental, preguntas de cuestionario y el agregado de contenido generado).

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Tipos de medio aceptados en la frontera de subida de ficheros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    PlainText,
    Pdf,
    Word,
}

impl MediaType {
    /// Resuelve el tipo de medio declarado. Cualquier otro valor se rechaza
    /// antes de intentar la extracción.
    pub fn from_declared(mime: &str) -> Result<Self, PipelineError> {
        match mime {
            "text/plain" => Ok(Self::PlainText),
            "application/pdf" => Ok(Self::Pdf),
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(Self::Word)
            }
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Documento de origen: bytes crudos más su tipo de medio declarado.
/// Transitorio; sólo vive durante una llamada de extracción.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

/// Nodo del mapa mental. El árbol se construye siempre por recorrido,
/// nunca por aliasing de referencias, así que no puede contener ciclos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MindMapNode>,
}

impl MindMapNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self { name: name.into(), children: Vec::new() }
    }
}

/// Pregunta de opción múltiple. Inmutable tras la generación; el flujo de
/// realización del cuestionario sólo la lee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    pub explanation: String,
}

/// Agregado de contenido generado para un texto de entrada. Se construye en
/// un único paso de agregación cuando las tres generaciones concurrentes han
/// terminado; nunca se expone un estado parcialmente construido.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "studyPlan", skip_serializing_if = "Option::is_none")]
    pub study_plan: Option<String>,
    #[serde(rename = "mindMapData", skip_serializing_if = "Option::is_none")]
    pub mind_map: Option<MindMapNode>,
    #[serde(rename = "rawText", skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    /// URL de narración de audio; la genera el navegador, el servidor la
    /// deja siempre vacía.
    #[serde(rename = "narrationUrl", skip_serializing_if = "Option::is_none")]
    pub narration_url: Option<String>,
}
