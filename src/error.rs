//! Taxonomía de errores del pipeline de estudio.
//!
//! Cada fallo terminal tiene su propia variante para que la capa HTTP pueda
//! producir una notificación distinta y legible por el usuario. La política
//! de propagación: la extracción no reintenta nunca; el OCR y las llamadas
//! de IA reintentan internamente y sólo exponen el fallo final.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// El tipo de medio declarado no es uno de los soportados.
    #[error("Tipo de fichero no soportado: {0}")]
    UnsupportedFormat(String),

    /// El parser no pudo abrir el documento.
    #[error("No se pudo abrir el documento: {0}")]
    CorruptDocument(String),

    /// El parser abrió el documento pero no produjo texto.
    #[error("El documento no contiene texto")]
    EmptyDocument,

    /// El motor OCR no encontró texto legible tras normalizar.
    #[error("No se encontró texto legible en la imagen")]
    NoReadableText,

    /// La capacidad de IA no está presente en el momento de la llamada.
    #[error("El servicio de IA no está disponible; revise la configuración del proveedor")]
    ServiceUnavailable,

    /// Todos los intentos de generación fallaron; se conserva el último error.
    #[error("La generación de IA falló tras agotar los reintentos: {0}")]
    GenerationFailed(String),

    /// La respuesta del cuestionario no cumple el formato esperado.
    #[error("Formato de cuestionario inválido: {0}")]
    InvalidQuizFormat(String),

    /// La expresión enviada al motor determinista no se pudo evaluar.
    /// Es un error del cliente, no del servicio.
    #[error("Expresión matemática no válida: {0}")]
    InvalidExpression(String),

    /// El resumen o el plan de estudio fallaron; el análisis completo se aborta.
    #[error("El análisis del contenido falló: {0}")]
    AnalysisFailed(String),
}
