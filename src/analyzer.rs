//! Análisis de contenido: orquesta al cliente de IA para producir los tres
//! artefactos de estudio a partir de un texto.
//!
//! Flujo:
//!   1. Se lanzan en paralelo las generaciones de resumen, plan de estudio
//!      y mapa mental (fan-out) y se espera a que las tres terminen
//!      (fan-in); el orden de finalización no está garantizado.
//!   2. Si el mapa mental falla o su respuesta no es parseable, se deriva
//!      uno localmente de los encabezados del texto en lugar de abortar:
//!      la degradación del mapa nunca bloquea el resumen ni el plan.
//!   3. Si fallan el resumen o el plan, el análisis completo falla con
//!      `AnalysisFailed`; la política es asimétrica a propósito.
//! El agregado `GeneratedContent` se construye en un único paso cuando todo
//! ha terminado.

use tracing::{info, warn};

use crate::{
    ai::{AiGenerator, GenerationKind},
    error::PipelineError,
    mindmap,
    models::{GeneratedContent, MindMapNode},
};

const SUMMARY_PROMPT: &str =
    "Generate professional summary with clear paragraphs (NO markdown):";

const STUDY_PLAN_PROMPT: &str = "Create structured study plan WITHOUT markdown:\n\
    Week 1: Core Concepts\n\
    Day 1: Introduction\n\
    Key definition 1\n\
    Foundational theory\n\
    Day 2: Applications\n\
    Practical example 1\n\
    Case study";

const MINDMAP_PROMPT: &str = "Generate strict hierarchical JSON mind map:\n\
    {\n\
      \"name\": \"Main Topic (3-5 words)\",\n\
      \"children\": [\n\
        {\n\
          \"name\": \"Sub Topic (2-4 complete words)\",\n\
          \"children\": [\n\
            {\"name\": \"Key Detail (complete phrase)\"}\n\
          ]\n\
        }\n\
      ]\n\
    }\n\
    RULES:\n\
    1. Complete English phrases only\n\
    2. Max 4 words per node\n\
    3. No markdown/special characters\n\
    4. Valid JSON only";

#[derive(Clone)]
pub struct ContentAnalyzer {
    ai: AiGenerator,
}

impl ContentAnalyzer {
    pub fn new(ai: AiGenerator) -> Self {
        Self { ai }
    }

    pub fn generator(&self) -> &AiGenerator {
        &self.ai
    }

    /// Produce el agregado completo para un texto. Sin efectos laterales:
    /// persistir o mostrar el resultado es responsabilidad del llamante.
    pub async fn analyze(&self, text: &str) -> Result<GeneratedContent, PipelineError> {
        info!("Iniciando análisis de contenido ({} caracteres)", text.len());

        // Los prompts deben vivir más que los futuros que los referencian.
        let summary_prompt = format!("{SUMMARY_PROMPT}\n\n{text}");
        let study_plan_prompt = format!("{STUDY_PLAN_PROMPT}\n\n{text}");
        let mind_map_prompt = format!("{MINDMAP_PROMPT}\n\n{text}");

        let (summary, study_plan, mind_map_response) = tokio::join!(
            self.ai.generate(&summary_prompt, GenerationKind::Summary),
            self.ai.generate(&study_plan_prompt, GenerationKind::StudyPlan),
            self.ai.generate(&mind_map_prompt, GenerationKind::MindMap),
        );

        let summary = summary.map_err(|e| PipelineError::AnalysisFailed(e.to_string()))?;
        let study_plan =
            study_plan.map_err(|e| PipelineError::AnalysisFailed(e.to_string()))?;
        let mind_map = self.mind_map_or_fallback(mind_map_response, text);

        Ok(GeneratedContent {
            summary: Some(summary),
            study_plan: Some(study_plan),
            mind_map: Some(mind_map),
            raw_text: Some(text.to_string()),
            narration_url: None,
        })
    }

    /// Respaldo deliberado del mapa mental: silencioso para el llamante,
    /// pero queda registrado.
    fn mind_map_or_fallback(
        &self,
        response: Result<String, PipelineError>,
        text: &str,
    ) -> MindMapNode {
        match response {
            Ok(raw) => mindmap::parse(&raw, text),
            Err(err) => {
                warn!("La generación del mapa mental falló ({err}); derivando de los encabezados");
                mindmap::from_headings(text)
            }
        }
    }
}
