//! Resolutor matemático con dos rutas: el motor determinista de expresiones
//! (instantáneo, sin explicaciones) y la ruta de IA con explicación paso a
//! paso. La elección de ruta es del llamante.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    ai::{AiGenerator, GenerationKind},
    error::PipelineError,
};

/// Ruta de resolución elegida por el usuario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Ai,
    Deterministic,
}

/// Evalúa la expresión con el motor determinista. No hay llamada de IA.
pub fn solve_deterministic(expression: &str) -> Result<String, PipelineError> {
    let value = meval::eval_str(expression)
        .map_err(|e| PipelineError::InvalidExpression(e.to_string()))?;
    Ok(format!("Solution: {value}"))
}

/// Pide al LLM una resolución paso a paso y limpia el marcado del resultado.
pub async fn solve_with_ai(ai: &AiGenerator, problem: &str) -> Result<String, PipelineError> {
    let prompt = format!(
        "Solve this math problem: \"{problem}\".\n\n\
         Provide step-by-step explanation with final answer boxed in **bold**.\n\
         Response structure:\n1. [Step 1]\n2. [Step 2]\n**Final Answer**\n$\\boxed{{[solution]}}$"
    );
    let response = ai.generate(&prompt, GenerationKind::Math).await?;
    Ok(clean_solution(&response))
}

static BOXED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\boxed\{([^}]*)\}").unwrap());
static HEADINGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}").unwrap());

/// Quita el marcado de la respuesta de IA: negritas, encabezados, cajas
/// LaTeX, signos de dólar y barras invertidas.
fn clean_solution(text: &str) -> String {
    let without_bold = text.replace("**", "");
    let without_headings = HEADINGS.replace_all(&without_bold, "");
    let unboxed = BOXED.replace_all(&without_headings, "$1");
    unboxed.replace('$', "").replace('\\', "").trim().to_string()
}
