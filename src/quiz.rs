//! Generación de cuestionarios a partir del texto del documento y máquina
//! de estados del intento de cuestionario.
//!
//! El generador pide al LLM exactamente `question_count` preguntas JSON
//! limitadas al contenido del documento, valida el formato y baraja las
//! opciones de cada pregunta conservando cuál es la correcta.

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::info;

use crate::{
    ai::{AiGenerator, GenerationKind},
    error::PipelineError,
    models::QuizQuestion,
};

const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Deserialize)]
struct QuizPayload {
    #[serde(default)]
    questions: Vec<QuizQuestion>,
}

fn build_prompt(text: &str, question_count: u32, difficulty: &str) -> String {
    format!(
        "Generate {question_count} {difficulty} difficulty quiz questions based ONLY on this document content:\n\n\
         \"{text}\"\n\n\
         JSON format:\n\
         {{\n\
           \"questions\": [\n\
             {{\n\
               \"question\": \"...\",\n\
               \"options\": [\"...\", \"...\", \"...\", \"...\"],\n\
               \"correctAnswer\": \"...\",\n\
               \"explanation\": \"...\"\n\
             }}\n\
           ]\n\
         }}"
    )
}

/// Genera la secuencia ordenada de preguntas: prompt, llamada de IA,
/// validación y barajado de opciones.
pub async fn generate_quiz(
    ai: &AiGenerator,
    text: &str,
    question_count: u32,
    difficulty: &str,
) -> Result<Vec<QuizQuestion>, PipelineError> {
    let prompt = build_prompt(text, question_count, difficulty);
    let response = ai.generate(&prompt, GenerationKind::Quiz).await?;

    let mut questions = parse_quiz_response(&response)?;
    let mut rng = rand::thread_rng();
    for question in &mut questions {
        question.options.shuffle(&mut rng);
    }

    info!("Cuestionario generado: {} preguntas", questions.len());
    Ok(questions)
}

/// Parsea y valida la respuesta del LLM. Además de la forma del JSON se
/// comprueba el invariante del que depende la corrección del intento: cada
/// pregunta tiene exactamente 4 opciones únicas y `correctAnswer` es una de
/// ellas. Cualquier violación invalida el cuestionario completo.
pub fn parse_quiz_response(response: &str) -> Result<Vec<QuizQuestion>, PipelineError> {
    let cleaned = response.replace("```json", "").replace("```", "");
    let payload: QuizPayload = serde_json::from_str(cleaned.trim())
        .map_err(|e| PipelineError::InvalidQuizFormat(format!("JSON ilegible: {e}")))?;

    if payload.questions.is_empty() {
        return Err(PipelineError::InvalidQuizFormat(
            "la respuesta no contiene preguntas".to_string(),
        ));
    }

    for (idx, question) in payload.questions.iter().enumerate() {
        if question.options.len() != OPTIONS_PER_QUESTION {
            return Err(PipelineError::InvalidQuizFormat(format!(
                "la pregunta {} tiene {} opciones en lugar de {}",
                idx + 1,
                question.options.len(),
                OPTIONS_PER_QUESTION
            )));
        }
        let unique: std::collections::HashSet<&str> =
            question.options.iter().map(String::as_str).collect();
        if unique.len() != question.options.len() {
            return Err(PipelineError::InvalidQuizFormat(format!(
                "la pregunta {} repite opciones",
                idx + 1
            )));
        }
        if !question.options.contains(&question.correct_answer) {
            return Err(PipelineError::InvalidQuizFormat(format!(
                "la respuesta correcta de la pregunta {} no figura entre sus opciones",
                idx + 1
            )));
        }
    }

    Ok(payload.questions)
}

// ---------------------------------------------------------------------
// Máquina de estados del intento de cuestionario
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    InProgress,
    Completed,
}

/// Estado de un intento de cuestionario. Pertenece en exclusiva al flujo
/// que lo consume: se reinicia al reintentar y se descarta al navegar fuera.
#[derive(Debug)]
pub struct QuizAttempt {
    questions: Vec<QuizQuestion>,
    current_index: usize,
    user_answers: Vec<String>,
    score: u32,
    time_remaining: u32,
    timer_secs: u32,
    phase: AttemptPhase,
}

impl QuizAttempt {
    pub fn new(questions: Vec<QuizQuestion>, timer_secs: u32) -> Self {
        Self {
            questions,
            current_index: 0,
            user_answers: Vec::new(),
            score: 0,
            time_remaining: timer_secs,
            timer_secs,
            phase: AttemptPhase::InProgress,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn user_answers(&self) -> &[String] {
        &self.user_answers
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            AttemptPhase::InProgress => self.questions.get(self.current_index),
            AttemptPhase::Completed => None,
        }
    }

    /// Registra una respuesta y avanza. En la última pregunta la transición
    /// es a `Completed`; en cualquier otra, a la pregunta siguiente con el
    /// temporizador repuesto.
    pub fn submit(&mut self, answer: &str) {
        if self.phase == AttemptPhase::Completed {
            return;
        }
        let Some(question) = self.questions.get(self.current_index) else {
            self.phase = AttemptPhase::Completed;
            return;
        };

        if question.correct_answer == answer {
            self.score += 1;
        }
        self.user_answers.push(answer.to_string());

        if self.current_index < self.questions.len() - 1 {
            self.current_index += 1;
            self.time_remaining = self.timer_secs;
        } else {
            self.phase = AttemptPhase::Completed;
        }
    }

    /// Un tic de la cuenta atrás. Al llegar a cero se fuerza el envío de una
    /// respuesta vacía, que sigue la misma regla de transición que una
    /// respuesta explícita.
    pub fn tick(&mut self) {
        if self.phase == AttemptPhase::Completed {
            return;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            self.submit("");
        }
    }

    /// Reinicio completo: primera pregunta, puntuación y respuestas a cero.
    pub fn retry(&mut self) {
        self.current_index = 0;
        self.user_answers.clear();
        self.score = 0;
        self.time_remaining = self.timer_secs;
        self.phase = AttemptPhase::InProgress;
    }
}
