//! Política de reintentos compartida por el cliente de IA y el adaptador OCR.
//!
//! En lugar de bucles con contadores manuales, una única abstracción:
//! número máximo de intentos, función de espera entre intentos y un
//! predicado que decide si un error concreto merece reintento. Los
//! reintentos son secuenciales dentro de sí mismos; nunca hay dos
//! intentos en vuelo a la vez.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Estrategia de espera entre intentos.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Espera fija entre intentos (la usa el OCR).
    Fixed(Duration),
    /// Espera lineal: `intento × base` (la usa el cliente de IA).
    Linear(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self { max_attempts, backoff }
    }

    /// Espera tras el intento `attempt` (1-indexado).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Linear(base) => base * attempt,
        }
    }

    /// Ejecuta `op` hasta `max_attempts` veces. `op` recibe el número de
    /// intento (1-indexado). Si el error no es reintentable según el
    /// predicado, o se agotan los intentos, devuelve el último error.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_attempts || !retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Intento {}/{} fallido: {}. Reintentando en {:?}",
                        attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn la_espera_lineal_crece_estrictamente() {
        let policy = RetryPolicy::new(3, Backoff::Linear(Duration::from_millis(100)));
        assert!(policy.delay_for(1) < policy.delay_for(2));
        assert!(policy.delay_for(2) < policy.delay_for(3));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    }

    #[test]
    fn la_espera_fija_no_cambia() {
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(1), policy.delay_for(3));
    }

    #[tokio::test(start_paused = true)]
    async fn reintenta_hasta_el_primer_exito() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(10)));
        let result: Result<u32, String> = policy
            .run(
                |_attempt| {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < 3 {
                            Err(format!("fallo {n}"))
                        } else {
                            Ok(n)
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn agota_exactamente_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Backoff::Linear(Duration::from_millis(10)));
        let result: Result<(), String> = policy
            .run(
                |_attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("siempre falla".to_string()) }
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn un_error_no_reintentable_corta_en_seco() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Backoff::Fixed(Duration::from_millis(1)));
        let result: Result<(), String> = policy
            .run(
                |_attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal".to_string()) }
                },
                |e| e != "fatal",
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
