//! Ordered fallback over named load strategies.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// One way of getting a model into memory.
pub trait LoadStrategy<T>: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Some(reason)` when the strategy cannot apply on this host; it is then
    /// skipped without being attempted.
    fn skip_reason(&self) -> Option<String> { None }

    fn load(&self) -> anyhow::Result<T>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Loaded,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub strategy: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Error)]
#[error("every load strategy failed: {}", summarize(.attempts))]
pub struct ChainError {
    pub attempts: Vec<Attempt>,
}

fn summarize(attempts: &[Attempt]) -> String {
    attempts.iter().map(|a| match &a.outcome {
        Outcome::Loaded => format!("{}: loaded", a.strategy),
        Outcome::Failed(r) => format!("{}: {}", a.strategy, r),
        Outcome::Skipped(r) => format!("{}: skipped ({})", a.strategy, r),
    }).collect::<Vec<_>>().join("; ")
}

pub struct FallbackChain<T> {
    strategies: Vec<Box<dyn LoadStrategy<T>>>,
}

impl<T> FallbackChain<T> {
    pub fn new(strategies: Vec<Box<dyn LoadStrategy<T>>>) -> Self { Self { strategies } }

    /// Try each strategy in order, stopping at the first success. The
    /// returned attempts list every strategy considered, in order.
    pub fn run(&self) -> Result<(T, Vec<Attempt>), ChainError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let name = strategy.name();
            if let Some(reason) = strategy.skip_reason() {
                info!(strategy = name, %reason, "load strategy skipped");
                attempts.push(Attempt { strategy: name, outcome: Outcome::Skipped(reason) });
                continue;
            }
            info!(strategy = name, "attempting model load");
            match strategy.load() {
                Ok(value) => {
                    info!(strategy = name, "model loaded");
                    attempts.push(Attempt { strategy: name, outcome: Outcome::Loaded });
                    return Ok((value, attempts));
                }
                Err(e) => {
                    warn!(strategy = name, error = %format!("{e:#}"), "load strategy failed");
                    attempts.push(Attempt { strategy: name, outcome: Outcome::Failed(format!("{e:#}")) });
                }
            }
        }
        Err(ChainError { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted { name: &'static str, skip: Option<&'static str>, result: Result<u32, &'static str>, calls: Arc<AtomicUsize> }

    impl LoadStrategy<u32> for Scripted {
        fn name(&self) -> &'static str { self.name }
        fn skip_reason(&self) -> Option<String> { self.skip.map(str::to_string) }
        fn load(&self) -> anyhow::Result<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn scripted(name: &'static str, skip: Option<&'static str>, result: Result<u32, &'static str>, calls: &Arc<AtomicUsize>) -> Box<dyn LoadStrategy<u32>> {
        Box::new(Scripted { name, skip, result, calls: calls.clone() })
    }

    #[test]
    fn stops_at_first_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![
            scripted("a", None, Err("no backend"), &calls),
            scripted("b", None, Ok(7), &calls),
            scripted("c", None, Ok(9), &calls),
        ]);
        let (value, attempts) = chain.run().unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(attempts[0].outcome, Outcome::Failed("no backend".into()));
        assert_eq!(attempts[1].outcome, Outcome::Loaded);
        assert_eq!(attempts.len(), 2);
    }

    #[test]
    fn skipped_strategies_are_not_called() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![
            scripted("gpu", Some("no gpu"), Ok(1), &calls),
            scripted("cpu", None, Ok(2), &calls),
        ]);
        let (value, attempts) = chain.run().unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(attempts[0].outcome, Outcome::Skipped("no gpu".into()));
    }

    #[test]
    fn total_failure_reports_every_reason() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![
            scripted("a", None, Err("oom"), &calls),
            scripted("b", None, Err("missing weights"), &calls),
        ]);
        let err = chain.run().unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        let msg = err.to_string();
        assert!(msg.contains("a: oom") && msg.contains("b: missing weights"), "{msg}");
    }
}
