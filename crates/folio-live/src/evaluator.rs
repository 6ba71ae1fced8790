//! Evaluator interface and the external-command evaluator.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Output of a successful evaluation, shown in the preview region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedOutput(pub String);

impl RenderedOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A failed evaluation. The message is displayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Evaluates live panel source.
///
/// Treated as opaque: an evaluation may be slow or have side effects, and
/// must report failure through [`EvaluationError`] rather than panicking.
pub trait Evaluator: Send + Sync + 'static {
    /// Evaluator identifier for logs (e.g., "node")
    fn name(&self) -> &str;

    /// Evaluate the source exactly as written.
    fn evaluate(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<RenderedOutput, EvaluationError>> + Send;
}

/// Runs an external program with the source on stdin.
///
/// Exit status 0 yields stdout as the rendered output; anything else yields
/// stderr (or the exit status when stderr is empty) as the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
}

impl CommandEvaluator {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv list such as `["node", "-"]`.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }
}

impl Evaluator for CommandEvaluator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn evaluate(&self, source: &str) -> Result<RenderedOutput, EvaluationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EvaluationError::new(format!("failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The program may exit without reading its input; its status decides.
            if let Err(e) = stdin.write_all(source.as_bytes()).await {
                tracing::debug!("{} did not accept source: {}", self.program, e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EvaluationError::new(format!("{} failed: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(RenderedOutput(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(EvaluationError::new(format!(
                "{} exited with {}",
                self.program, output.status
            )))
        } else {
            Err(EvaluationError::new(stderr))
        }
    }
}

/// Evaluators keyed by fence language.
#[derive(Debug)]
pub struct EvaluatorSet<E> {
    evaluators: HashMap<String, Arc<E>>,
}

impl<E> Default for EvaluatorSet<E> {
    fn default() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }
}

impl<E: Evaluator> EvaluatorSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, language: impl Into<String>, evaluator: E) {
        self.evaluators
            .insert(language.into().to_lowercase(), Arc::new(evaluator));
    }

    pub fn get(&self, language: &str) -> Option<Arc<E>> {
        self.evaluators.get(language).cloned()
    }

    pub fn supports(&self, language: &str) -> bool {
        self.evaluators.contains_key(language)
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl EvaluatorSet<CommandEvaluator> {
    /// Build from configured `language -> argv` entries, skipping empty argv.
    pub fn from_commands(commands: &BTreeMap<String, Vec<String>>) -> Self {
        let mut set = Self::new();

        for (language, argv) in commands {
            match CommandEvaluator::from_argv(argv) {
                Some(evaluator) => set.insert(language.clone(), evaluator),
                None => tracing::warn!("Ignoring empty evaluator command for '{}'", language),
            }
        }

        set
    }
}
