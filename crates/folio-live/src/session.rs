//! Per-connection ownership of mounted live panels.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::evaluator::{EvaluationError, Evaluator, EvaluatorSet, RenderedOutput};
use crate::panel::{Evaluation, LivePanel, PanelView};
use crate::protocol::{LiveRequest, LiveUpdate};

/// Errors from session requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveError {
    #[error("No evaluator for language '{0}'")]
    UnsupportedLanguage(String),

    #[error("Panel '{0}' is not mounted")]
    UnknownPanel(String),
}

struct MountedPanel<E> {
    panel: LivePanel,
    evaluator: Arc<E>,
    /// Distinguishes this mount from earlier mounts under the same id
    epoch: u64,
    in_flight: Option<AbortHandle>,
}

impl<E> MountedPanel<E> {
    fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// Result of a spawned evaluation, tagged with the mount and generation it
/// ran for.
struct Completion {
    panel: String,
    epoch: u64,
    generation: u64,
    result: Result<RenderedOutput, EvaluationError>,
}

/// Owns the live panels of one page connection.
///
/// Evaluations run as spawned tasks; their results come back through
/// [`LiveSession::next_update`], which drops results superseded by a later
/// edit or belonging to an unmounted panel. A superseded evaluation is
/// aborted, which drops its future and whatever process it started.
/// Dropping the session discards every panel and aborts their evaluations.
pub struct LiveSession<E: Evaluator> {
    evaluators: Arc<EvaluatorSet<E>>,
    panels: HashMap<String, MountedPanel<E>>,
    evaluate_on_mount: bool,
    next_epoch: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<E: Evaluator> LiveSession<E> {
    pub fn new(evaluators: Arc<EvaluatorSet<E>>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            evaluators,
            panels: HashMap::new(),
            evaluate_on_mount: false,
            next_epoch: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// Evaluate each panel's seed text once as it mounts.
    pub fn evaluate_on_mount(mut self, enabled: bool) -> Self {
        self.evaluate_on_mount = enabled;
        self
    }

    /// Mount a panel. Mounting an existing id starts it over from `seed`.
    pub fn mount(
        &mut self,
        panel: &str,
        language: &str,
        seed: &str,
    ) -> Result<PanelView, LiveError> {
        let evaluator = self
            .evaluators
            .get(language)
            .ok_or_else(|| LiveError::UnsupportedLanguage(language.to_string()))?;

        self.unmount(panel);
        self.next_epoch += 1;

        let mut mounted = MountedPanel {
            panel: LivePanel::mount(seed),
            evaluator,
            epoch: self.next_epoch,
            in_flight: None,
        };

        if self.evaluate_on_mount {
            if let Some(evaluation) = mounted.panel.evaluate_seed() {
                mounted.in_flight = Some(spawn_evaluation(
                    self.completions_tx.clone(),
                    panel,
                    mounted.epoch,
                    Arc::clone(&mounted.evaluator),
                    evaluation,
                ));
            }
        }

        let view = mounted.panel.view();
        self.panels.insert(panel.to_string(), mounted);
        tracing::debug!("Mounted live panel {} ({})", panel, language);
        Ok(view)
    }

    /// Replace a panel's text and start evaluating it.
    pub fn edit(&mut self, panel: &str, text: &str) -> Result<PanelView, LiveError> {
        let tx = self.completions_tx.clone();
        let mounted = self
            .panels
            .get_mut(panel)
            .ok_or_else(|| LiveError::UnknownPanel(panel.to_string()))?;

        mounted.cancel();
        let evaluation = mounted.panel.edit(text);
        mounted.in_flight = Some(spawn_evaluation(
            tx,
            panel,
            mounted.epoch,
            Arc::clone(&mounted.evaluator),
            evaluation,
        ));

        Ok(mounted.panel.view())
    }

    /// Discard a panel and its state, aborting its evaluation.
    pub fn unmount(&mut self, panel: &str) -> bool {
        match self.panels.remove(panel) {
            Some(mut mounted) => {
                mounted.cancel();
                true
            }
            None => false,
        }
    }

    pub fn view(&self, panel: &str) -> Option<PanelView> {
        self.panels.get(panel).map(|m| m.panel.view())
    }

    pub fn panel(&self, panel: &str) -> Option<&LivePanel> {
        self.panels.get(panel).map(|m| &m.panel)
    }

    /// Apply a request from the runtime script.
    pub fn handle(&mut self, request: LiveRequest) -> Option<LiveUpdate> {
        let (panel, result) = match request {
            LiveRequest::Mount {
                panel,
                language,
                text,
            } => {
                let result = self.mount(&panel, &language, &text);
                (panel, result)
            }
            LiveRequest::Edit { panel, text } => {
                let result = self.edit(&panel, &text);
                (panel, result)
            }
            LiveRequest::Unmount { panel } => {
                self.unmount(&panel);
                return None;
            }
        };

        Some(match result {
            Ok(view) => LiveUpdate::State { panel, view },
            Err(e) => LiveUpdate::Rejected {
                panel,
                reason: e.to_string(),
            },
        })
    }

    /// Wait for the next evaluation result that still applies.
    ///
    /// Returns `None` only if the completion channel closed, which cannot
    /// happen while the session is alive.
    pub async fn next_update(&mut self) -> Option<LiveUpdate> {
        while let Some(completion) = self.completions_rx.recv().await {
            let Some(mounted) = self.panels.get_mut(&completion.panel) else {
                continue;
            };

            if mounted.epoch == completion.epoch
                && mounted
                    .panel
                    .complete(completion.generation, completion.result)
            {
                mounted.in_flight = None;
                return Some(LiveUpdate::State {
                    view: mounted.panel.view(),
                    panel: completion.panel,
                });
            }

            tracing::trace!(
                "Dropped stale evaluation {} for {}",
                completion.generation,
                completion.panel
            );
        }

        None
    }
}

impl<E: Evaluator> Drop for LiveSession<E> {
    fn drop(&mut self) {
        for mounted in self.panels.values_mut() {
            mounted.cancel();
        }
    }
}

fn spawn_evaluation<E: Evaluator>(
    tx: mpsc::UnboundedSender<Completion>,
    panel: &str,
    epoch: u64,
    evaluator: Arc<E>,
    evaluation: Evaluation,
) -> AbortHandle {
    let panel = panel.to_string();

    tokio::spawn(async move {
        let result = evaluator.evaluate(&evaluation.text).await;
        if let Err(e) = &result {
            tracing::debug!("{} evaluation failed for {}: {}", evaluator.name(), panel, e);
        }
        // the session may be gone already
        let _ = tx.send(Completion {
            panel,
            epoch,
            generation: evaluation.generation,
            result,
        });
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::PanelStatus;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Gate = oneshot::Receiver<Result<RenderedOutput, EvaluationError>>;

    /// Echoes the source, failing on sources that start with `throw `.
    /// Sources with a registered gate wait for it to be released.
    #[derive(Default)]
    struct TestEvaluator {
        gates: Mutex<HashMap<String, Gate>>,
    }

    impl TestEvaluator {
        fn gate(&self, source: &str) -> oneshot::Sender<Result<RenderedOutput, EvaluationError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(source.to_string(), rx);
            tx
        }
    }

    impl Evaluator for TestEvaluator {
        fn name(&self) -> &str {
            "test"
        }

        async fn evaluate(&self, source: &str) -> Result<RenderedOutput, EvaluationError> {
            let gate = self.gates.lock().unwrap().remove(source);
            if let Some(gate) = gate {
                return gate
                    .await
                    .unwrap_or_else(|_| Err(EvaluationError::new("gate dropped")));
            }

            match source.strip_prefix("throw ") {
                Some(message) => Err(EvaluationError::new(message)),
                None => Ok(RenderedOutput::new(source.to_uppercase())),
            }
        }
    }

    fn session() -> (LiveSession<TestEvaluator>, Arc<EvaluatorSet<TestEvaluator>>) {
        let mut set = EvaluatorSet::new();
        set.insert("js", TestEvaluator::default());
        let set = Arc::new(set);
        (LiveSession::new(Arc::clone(&set)), set)
    }

    fn state(update: Option<LiveUpdate>) -> (String, PanelView) {
        match update {
            Some(LiveUpdate::State { panel, view }) => (panel, view),
            other => panic!("expected state update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mount_does_not_evaluate() {
        let (mut session, _) = session();

        let view = session.mount("p", "js", "return 1+1;").unwrap();

        assert_eq!(view.status, PanelStatus::Idle);
        assert_eq!(session.panel("p").unwrap().text(), "return 1+1;");
        let waited = tokio::time::timeout(Duration::from_millis(50), session.next_update()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn eager_mount_evaluates_seed_once() {
        let (session, _) = session();
        let mut session = session.evaluate_on_mount(true);

        let view = session.mount("p", "js", "seed").unwrap();
        assert_eq!(view.status, PanelStatus::Evaluating);

        let (panel, view) = state(session.next_update().await);
        assert_eq!(panel, "p");
        assert_eq!(view.preview.as_deref(), Some("SEED"));
        assert_eq!(session.panel("p").unwrap().generation(), 1);
    }

    #[tokio::test]
    async fn rejects_unsupported_language() {
        let (mut session, _) = session();

        let update = session.handle(LiveRequest::Mount {
            panel: "p".to_string(),
            language: "cobol".to_string(),
            text: String::new(),
        });

        assert_eq!(
            update,
            Some(LiveUpdate::Rejected {
                panel: "p".to_string(),
                reason: "No evaluator for language 'cobol'".to_string()
            })
        );
    }

    #[tokio::test]
    async fn edit_shows_result() {
        let (mut session, _) = session();
        session.mount("p", "js", "seed").unwrap();

        session.edit("p", "hello").unwrap();

        let (_, view) = state(session.next_update().await);
        assert_eq!(view.status, PanelStatus::Shown);
        assert_eq!(view.preview.as_deref(), Some("HELLO"));
    }

    #[tokio::test]
    async fn slow_older_evaluation_never_wins() {
        let (mut session, set) = session();
        session.mount("p", "js", "seed").unwrap();

        let evaluator = set.get("js").unwrap();
        let t1 = evaluator.gate("T1");
        let t2 = evaluator.gate("T2");

        session.edit("p", "T1").unwrap();
        session.edit("p", "T2").unwrap();

        t2.send(Ok(RenderedOutput::new("two"))).unwrap();
        let (_, view) = state(session.next_update().await);
        assert_eq!(view.preview.as_deref(), Some("two"));

        // superseded, so its receiver may already be gone
        let _ = t1.send(Ok(RenderedOutput::new("one")));
        let waited = tokio::time::timeout(Duration::from_millis(50), session.next_update()).await;
        assert!(waited.is_err());

        assert_eq!(session.view("p").unwrap().preview.as_deref(), Some("two"));
        assert_eq!(session.panel("p").unwrap().text(), "T2");
    }

    #[tokio::test]
    async fn errors_stay_inside_the_panel() {
        let (mut session, _) = session();
        session.mount("p", "js", "seed").unwrap();

        session.edit("p", "ok").unwrap();
        state(session.next_update().await);

        session.edit("p", "throw x").unwrap();
        let (_, view) = state(session.next_update().await);

        assert_eq!(view.status, PanelStatus::Errored);
        assert_eq!(view.error.as_deref(), Some("x"));
        assert_eq!(view.preview.as_deref(), Some("OK"));

        // still accepts edits
        assert!(session.edit("p", "again").is_ok());
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn remount_ignores_results_of_earlier_mount() {
        let (mut session, set) = session();
        session.mount("p", "js", "seed").unwrap();

        // finishes and queues its result before the remount
        session.edit("p", "old").unwrap();
        settle().await;

        session.mount("p", "js", "seed").unwrap();
        let new = set.get("js").unwrap().gate("NEW");
        session.edit("p", "NEW").unwrap();
        new.send(Ok(RenderedOutput::new("new"))).unwrap();

        let (_, view) = state(session.next_update().await);
        assert_eq!(view.preview.as_deref(), Some("new"));
        assert_eq!(session.panel("p").unwrap().text(), "NEW");
    }

    #[tokio::test]
    async fn mount_after_unmount_ignores_old_results() {
        let (mut session, set) = session();
        session.mount("p", "js", "seed").unwrap();

        session.edit("p", "old").unwrap();
        settle().await;
        session.unmount("p");

        session.mount("p", "js", "seed").unwrap();
        let new = set.get("js").unwrap().gate("NEW");
        session.edit("p", "NEW").unwrap();
        new.send(Ok(RenderedOutput::new("new"))).unwrap();

        let (_, view) = state(session.next_update().await);
        assert_eq!(view.preview.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn superseded_evaluations_are_aborted() {
        let (mut session, set) = session();
        session.mount("p", "js", "seed").unwrap();
        let evaluator = set.get("js").unwrap();

        let first = evaluator.gate("T1");
        session.edit("p", "T1").unwrap();
        settle().await;
        assert!(!first.is_closed());

        let second = evaluator.gate("T2");
        session.edit("p", "T2").unwrap();
        settle().await;
        assert!(first.is_closed());
        assert!(!second.is_closed());

        session.unmount("p");
        settle().await;
        assert!(second.is_closed());
    }

    #[tokio::test]
    async fn dropping_session_aborts_evaluations() {
        let (mut session, set) = session();
        session.mount("p", "js", "seed").unwrap();

        let gate = set.get("js").unwrap().gate("slow");
        session.edit("p", "slow").unwrap();
        settle().await;

        drop(session);
        settle().await;
        assert!(gate.is_closed());
    }

    #[tokio::test]
    async fn unmount_discards_in_flight_results() {
        let (mut session, _) = session();
        session.mount("p", "js", "seed").unwrap();

        session.edit("p", "late").unwrap();
        assert!(session.unmount("p"));

        let waited = tokio::time::timeout(Duration::from_millis(50), session.next_update()).await;
        assert!(waited.is_err());
        assert_eq!(
            session.edit("p", "x"),
            Err(LiveError::UnknownPanel("p".to_string()))
        );
    }
}
