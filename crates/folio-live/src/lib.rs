//! Live code panels.
//!
//! A live panel pairs an editor with an error region and a preview region.
//! Every edit re-evaluates the panel's source through an [`Evaluator`]; only
//! the result for the latest text is ever shown.

pub mod evaluator;
pub mod panel;
pub mod protocol;
pub mod session;

pub use evaluator::{CommandEvaluator, EvaluationError, Evaluator, EvaluatorSet, RenderedOutput};
pub use panel::{Evaluation, LivePanel, PanelState, PanelStatus, PanelView};
pub use protocol::{LiveRequest, LiveUpdate};
pub use session::{LiveError, LiveSession};
