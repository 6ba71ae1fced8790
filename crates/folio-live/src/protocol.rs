//! Messages exchanged with the live panel runtime script.

use serde::{Deserialize, Serialize};

use crate::panel::PanelView;

/// Messages sent by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveRequest {
    /// A panel appeared on the page
    Mount {
        panel: String,
        language: String,
        text: String,
    },

    /// The editor text changed
    Edit { panel: String, text: String },

    /// A panel left the page
    Unmount { panel: String },
}

/// Messages sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveUpdate {
    /// New contents for a panel's error and preview regions
    State {
        panel: String,
        #[serde(flatten)]
        view: PanelView,
    },

    /// The request could not be applied; the panel stays static
    Rejected { panel: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::PanelStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_edit_request() {
        let json = r#"{"type":"edit","panel":"block-4","text":"console.log(1)"}"#;

        let request: LiveRequest = serde_json::from_str(json).unwrap();

        assert_eq!(
            request,
            LiveRequest::Edit {
                panel: "block-4".to_string(),
                text: "console.log(1)".to_string()
            }
        );
    }

    #[test]
    fn serializes_state_flat() {
        let update = LiveUpdate::State {
            panel: "block-4".to_string(),
            view: PanelView {
                status: PanelStatus::Errored,
                error: Some("x".to_string()),
                preview: None,
            },
        };

        let value = serde_json::to_value(&update).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "type": "state",
                "panel": "block-4",
                "status": "errored",
                "error": "x",
                "preview": null
            })
        );
    }
}
