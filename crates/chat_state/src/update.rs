use chat_core::Message;
use serde::Serialize;

/// Terminal outcome of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Settlement {
    Completed,
    Cancelled,
    Failed(String),
}

/// Change notifications for renderers, published in mutation order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    MessageAppended {
        message: Message,
    },

    ContentAppended {
        message_id: String,
        delta: String,
    },

    /// The streaming message was finalized. For `Failed` its content is now
    /// the failure notice.
    Settled {
        message_id: String,
        settlement: Settlement,
    },
}
