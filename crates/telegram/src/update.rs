use courierbot_core::dialog::{Keyboard, Prompt};

/// One inbound chat message, already reduced to what the dialog needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// Outbound reply: text plus an optional fixed keyboard. Keyboards persist
/// client-side, so prompts without one keep whatever is showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn from_prompt(chat_id: i64, prompt: Prompt) -> Self {
        Self { chat_id, text: prompt.text, keyboard: prompt.keyboard }
    }

    pub fn with_keyboard(chat_id: i64, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self { chat_id, text: text.into(), keyboard: Some(keyboard) }
    }
}
