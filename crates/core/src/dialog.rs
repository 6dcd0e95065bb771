use crate::domain::{ClaimType, CompletedReport, DialogState, LineItem, ReportKind, Session};

/// Reserved labels rendered on the reply keyboards. The transport matches
/// inbound text against these before the state machine sees it; they are
/// never stored as data.
pub const REFUSAL_LABEL: &str = "🚫 Refusal";
pub const CLAIM_LABEL: &str = "⚠️ Claim";
pub const INFO_LABEL: &str = "ℹ️ Info";
pub const CANCEL_LABEL: &str = "❌ Cancel";
pub const ADD_ARTICLE_LABEL: &str = "➕ Add article";
pub const CONTINUE_LABEL: &str = "➡ Continue";

/// The fixed keyboards the dialog can attach to a prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyboard {
    MainMenu,
    CancelOnly,
    AddMore,
    ClaimTypes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self { text: text.into(), keyboard: Some(keyboard) }
    }
}

/// Inbound text after reserved-label classification. Triggers and cancel
/// are recognized in any state; everything else reaches the machine as
/// free text for the current step to interpret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogInput {
    Trigger(ReportKind),
    Cancel,
    Text(String),
}

pub fn classify(text: &str) -> DialogInput {
    match text.trim() {
        CANCEL_LABEL => DialogInput::Cancel,
        REFUSAL_LABEL => DialogInput::Trigger(ReportKind::Refusal),
        CLAIM_LABEL => DialogInput::Trigger(ReportKind::Claim),
        INFO_LABEL => DialogInput::Trigger(ReportKind::Info),
        _ => DialogInput::Text(text.to_owned()),
    }
}

/// Result of applying one inbound message to a user's dialog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Persist the session and send the prompt.
    Advance { session: Session, prompt: Prompt },
    /// Validation miss: re-prompt the same step, session untouched.
    Reprompt { prompt: Prompt },
    /// Delete the session and show the main menu.
    Cancelled { prompt: Prompt },
    /// The dialog is complete; the caller builds and submits the task,
    /// then deletes the session regardless of the outcome.
    Completed { report: CompletedReport },
    /// Text arrived while idle; show the main menu, nothing to store.
    Ignored { prompt: Prompt },
}

/// Deterministic per-user dialog machine: (state, classified input) fully
/// determines the next state and the reply. Pure; persistence and the
/// outbound call live with the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct DialogEngine;

impl DialogEngine {
    pub fn apply(&self, session: Option<Session>, input: DialogInput) -> StepOutcome {
        match input {
            // Cancel wins over everything, in every state.
            DialogInput::Cancel => StepOutcome::Cancelled { prompt: main_menu_prompt() },
            // A trigger clears any stale session and starts the family fresh.
            DialogInput::Trigger(kind) => {
                let session = Session::start(kind);
                let prompt = match session.state {
                    DialogState::AwaitingClaimType => Prompt::with_keyboard(
                        "📋 Select the claim type:",
                        Keyboard::ClaimTypes,
                    ),
                    _ => client_code_prompt(),
                };
                StepOutcome::Advance { session, prompt }
            }
            DialogInput::Text(text) => match session {
                None => StepOutcome::Ignored { prompt: main_menu_prompt() },
                Some(session) => self.step(session, text),
            },
        }
    }

    fn step(&self, mut session: Session, text: String) -> StepOutcome {
        match session.state.clone() {
            DialogState::AwaitingClaimType => match ClaimType::parse(&text) {
                Some(claim_type) => {
                    session.claim_type = Some(claim_type);
                    session.state = DialogState::AwaitingClientCode;
                    StepOutcome::Advance { session, prompt: client_code_prompt() }
                }
                None => StepOutcome::Reprompt {
                    prompt: Prompt::with_keyboard(
                        "❌ Select a claim type from the list!",
                        Keyboard::ClaimTypes,
                    ),
                },
            },
            DialogState::AwaitingClientCode => {
                if !is_digits(&text) {
                    return StepOutcome::Reprompt {
                        prompt: Prompt::new("❌ The code must contain digits only!"),
                    };
                }
                session.client_code = Some(text);
                session.state = DialogState::AwaitingRoute;
                StepOutcome::Advance { session, prompt: Prompt::new("📍 Enter the route:") }
            }
            DialogState::AwaitingRoute => {
                session.route = Some(text);
                let prompt = if session.kind.collects_goods() {
                    session.state = DialogState::AwaitingArticle;
                    article_prompt()
                } else {
                    session.state = DialogState::AwaitingComment;
                    comment_prompt()
                };
                StepOutcome::Advance { session, prompt }
            }
            DialogState::AwaitingArticle => match text.trim() {
                // Self-transition: ask for the next code, store nothing.
                ADD_ARTICLE_LABEL => StepOutcome::Advance { session, prompt: article_prompt() },
                CONTINUE_LABEL => {
                    session.state = DialogState::AwaitingDocument;
                    StepOutcome::Advance {
                        session,
                        prompt: Prompt::new("📄 Enter the document/UPD number:"),
                    }
                }
                _ => {
                    session.state = DialogState::AwaitingQuantity { article: text };
                    StepOutcome::Advance {
                        session,
                        prompt: Prompt::new("🔢 Enter the quantity:"),
                    }
                }
            },
            DialogState::AwaitingQuantity { article } => {
                if !is_digits(&text) {
                    return StepOutcome::Reprompt {
                        prompt: Prompt::new("❌ Enter a number!"),
                    };
                }
                session.items.push(LineItem { article, quantity: text });
                session.state = DialogState::AwaitingArticle;
                StepOutcome::Advance {
                    session,
                    prompt: Prompt::with_keyboard(
                        "✅ Item added!\nAdd another article?",
                        Keyboard::AddMore,
                    ),
                }
            }
            DialogState::AwaitingDocument => {
                session.document_number = Some(text);
                session.state = DialogState::AwaitingComment;
                StepOutcome::Advance { session, prompt: comment_prompt() }
            }
            DialogState::AwaitingComment => match session.finish(text) {
                Some(report) => StepOutcome::Completed { report },
                // A stale blob lost a required field; drop it rather than
                // trapping the user in a step that can never complete.
                None => StepOutcome::Cancelled {
                    prompt: Prompt::with_keyboard(
                        "⚠️ The session was incomplete. Please start over:",
                        Keyboard::MainMenu,
                    ),
                },
            },
        }
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit())
}

fn main_menu_prompt() -> Prompt {
    Prompt::with_keyboard("Hello! Choose a report type:", Keyboard::MainMenu)
}

fn client_code_prompt() -> Prompt {
    Prompt::with_keyboard("📋 Enter the client code:", Keyboard::CancelOnly)
}

fn article_prompt() -> Prompt {
    Prompt::new("📦 Enter the article code:")
}

fn comment_prompt() -> Prompt {
    Prompt::new("📝 Enter a comment:")
}
