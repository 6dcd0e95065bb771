use serde::{Deserialize, Serialize};

/// Which dialog family a report belongs to. The kind is tagged onto the
/// session the moment the driver picks a menu entry and is never inferred
/// from which fields happen to be filled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Refusal,
    Claim,
    Info,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refusal => "refusal",
            Self::Claim => "claim",
            Self::Info => "info",
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Refusal => "Delivery refusal",
            Self::Claim => "Claim",
            Self::Info => "Driver information",
        }
    }

    /// Informational notes need faster triage than goods reports.
    pub fn deadline_days(&self) -> i64 {
        match self {
            Self::Info => 1,
            Self::Refusal | Self::Claim => 3,
        }
    }

    /// Refusal and claim dialogs collect line items and a document number;
    /// the info dialog carries no goods context.
    pub fn collects_goods(&self) -> bool {
        !matches!(self, Self::Info)
    }
}

/// Recognized claim categories. Labels are matched case-sensitively and the
/// selected label flows verbatim into the claim task title.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Undelivered,
    Defective,
    MisPick,
}

impl ClaimType {
    pub const ALL: [ClaimType; 3] = [Self::Undelivered, Self::Defective, Self::MisPick];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Undelivered => "Недовоз",
            Self::Defective => "Брак",
            Self::MisPick => "Пересорт",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|claim_type| claim_type.label() == label)
    }
}

/// One (article, quantity) pair collected during the article loop.
/// Immutable once appended; the quantity is a validated digit string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub article: String,
    pub quantity: String,
}

/// The dialog step the session is waiting on. Idle is represented by the
/// absence of a session, not by a variant. The staged article of the
/// article ⇄ quantity loop lives inside `AwaitingQuantity` so a quantity
/// without an article is unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogState {
    AwaitingClaimType,
    AwaitingClientCode,
    AwaitingRoute,
    AwaitingArticle,
    AwaitingQuantity { article: String },
    AwaitingDocument,
    AwaitingComment,
}

/// Per-user accumulation of dialog answers. A session exists only while its
/// owner is mid-dialog; it is deleted outright on cancellation and on
/// submission, never merely reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub kind: ReportKind,
    pub state: DialogState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_type: Option<ClaimType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
}

impl Session {
    /// Fresh session for the chosen dialog family. The claim family opens
    /// on the claim-type choice; the other two start at the client code.
    pub fn start(kind: ReportKind) -> Self {
        let state = match kind {
            ReportKind::Claim => DialogState::AwaitingClaimType,
            ReportKind::Refusal | ReportKind::Info => DialogState::AwaitingClientCode,
        };
        Self {
            kind,
            state,
            claim_type: None,
            client_code: None,
            route: None,
            items: Vec::new(),
            document_number: None,
        }
    }

    /// Consume the session into a completed report once the comment lands.
    /// Returns `None` if a stale blob is missing fields the dialog should
    /// have collected before reaching the comment step.
    pub fn finish(self, comment: String) -> Option<CompletedReport> {
        let client_code = self.client_code?;
        let route = self.route?;
        if self.kind == ReportKind::Claim && self.claim_type.is_none() {
            return None;
        }
        Some(CompletedReport {
            kind: self.kind,
            claim_type: self.claim_type,
            client_code,
            route,
            items: self.items,
            document_number: self.document_number,
            comment,
        })
    }
}

/// A fully collected dialog, ready for the task request builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedReport {
    pub kind: ReportKind,
    pub claim_type: Option<ClaimType>,
    pub client_code: String,
    pub route: String,
    pub items: Vec<LineItem>,
    pub document_number: Option<String>,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::{ClaimType, DialogState, LineItem, ReportKind, Session};

    #[test]
    fn claim_type_labels_round_trip_and_reject_near_misses() {
        for claim_type in ClaimType::ALL {
            assert_eq!(ClaimType::parse(claim_type.label()), Some(claim_type));
        }
        assert_eq!(ClaimType::parse("недовоз"), None);
        assert_eq!(ClaimType::parse("Брак "), None);
        assert_eq!(ClaimType::parse("Other"), None);
    }

    #[test]
    fn claim_session_opens_on_claim_type_choice() {
        assert_eq!(Session::start(ReportKind::Claim).state, DialogState::AwaitingClaimType);
        assert_eq!(Session::start(ReportKind::Refusal).state, DialogState::AwaitingClientCode);
        assert_eq!(Session::start(ReportKind::Info).state, DialogState::AwaitingClientCode);
    }

    #[test]
    fn finish_rejects_sessions_missing_required_fields() {
        let session = Session::start(ReportKind::Refusal);
        assert_eq!(session.finish("comment".to_owned()), None);

        let mut claim = Session::start(ReportKind::Claim);
        claim.client_code = Some("12345".to_owned());
        claim.route = Some("North-1".to_owned());
        assert_eq!(claim.finish("comment".to_owned()), None, "claim needs a claim type");
    }

    #[test]
    fn session_survives_json_round_trip() {
        let session = Session {
            kind: ReportKind::Claim,
            state: DialogState::AwaitingQuantity { article: "A100".to_owned() },
            claim_type: Some(ClaimType::Defective),
            client_code: Some("777".to_owned()),
            route: Some("Moscow-3".to_owned()),
            items: vec![LineItem { article: "B2".to_owned(), quantity: "4".to_owned() }],
            document_number: None,
        };

        let blob = serde_json::to_string(&session).expect("session should serialize");
        let decoded: Session = serde_json::from_str(&blob).expect("session should deserialize");
        assert_eq!(decoded, session);
    }
}
