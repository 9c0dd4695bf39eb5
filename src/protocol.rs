//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;
use crate::logic::{CheckResult, LoadedDocument};
use crate::session::{ChallengeItem, ChallengeSession, ChatTurn, CheckOutcome, ItemStatus, SessionState};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    LoadDocument(UploadIn),
    Ask {
        question: String,
    },
    ClearMemory,
    StartChallenge,
    CheckAnswer {
        index: usize,
        answer: String,
    },
    NewChallenge,
    GetState,
}

impl ClientWsMessage {
    /// Wire tag of the message, for logs that must not carry document or question text.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::LoadDocument(_) => "load_document",
            ClientWsMessage::Ask { .. } => "ask",
            ClientWsMessage::ClearMemory => "clear_memory",
            ClientWsMessage::StartChallenge => "start_challenge",
            ClientWsMessage::CheckAnswer { .. } => "check_answer",
            ClientWsMessage::NewChallenge => "new_challenge",
            ClientWsMessage::GetState => "get_state",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Summary(DocumentOut),
    Answer(AnswerOut),
    MemoryCleared,
    Challenge {
        challenge: ChallengeOut,
    },
    CheckResult(CheckOut),
    State(SessionOut),
    Error {
        message: String,
    },
}

//
// Shared DTOs
//

#[derive(Debug, Deserialize)]
pub struct UploadIn {
    pub filename: String,
    /// `pdf`, `txt` or a MIME type; inferred from `filename` when absent.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(rename = "contentBase64")]
    pub content_base64: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentOut {
    pub filename: String,
    pub kind: DocumentKind,
    pub chars: usize,
    pub summary: String,
}

pub fn document_out(d: LoadedDocument) -> DocumentOut {
    DocumentOut { filename: d.name, kind: d.kind, chars: d.chars, summary: d.summary }
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub question: String,
    pub answer: String,
    pub snippet: String,
}

#[derive(Debug, Serialize)]
pub struct ItemOut {
    pub question: String,
    #[serde(rename = "userAnswer")]
    pub user_answer: String,
    pub status: ItemStatus,
    pub correct: Option<bool>,
    pub justification: Option<String>,
    pub snippet: Option<String>,
    pub attempts: u32,
    #[serde(rename = "attemptsExhausted")]
    pub attempts_exhausted: bool,
}

pub fn item_out(i: &ChallengeItem) -> ItemOut {
    ItemOut {
        question: i.question().to_string(),
        user_answer: i.user_answer().to_string(),
        status: i.status(),
        correct: i.correct(),
        justification: i.feedback().map(|f| f.justification.clone()),
        snippet: i.feedback().map(|f| f.snippet.clone()),
        attempts: i.attempts(),
        attempts_exhausted: i.attempts_exhausted(),
    }
}

#[derive(Debug, Serialize)]
pub struct ChallengeOut {
    pub items: Vec<ItemOut>,
    pub completed: bool,
    pub degraded: bool,
    #[serde(rename = "correctCount")]
    pub correct_count: usize,
}

/// Convert the internal challenge to the public DTO.
pub fn challenge_out(c: &ChallengeSession) -> ChallengeOut {
    ChallengeOut {
        items: c.items().iter().map(item_out).collect(),
        completed: c.completed(),
        degraded: c.degraded(),
        correct_count: c.correct_count(),
    }
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    /// Set when the answer was blank and nothing was evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub item: ItemOut,
    #[serde(rename = "challengeCompleted")]
    pub challenge_completed: bool,
}

pub fn check_out(index: usize, r: CheckResult) -> CheckOut {
    let warning = matches!(r.outcome, CheckOutcome::EmptyAnswer)
        .then(|| "Please enter an answer before checking.".to_string());
    CheckOut { index, outcome: r.outcome, warning, item: item_out(&r.item), challenge_completed: r.completed }
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    pub document: Option<String>,
    pub kind: Option<DocumentKind>,
    pub summary: Option<String>,
    pub history: Vec<ChatTurn>,
    pub challenge: Option<ChallengeOut>,
}

pub fn session_out(s: &SessionState) -> SessionOut {
    SessionOut {
        document: s.document().map(|d| d.name.clone()),
        kind: s.document().map(|d| d.kind),
        summary: s.summary().map(str::to_string),
        history: s.memory().turns().to_vec(),
        challenge: s.challenge().map(challenge_out),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct SessionCreatedOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Deserialize)]
pub struct AskIn {
    pub question: String,
}

#[derive(Deserialize)]
pub struct CheckIn {
    pub index: usize,
    pub answer: String,
}

#[derive(Serialize)]
pub struct HistoryOut {
    pub turns: Vec<ChatTurn>,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    #[serde(rename = "liveSessions")]
    pub live_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::GeneratedQuestions;

    #[test]
    fn ws_messages_parse_by_type_tag() {
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"check_answer","index":2,"answer":"blue"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::CheckAnswer { index: 2, .. }));

        let m: ClientWsMessage = serde_json::from_str(
            r#"{"type":"load_document","filename":"a.txt","contentBase64":"aGk="}"#,
        )
        .unwrap();
        match m {
            ClientWsMessage::LoadDocument(up) => {
                assert_eq!(up.filename, "a.txt");
                assert!(up.kind.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn kind_matches_wire_tag() {
        for raw in [
            r#"{"type":"ping"}"#,
            r#"{"type":"ask","question":"secret question"}"#,
            r#"{"type":"load_document","filename":"a.txt","contentBase64":"aGk="}"#,
            r#"{"type":"check_answer","index":0,"answer":"secret"}"#,
            r#"{"type":"get_state"}"#,
        ] {
            let m: ClientWsMessage = serde_json::from_str(raw).unwrap();
            let tag: serde_json::Value = serde_json::from_str(raw).unwrap();
            assert_eq!(m.kind(), tag["type"]);
            assert!(!m.kind().contains("secret"));
        }
    }

    #[test]
    fn empty_check_carries_warning() {
        let c = ChallengeSession::new(GeneratedQuestions::degraded());
        let r = CheckResult { outcome: CheckOutcome::EmptyAnswer, item: c.item(0).unwrap().clone(), completed: false };
        let v = serde_json::to_value(check_out(0, r)).unwrap();
        assert_eq!(v["outcome"], "empty_answer");
        assert_eq!(v["warning"], "Please enter an answer before checking.");
        assert_eq!(v["item"]["status"], "unanswered");
        assert_eq!(v["item"]["attempts"], 0);
    }

    #[test]
    fn server_messages_are_tagged() {
        let v = serde_json::to_value(ServerWsMessage::Error { message: "boom".into() }).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["message"], "boom");
        let v = serde_json::to_value(ServerWsMessage::Answer(AnswerOut {
            question: "q".into(),
            answer: "a".into(),
            snippet: "s".into(),
        }))
        .unwrap();
        assert_eq!(v["type"], "answer");
        assert_eq!(v["snippet"], "s");
    }
}
