//! Answer-Preference Feedback
//!
//! After a completed exchange the user can report which track served them
//! better. The payload echoes both answers back to the backend so the
//! comparison is self-contained; the backend never has to look the exchange
//! up again.
//!
//! Delivery is strictly best-effort. The orchestrator absorbs every failure
//! on this channel; nothing in the answer flow ever depends on it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

// =============================================================================
// Choice
// =============================================================================

/// Which answer track the user preferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackChoice {
    /// The fast answer served best
    Hope,
    /// The detailed streamed answer served best
    Llm,
    /// Both were useful
    Both,
    /// Neither was useful
    Neither,
}

impl std::fmt::Display for FeedbackChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hope => write!(f, "HOPE"),
            Self::Llm => write!(f, "LLM"),
            Self::Both => write!(f, "BOTH"),
            Self::Neither => write!(f, "NEITHER"),
        }
    }
}

impl std::str::FromStr for FeedbackChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOPE" => Ok(Self::Hope),
            "LLM" => Ok(Self::Llm),
            "BOTH" => Ok(Self::Both),
            "NEITHER" => Ok(Self::Neither),
            other => Err(format!(
                "unknown feedback choice '{other}' (expected hope, llm, both or neither)"
            )),
        }
    }
}

// =============================================================================
// Submission Payload
// =============================================================================

/// Fast-track answer as echoed in a feedback payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackHopeAnswer {
    /// The fast answer text shown to the user
    #[serde(default)]
    pub content: String,
    /// Where the fast answer came from (cache, index, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Backend-reported confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Fast-track latency in milliseconds, echoed from the stream
    #[serde(
        default,
        rename = "responseTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time_ms: Option<u64>,
}

impl FeedbackHopeAnswer {
    /// An empty fast-track echo, for exchanges where no fast answer arrived.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            content: String::new(),
            source: None,
            confidence: None,
            response_time_ms: None,
        }
    }
}

/// Wire body of the feedback call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    /// The question both answers responded to
    pub question: String,
    /// Which track the user preferred
    pub choice: FeedbackChoice,
    /// The fast answer as the user saw it
    pub hope_answer: FeedbackHopeAnswer,
    /// The full detail-track answer as the user saw it
    pub llm_answer: String,
    /// Session id of the exchange being rated, when one was assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Stable per-installation user id
    pub user_id: String,
    /// Optional free-text remark from the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Submission time, epoch milliseconds
    pub timestamp: i64,
}

impl FeedbackSubmission {
    /// Build a submission stamped with the current time.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        choice: FeedbackChoice,
        hope_answer: FeedbackHopeAnswer,
        llm_answer: impl Into<String>,
        session_id: Option<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            choice,
            hope_answer,
            llm_answer: llm_answer.into(),
            session_id,
            user_id: user_id.into(),
            comment: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Attach a free-text remark.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_choice_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&FeedbackChoice::Hope).unwrap(),
            "\"HOPE\""
        );
        assert_eq!(
            serde_json::to_string(&FeedbackChoice::Neither).unwrap(),
            "\"NEITHER\""
        );
    }

    #[test]
    fn test_choice_parses_case_insensitively() {
        assert_eq!("hope".parse::<FeedbackChoice>(), Ok(FeedbackChoice::Hope));
        assert_eq!("LLM".parse::<FeedbackChoice>(), Ok(FeedbackChoice::Llm));
        assert_eq!("Both".parse::<FeedbackChoice>(), Ok(FeedbackChoice::Both));
        assert!("meh".parse::<FeedbackChoice>().is_err());
    }

    #[test]
    fn test_submission_wire_shape() {
        let submission = FeedbackSubmission::new(
            "What is X?",
            FeedbackChoice::Both,
            FeedbackHopeAnswer {
                content: "Quick: X is Y".to_string(),
                source: Some("cache".to_string()),
                confidence: Some(0.87),
                response_time_ms: Some(45),
            },
            "X is Y, in detail.",
            Some("s1".to_string()),
            "u-1",
        );

        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["question"], "What is X?");
        assert_eq!(value["choice"], "BOTH");
        assert_eq!(value["hopeAnswer"]["content"], "Quick: X is Y");
        assert_eq!(value["hopeAnswer"]["responseTime"], 45);
        assert_eq!(value["llmAnswer"], "X is Y, in detail.");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["userId"], "u-1");
        assert!(value["timestamp"].is_i64());
        // no comment was attached, so the key is absent entirely
        assert!(value.get("comment").is_none());
    }

    #[test]
    fn test_submission_without_session_id_omits_the_key() {
        let submission = FeedbackSubmission::new(
            "q",
            FeedbackChoice::Llm,
            FeedbackHopeAnswer::empty(),
            "a",
            None,
            "u-1",
        );
        let value = serde_json::to_value(&submission).unwrap();
        assert!(value.get("sessionId").is_none());
    }

    #[test]
    fn test_comment_round_trips() {
        let submission = FeedbackSubmission::new(
            "q",
            FeedbackChoice::Neither,
            FeedbackHopeAnswer::empty(),
            "a",
            None,
            "u-1",
        )
        .with_comment("both missed the point");

        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["comment"], "both missed the point");
        assert_eq!(value["choice"], "NEITHER");
    }
}
