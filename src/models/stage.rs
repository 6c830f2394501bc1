//! Analysis stage identities, statuses, and terminal results.

use serde::{Deserialize, Serialize};

/// One step of the three-step analysis pipeline, in fixed order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Call summary generated from the raw transcript.
    Summary,
    /// Legal assessment grounded in the summary context.
    LegalAssessment,
    /// Final synthesis: legal summary, risks, and next steps.
    RiskAssessment,
}

impl StageKind {
    /// The fixed stage sequence driving the pipeline.
    pub const SEQUENCE: [Self; 3] = [Self::Summary, Self::LegalAssessment, Self::RiskAssessment];

    /// Number of stages in the pipeline.
    pub const COUNT: usize = Self::SEQUENCE.len();

    /// Display title shown above the stage's streamed output.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Summary => "1. Call Summary",
            Self::LegalAssessment => "2. Legal Assessment",
            Self::RiskAssessment => "3. Legal Summary & Next Steps",
        }
    }

    /// Endpoint slug; stage requests go to `{base}/stream_{slug}/{session}`.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::LegalAssessment => "legal_assessment",
            Self::RiskAssessment => "risk_assessment",
        }
    }

    /// Placeholder status message shown until the first fragment arrives.
    #[must_use]
    pub fn status_message(self) -> &'static str {
        match self {
            Self::Summary => "Analyzing transcript...",
            Self::LegalAssessment => "Querying the legal vector store...",
            Self::RiskAssessment => "Generating final recommendations...",
        }
    }

    /// Zero-based position within [`Self::SEQUENCE`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Summary => 0,
            Self::LegalAssessment => 1,
            Self::RiskAssessment => 2,
        }
    }

    /// The stage gated by this stage's completion, if any.
    #[must_use]
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Summary => Some(Self::LegalAssessment),
            Self::LegalAssessment => Some(Self::RiskAssessment),
            Self::RiskAssessment => None,
        }
    }

    /// Whether this stage's request body carries the predecessor's final text.
    ///
    /// Only the synthesis stage declares a data dependency: its body is
    /// `{"legal_assessment": "<final text of the legal assessment stage>"}`.
    #[must_use]
    pub fn carries_predecessor_text(self) -> bool {
        matches!(self, Self::RiskAssessment)
    }
}

/// Lifecycle status for a single stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage request issued; fragments are being appended.
    Streaming,
    /// Stage finished with streamed content.
    Complete,
    /// Stage finished without ever producing content.
    Failed,
}

impl StageStatus {
    /// Whether the stage has reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Structured success/failure classification of a finished stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage produced streamed content (possibly with a trailing
    /// error annotation).
    Success,
    /// An error occurred before any content fragment was appended.
    Failed,
}

/// Terminal value of one stage: the final accumulated text plus outcome.
///
/// Failures are visible here as structured data, not only as the inline
/// annotation embedded in `text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StageResult {
    /// Final accumulated text, including any appended error annotation.
    pub text: String,
    /// Success/failure classification.
    pub outcome: StageOutcome,
}

impl StageResult {
    /// Terminal stage status corresponding to this result.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        match self.outcome {
            StageOutcome::Success => StageStatus::Complete,
            StageOutcome::Failed => StageStatus::Failed,
        }
    }
}
