//! Record schema shared by every labeling function
//!
//! A [`Record`] is one labelable unit: video metadata plus an optional
//! diarized transcript. Voters only ever borrow records immutably.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Single-element comment list marking a video whose comments are disabled
pub const COMMENTS_DISABLED: &str = "<<<Comments Disabled>>>";

// ============================================================================
// Votes and labels
// ============================================================================

/// Output of one labeling function for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
#[repr(i8)]
pub enum Vote {
    /// No opinion; carries no information about the true label
    Abstain = -1,
    NotCall = 0,
    Call = 1,
}

impl Vote {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    pub fn from_i8(value: i8) -> Option<Vote> {
        match value {
            -1 => Some(Vote::Abstain),
            0 => Some(Vote::NotCall),
            1 => Some(Vote::Call),
            _ => None,
        }
    }

    pub fn is_abstain(self) -> bool {
        self == Vote::Abstain
    }

    /// The label this vote asserts, `None` for an abstain
    pub fn label(self) -> Option<Label> {
        match self {
            Vote::Abstain => None,
            Vote::NotCall => Some(Label::NotCall),
            Vote::Call => Some(Label::Call),
        }
    }
}

impl From<Vote> for i8 {
    fn from(vote: Vote) -> i8 {
        vote.as_i8()
    }
}

impl TryFrom<i8> for Vote {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        Vote::from_i8(value).ok_or_else(|| format!("invalid vote value {}", value))
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Abstain => write!(f, "ABSTAIN"),
            Vote::NotCall => write!(f, "NOTCALL"),
            Vote::Call => write!(f, "CALL"),
        }
    }
}

/// Ground-truth class of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Label {
    NotCall,
    Call,
}

impl Label {
    /// Map a "truthy" annotation to CALL, anything else to NOTCALL
    pub fn from_truthy(truthy: bool) -> Label {
        if truthy {
            Label::Call
        } else {
            Label::NotCall
        }
    }

    pub fn vote(self) -> Vote {
        match self {
            Label::NotCall => Vote::NotCall,
            Label::Call => Vote::Call,
        }
    }
}

impl From<Label> for i8 {
    fn from(label: Label) -> i8 {
        label.vote().as_i8()
    }
}

impl TryFrom<i8> for Label {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::NotCall),
            1 => Ok(Label::Call),
            other => Err(format!("invalid ground-truth label {}", other)),
        }
    }
}

// ============================================================================
// Transcript
// ============================================================================

/// One diarized transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizedSegment {
    /// Speaker identifier, unique per voice within a record only
    pub speaker: u32,
    /// Segment start (seconds)
    pub start_time: f64,
    /// Segment end (seconds), never before `start_time`
    pub end_time: f64,
    pub text: String,
}

impl DiarizedSegment {
    pub fn new(speaker: u32, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            speaker,
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Spoken duration in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Flatten a transcript into the single block string voters search
pub fn flatten_transcript(segments: &[DiarizedSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Record
// ============================================================================

/// One labelable unit (video + optional transcript)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Upstream video identifier, used only for diagnostics
    #[serde(default)]
    pub video_id: Option<String>,

    pub title: String,
    pub desc: String,
    pub channel_name: String,
    pub views: u64,

    /// Comment texts; `[COMMENTS_DISABLED]` when comments are turned off
    #[serde(default)]
    pub comments: Vec<String>,

    /// Diarized transcript; `None` means no transcript is available
    #[serde(default)]
    pub transcription: Option<Vec<DiarizedSegment>>,

    /// Transcript flattened to one string, present iff `transcription` is
    #[serde(default)]
    pub transcription_block: Option<String>,

    /// Ground truth, when known
    #[serde(default)]
    pub label: Option<Label>,

    /// Any further upstream fields (e.g. crowd-sourced annotations)
    #[serde(flatten)]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Create a record with no comments, transcript, label or annotations
    pub fn new(
        title: impl Into<String>,
        desc: impl Into<String>,
        channel_name: impl Into<String>,
        views: u64,
    ) -> Self {
        Self {
            video_id: None,
            title: title.into(),
            desc: desc.into(),
            channel_name: channel_name.into(),
            views,
            comments: Vec::new(),
            transcription: None,
            transcription_block: None,
            label: None,
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }

    /// Attach a transcript; also derives `transcription_block`
    pub fn with_transcription(mut self, segments: Vec<DiarizedSegment>) -> Self {
        self.transcription_block = Some(flatten_transcript(&segments));
        self.transcription = Some(segments);
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_annotation(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.annotations.insert(name.into(), value);
        self
    }

    /// Transcript segments, `None` when no transcript exists
    pub fn transcript(&self) -> Option<&[DiarizedSegment]> {
        self.transcription.as_deref()
    }

    /// Flattened transcript, `None` when no transcript exists
    pub fn transcript_block(&self) -> Option<&str> {
        self.transcription.as_ref()?;
        self.transcription_block.as_deref()
    }

    /// True when the comment list is the "comments disabled" sentinel
    pub fn comments_disabled(&self) -> bool {
        self.comments.first().map(String::as_str) == Some(COMMENTS_DISABLED)
    }

    /// Raw upstream field by name
    pub fn annotation(&self, name: &str) -> Option<&serde_json::Value> {
        self.annotations.get(name)
    }

    /// Short identifier for log messages
    pub fn display_id(&self) -> &str {
        self.video_id.as_deref().unwrap_or(&self.title)
    }

    /// Check the structural invariants upstream collaborators must uphold
    ///
    /// # Errors
    /// `Error::VoterInput` when the transcript block and transcript disagree
    /// on presence, or a segment ends before it starts.
    pub fn validate(&self) -> Result<()> {
        match (&self.transcription, &self.transcription_block) {
            (Some(_), None) => {
                return Err(Error::VoterInput(format!(
                    "record '{}' has a transcription but no transcription_block",
                    self.display_id()
                )))
            }
            (None, Some(_)) => {
                return Err(Error::VoterInput(format!(
                    "record '{}' has a transcription_block but no transcription",
                    self.display_id()
                )))
            }
            _ => {}
        }

        for (i, segment) in self.transcript().unwrap_or_default().iter().enumerate() {
            if !segment.start_time.is_finite() || !segment.end_time.is_finite() {
                return Err(Error::VoterInput(format!(
                    "record '{}' segment {} has a non-finite timestamp",
                    self.display_id(),
                    i
                )));
            }
            if segment.end_time < segment.start_time {
                return Err(Error::VoterInput(format!(
                    "record '{}' segment {} ends ({:.2}s) before it starts ({:.2}s)",
                    self.display_id(),
                    i,
                    segment.end_time,
                    segment.start_time
                )));
            }
        }

        Ok(())
    }
}
