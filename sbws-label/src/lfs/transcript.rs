// Transcript signals - heuristics over the diarized call transcript
//
// Every voter here abstains when the record carries no transcript. The
// presence check is the explicit `Option` on the record, never emptiness.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use sbws_common::{DiarizedSegment, Error, Record, Result, Vote};
use tracing::trace;

use super::{Category, LabelingFunction, SharedLf};

/// Length of one speaker-dominance window (seconds)
pub const WINDOW_SECONDS: f64 = 30.0;

/// Share of a window two speakers must exceed together (and one must not exceed alone)
pub const WINDOW_MAJORITY: f64 = 0.70;

/// Share of windows that must be two-speaker dominated
pub const DOMINATED_WINDOW_MAJORITY: f64 = 0.5;

/// Third-person share of pronoun matches above which the record is NOTCALL
pub const THIRD_PERSON_RATIO: f64 = 0.65;

/// All transcript voters in registry order
pub fn all() -> Result<Vec<SharedLf>> {
    let mut voters: Vec<SharedLf> = Vec::new();

    voters.push(Arc::new(TwoHellos::new()?));
    voters.push(Arc::new(PhraseVoter {
        name: "thanks_for_calling",
        rationale: "A scam call centre thanks the victim for calling",
        phrases: &["thank you for calling"],
    }));
    voters.push(Arc::new(OnlyTwoPeopleSpeaking::default()));
    voters.push(Arc::new(NumberOfSpeakers));
    voters.push(Arc::new(TranscriptSentiment));
    voters.push(Arc::new(PhraseVoter {
        name: "anydesk_in_transcript",
        rationale: "AnyDesk is a common remote-access tool used in scam calls",
        phrases: &["anydesk", "any desk"],
    }));
    voters.push(Arc::new(PhraseVoter {
        name: "secure_server_in_transcript",
        rationale: "Secure server is common jargon used in scam calls",
        phrases: &["secure server"],
    }));
    voters.push(Arc::new(PronounUsage::new()?));

    Ok(voters)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::Configuration(format!("invalid voter pattern '{}': {}", pattern, e)))
}

/// Run `f` on the transcript, or abstain when there is none
fn with_transcript<F>(record: &Record, f: F) -> Vote
where
    F: FnOnce(&[DiarizedSegment], &str) -> Vote,
{
    match (record.transcript(), record.transcript_block()) {
        (Some(segments), Some(block)) => f(segments, block),
        _ => Vote::Abstain,
    }
}

// ============================================================================
// Greetings
// ============================================================================

/// One greeting is the video intro; a second is the hello of the call itself
pub struct TwoHellos {
    greeting: Regex,
}

impl TwoHellos {
    pub fn new() -> Result<Self> {
        Ok(Self {
            greeting: compile(r"\b(?:hello|hi|yo|hey)\b")?,
        })
    }

    /// Word-bounded greetings across all segments
    pub fn count_greetings(&self, segments: &[DiarizedSegment]) -> usize {
        segments
            .iter()
            .map(|s| self.greeting.find_iter(&s.text.to_lowercase()).count())
            .sum()
    }
}

impl LabelingFunction for TwoHellos {
    fn name(&self) -> &'static str {
        "two_hellos"
    }

    fn rationale(&self) -> &'static str {
        "One greeting can be presumed to be an intro, the second is the hello to a scam call"
    }

    fn category(&self) -> Category {
        Category::Transcript
    }

    fn vote(&self, record: &Record) -> Vote {
        with_transcript(record, |segments, _| {
            if self.count_greetings(segments) > 1 {
                Vote::Call
            } else {
                Vote::Abstain
            }
        })
    }
}

// ============================================================================
// Phrase matches
// ============================================================================

/// CALL when any phrase occurs in the lower-cased transcript block
pub struct PhraseVoter {
    pub name: &'static str,
    pub rationale: &'static str,
    pub phrases: &'static [&'static str],
}

impl LabelingFunction for PhraseVoter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn rationale(&self) -> &'static str {
        self.rationale
    }

    fn category(&self) -> Category {
        Category::Transcript
    }

    fn vote(&self, record: &Record) -> Vote {
        with_transcript(record, |_, block| {
            let block = block.to_lowercase();
            if self.phrases.iter().any(|p| block.contains(p)) {
                Vote::Call
            } else {
                Vote::Abstain
            }
        })
    }
}

// ============================================================================
// Speaker dominance
// ============================================================================

/// Scam calls are a conversation between two parties for most of the video
///
/// Windows are bucketed by an accumulating counter: a window closes when a
/// segment starts after `closed_windows * 30 + 30` seconds. A long silence
/// therefore closes only one window, and the following speech is measured
/// against the next boundary rather than its absolute 30 s slot.
pub struct OnlyTwoPeopleSpeaking {
    pub window_seconds: f64,
    pub majority: f64,
    pub majority_windows: f64,
}

impl Default for OnlyTwoPeopleSpeaking {
    fn default() -> Self {
        Self {
            window_seconds: WINDOW_SECONDS,
            majority: WINDOW_MAJORITY,
            majority_windows: DOMINATED_WINDOW_MAJORITY,
        }
    }
}

impl OnlyTwoPeopleSpeaking {
    /// Per-window dominance flags, in window order
    pub fn window_flags(&self, segments: &[DiarizedSegment]) -> Vec<bool> {
        let mut flags = Vec::new();
        let mut speaker_time: BTreeMap<u32, f64> = BTreeMap::new();
        let mut window_time = 0.0;

        for segment in segments {
            let boundary = flags.len() as f64 * self.window_seconds + self.window_seconds;
            if segment.start_time > boundary {
                flags.push(self.is_dominated(&speaker_time, window_time));
                speaker_time.clear();
                window_time = 0.0;
            }
            *speaker_time.entry(segment.speaker).or_insert(0.0) += segment.duration();
            window_time += segment.duration();
        }

        // Trailing window still open when the transcript ends
        if !speaker_time.is_empty() {
            flags.push(self.is_dominated(&speaker_time, window_time));
        }

        flags
    }

    /// A single speaker above the majority rules the window out before pairs are checked
    pub fn is_dominated(&self, speaker_time: &BTreeMap<u32, f64>, window_time: f64) -> bool {
        if window_time <= 0.0 {
            return false;
        }

        let shares: Vec<f64> = speaker_time.values().map(|t| t / window_time).collect();

        if shares.iter().any(|share| *share > self.majority) {
            return false;
        }

        shares.iter().enumerate().any(|(i, a)| {
            shares
                .iter()
                .skip(i + 1)
                .any(|b| a + b > self.majority)
        })
    }
}

impl LabelingFunction for OnlyTwoPeopleSpeaking {
    fn name(&self) -> &'static str {
        "only_two_people_speaking"
    }

    fn rationale(&self) -> &'static str {
        "When two speakers occupy most of each 30 second block the video is a call"
    }

    fn category(&self) -> Category {
        Category::Transcript
    }

    fn vote(&self, record: &Record) -> Vote {
        with_transcript(record, |segments, _| {
            let flags = self.window_flags(segments);
            if flags.is_empty() {
                return Vote::Abstain;
            }

            let dominated = flags.iter().filter(|f| **f).count();
            let fraction = dominated as f64 / flags.len() as f64;
            trace!(
                "{}: {}/{} windows two-speaker dominated",
                record.display_id(),
                dominated,
                flags.len()
            );

            if fraction > self.majority_windows {
                Vote::Call
            } else {
                Vote::Abstain
            }
        })
    }
}

// ============================================================================
// Speaker count
// ============================================================================

/// Scam calls are generally conducted by two people (three with a narrator)
pub struct NumberOfSpeakers;

impl LabelingFunction for NumberOfSpeakers {
    fn name(&self) -> &'static str {
        "number_of_speakers"
    }

    fn rationale(&self) -> &'static str {
        "Scam calls are generally conducted by two people"
    }

    fn category(&self) -> Category {
        Category::Transcript
    }

    fn vote(&self, record: &Record) -> Vote {
        with_transcript(record, |segments, _| {
            let speakers: HashSet<u32> = segments.iter().map(|s| s.speaker).collect();
            if (2..=3).contains(&speakers.len()) {
                Vote::Call
            } else {
                Vote::Abstain
            }
        })
    }
}

// ============================================================================
// Sentiment
// ============================================================================

/// Scam callers keep the conversation friendly
pub struct TranscriptSentiment;

impl TranscriptSentiment {
    /// VADER (positive, negative) proportions for a text
    pub fn polarity(text: &str) -> (f64, f64) {
        let analyzer = vader_sentiment::SentimentIntensityAnalyzer::new();
        let scores = analyzer.polarity_scores(text);
        let pos = scores.get("pos").copied().unwrap_or(0.0);
        let neg = scores.get("neg").copied().unwrap_or(0.0);
        (pos, neg)
    }
}

impl LabelingFunction for TranscriptSentiment {
    fn name(&self) -> &'static str {
        "transcript_sentiment"
    }

    fn rationale(&self) -> &'static str {
        "Scam calls are generally positive"
    }

    fn category(&self) -> Category {
        Category::Transcript
    }

    fn vote(&self, record: &Record) -> Vote {
        with_transcript(record, |_, block| {
            let (pos, neg) = Self::polarity(block);
            if pos > neg {
                Vote::Call
            } else {
                Vote::Abstain
            }
        })
    }
}

// ============================================================================
// Pronouns
// ============================================================================

/// Callers address the victim ("you"); commentary talks about others ("they")
pub struct PronounUsage {
    second_person: Regex,
    third_person: Regex,
    threshold: f64,
}

impl PronounUsage {
    pub fn new() -> Result<Self> {
        Ok(Self {
            second_person: compile(r"you|your|yours|yourself|yourselves")?,
            third_person: compile(
                r"he|him|his|she|her|hers|they|them|their|theirs|himself|herself|themselves",
            )?,
            threshold: THIRD_PERSON_RATIO,
        })
    }

    /// (second-person, third-person) match counts
    ///
    /// Patterns are unbounded and leftmost-first, so "they" counts once (as
    /// "he") and words such as "the" or "other" count as third person.
    pub fn counts(&self, block: &str) -> (usize, usize) {
        let block = block.to_lowercase();
        (
            self.second_person.find_iter(&block).count(),
            self.third_person.find_iter(&block).count(),
        )
    }
}

impl LabelingFunction for PronounUsage {
    fn name(&self) -> &'static str {
        "pronoun_usage"
    }

    fn rationale(&self) -> &'static str {
        "Third person pronouns should not outnumber second person pronouns in a call"
    }

    fn category(&self) -> Category {
        Category::Transcript
    }

    fn vote(&self, record: &Record) -> Vote {
        with_transcript(record, |_, block| {
            let (second, third) = self.counts(block);
            if second == 0 && third == 0 {
                return Vote::Abstain;
            }
            if third as f64 / (second + third) as f64 > self.threshold {
                Vote::NotCall
            } else {
                Vote::Abstain
            }
        })
    }
}
