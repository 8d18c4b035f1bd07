// Labeling Function Registry
//
// Three disjoint voter groups, applied in this order:
// content signals → scam-type signals → transcript signals

pub mod content;
pub mod scam_types;
pub mod transcript;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use sbws_common::{Error, Record, Result, Vote};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Thematic group a labeling function belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Title, description and channel metadata heuristics
    Content,
    /// Keyword signals for specific scam premises
    ScamType,
    /// Heuristics over the diarized transcript
    Transcript,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Content => write!(f, "content"),
            Category::ScamType => write!(f, "scam_types"),
            Category::Transcript => write!(f, "transcript"),
        }
    }
}

/// Labeling function trait - every voter implements this
///
/// Voters are stateless apart from immutable compiled patterns. They borrow
/// the record, never see other voters' output, and return ABSTAIN instead of
/// failing when optional data is missing.
pub trait LabelingFunction: Send + Sync {
    /// Stable unique identifier (used in exclusion lists and reports)
    fn name(&self) -> &'static str;

    /// Why this heuristic should correlate with the true label
    fn rationale(&self) -> &'static str;

    fn category(&self) -> Category;

    /// Cast this voter's vote for one record
    fn vote(&self, record: &Record) -> Vote;
}

impl fmt::Debug for dyn LabelingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelingFunction")
            .field("name", &self.name())
            .field("category", &self.category())
            .finish()
    }
}

/// Shared handle to a labeling function
pub type SharedLf = Arc<dyn LabelingFunction>;

/// Ordered, named collection of labeling functions
///
/// Built per run by the orchestrator; never a process-wide global.
#[derive(Debug, Clone)]
pub struct Registry {
    functions: Vec<SharedLf>,
}

impl Registry {
    /// Registry with every built-in voter in canonical order
    pub fn standard() -> Result<Self> {
        let mut functions = content::all();
        functions.extend(scam_types::all());
        functions.extend(transcript::all()?);
        Self::from_functions(functions)
    }

    /// Build a registry from an explicit voter list
    ///
    /// # Errors
    /// `Error::Configuration` when two voters share a name.
    pub fn from_functions(functions: Vec<SharedLf>) -> Result<Self> {
        let mut seen = HashSet::new();
        for lf in &functions {
            if !seen.insert(lf.name()) {
                return Err(Error::Configuration(format!(
                    "duplicate labeling function name '{}'",
                    lf.name()
                )));
            }
        }
        debug!("Registry built with {} labeling functions", functions.len());
        Ok(Self { functions })
    }

    pub fn all(&self) -> &[SharedLf] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Voters of one category, in registry order
    pub fn by_category(&self, category: Category) -> Vec<SharedLf> {
        self.functions
            .iter()
            .filter(|lf| lf.category() == category)
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.functions.iter().map(|lf| lf.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&SharedLf> {
        self.functions.iter().find(|lf| lf.name() == name)
    }

    /// Every voter except the named ones, in registry order
    ///
    /// Names that match no voter are logged and ignored.
    pub fn excluding<S: AsRef<str>>(&self, excluded: &[S]) -> ActiveSet {
        let excluded: HashSet<&str> = excluded.iter().map(|s| s.as_ref()).collect();

        for name in &excluded {
            if self.get(name).is_none() {
                warn!("Excluded labeling function '{}' is not registered", name);
            }
        }

        let functions: Vec<SharedLf> = self
            .functions
            .iter()
            .filter(|lf| !excluded.contains(lf.name()))
            .cloned()
            .collect();

        debug!(
            "Active labeling functions: {} of {} ({} excluded)",
            functions.len(),
            self.functions.len(),
            self.functions.len() - functions.len()
        );

        ActiveSet { functions }
    }

    /// Every voter, in registry order
    pub fn active(&self) -> ActiveSet {
        ActiveSet {
            functions: self.functions.clone(),
        }
    }
}

/// Ordered subset of a registry that defines matrix columns
#[derive(Debug, Clone)]
pub struct ActiveSet {
    functions: Vec<SharedLf>,
}

impl ActiveSet {
    pub fn functions(&self) -> &[SharedLf] {
        &self.functions
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.iter().map(|lf| lf.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ============================================================================
// Shared keyword voter
// ============================================================================

/// Record text field a keyword voter inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Desc,
    Channel,
}

impl Field {
    fn text(self, record: &Record) -> &str {
        match self {
            Field::Title => &record.title,
            Field::Desc => &record.desc,
            Field::Channel => &record.channel_name,
        }
    }
}

/// Votes `hit` when any (field, needle) pair matches case-insensitively, else `miss`
pub struct KeywordVoter {
    pub name: &'static str,
    pub rationale: &'static str,
    pub category: Category,
    pub matches: Vec<(Field, &'static str)>,
    pub hit: Vote,
    pub miss: Vote,
}

impl KeywordVoter {
    /// Same needle checked against title and description
    pub fn title_or_desc(
        name: &'static str,
        rationale: &'static str,
        category: Category,
        needles: &[&'static str],
        hit: Vote,
    ) -> Self {
        let matches = needles
            .iter()
            .flat_map(|n| [(Field::Title, *n), (Field::Desc, *n)])
            .collect();
        Self {
            name,
            rationale,
            category,
            matches,
            hit,
            miss: Vote::Abstain,
        }
    }

    pub fn otherwise(mut self, miss: Vote) -> Self {
        self.miss = miss;
        self
    }
}

impl LabelingFunction for KeywordVoter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn rationale(&self) -> &'static str {
        self.rationale
    }

    fn category(&self) -> Category {
        self.category
    }

    fn vote(&self, record: &Record) -> Vote {
        let found = self
            .matches
            .iter()
            .any(|(field, needle)| field.text(record).to_lowercase().contains(needle));
        if found {
            self.hit
        } else {
            self.miss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbws_common::DiarizedSegment;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new("", "", "", 0),
            Record::new("LIVE scambait", "refund IRS crypto scheme hack sponsor", "World News", 5),
            Record::new("Tech Support", "norton", "Baiter", 1_000_000).with_transcription(vec![
                DiarizedSegment::new(0, 0.0, 10.0, "hello thank you for calling"),
                DiarizedSegment::new(1, 10.0, 20.0, "hi they said anydesk"),
            ]),
            Record::new("x", "y", "z", 50).with_transcription(vec![]),
        ]
    }

    #[test]
    fn test_standard_registry_groups_are_disjoint_and_ordered() {
        let registry = Registry::standard().unwrap();
        let content = registry.by_category(Category::Content);
        let scam = registry.by_category(Category::ScamType);
        let transcript = registry.by_category(Category::Transcript);

        assert_eq!(content.len(), 9);
        assert_eq!(scam.len(), 6);
        assert_eq!(transcript.len(), 8);
        assert_eq!(registry.len(), content.len() + scam.len() + transcript.len());

        // Registry order: content, then scam types, then transcript
        let categories: Vec<Category> = registry.all().iter().map(|lf| lf.category()).collect();
        let mut sorted = categories.clone();
        sorted.sort_by_key(|c| match c {
            Category::Content => 0,
            Category::ScamType => 1,
            Category::Transcript => 2,
        });
        assert_eq!(categories, sorted);
    }

    #[test]
    fn test_names_are_unique() {
        let registry = Registry::standard().unwrap();
        let names = registry.names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let a: SharedLf = Arc::new(KeywordVoter::title_or_desc(
            "dup",
            "",
            Category::Content,
            &["x"],
            Vote::Call,
        ));
        let result = Registry::from_functions(vec![a.clone(), a]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_excluding_preserves_order() {
        let registry = Registry::standard().unwrap();
        let active = registry.excluding(&["small_video", "transcript_sentiment", "no_such_lf"]);

        let expected: Vec<String> = registry
            .names()
            .into_iter()
            .filter(|n| *n != "small_video" && *n != "transcript_sentiment")
            .map(String::from)
            .collect();
        assert_eq!(active.names(), expected);
        assert_eq!(active.len(), registry.len() - 2);
    }

    #[test]
    fn test_every_voter_returns_a_valid_vote() {
        let registry = Registry::standard().unwrap();
        for record in sample_records() {
            for lf in registry.all() {
                let vote = lf.vote(&record);
                assert!(
                    matches!(vote.as_i8(), -1..=1),
                    "{} returned {:?}",
                    lf.name(),
                    vote
                );
            }
        }
    }

    #[test]
    fn test_transcript_voters_abstain_without_transcript() {
        let registry = Registry::standard().unwrap();
        let record = Record::new(
            "hello hello thank you for calling anydesk",
            "secure server",
            "news",
            10,
        );
        for lf in registry.by_category(Category::Transcript) {
            assert_eq!(lf.vote(&record), Vote::Abstain, "{} did not abstain", lf.name());
        }
    }

    #[test]
    fn test_keyword_voter_is_case_insensitive() {
        let voter = KeywordVoter::title_or_desc(
            "irs",
            "",
            Category::ScamType,
            &["irs"],
            Vote::Call,
        );
        assert_eq!(voter.vote(&Record::new("The IRS called", "", "", 0)), Vote::Call);
        assert_eq!(voter.vote(&Record::new("nothing", "", "", 0)), Vote::Abstain);
    }
}
