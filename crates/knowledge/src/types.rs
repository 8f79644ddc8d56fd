//! Domain types shared by routing, retrieval and synthesis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// The two independently indexed corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// General labor code (Code du travail)
    General,
    /// Collective agreements (KALI)
    Sector,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Sector => "sector",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "general" | "code" | "code_travail" => Some(Self::General),
            "sector" | "kali" | "convention" => Some(Self::Sector),
            _ => None,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval strategy chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    GeneralOnly,
    SectorOnly,
    GeneralThenSector,
    SectorThenGeneral,
}

impl RoutingStrategy {
    pub const ALL: [RoutingStrategy; 4] = [
        Self::GeneralOnly,
        Self::SectorOnly,
        Self::GeneralThenSector,
        Self::SectorThenGeneral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralOnly => "general_only",
            Self::SectorOnly => "sector_only",
            Self::GeneralThenSector => "general_then_sector",
            Self::SectorThenGeneral => "sector_then_general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// Collections to query, in call order.
    pub fn collections(&self) -> &'static [CollectionKind] {
        match self {
            Self::GeneralOnly => &[CollectionKind::General],
            Self::SectorOnly => &[CollectionKind::Sector],
            Self::GeneralThenSector => &[CollectionKind::General, CollectionKind::Sector],
            Self::SectorThenGeneral => &[CollectionKind::Sector, CollectionKind::General],
        }
    }

    /// Whether the strategy touches the sector collection.
    pub fn needs_sector(&self) -> bool {
        !matches!(self, Self::GeneralOnly)
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason attached to every degraded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    RoutingError,
    CollectionUnavailable,
    SynthesisError,
    NoPassages,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoutingError => "routing_error",
            Self::CollectionUnavailable => "collection_unavailable",
            Self::SynthesisError => "synthesis_error",
            Self::NoPassages => "no_passages",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fallback that was taken, with its cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub reason: FallbackReason,
    pub detail: String,
}

impl Degradation {
    pub fn new(reason: FallbackReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Structural metadata of an indexed article chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapitre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,

    /// Article number as printed (e.g. "L1221-19", "2.3")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_num: Option<String>,

    /// Légifrance article identifier (LEGIARTI...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub idcc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convention_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,

    /// Start of validity
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_date"
    )]
    pub date_debut: Option<NaiveDate>,
    /// End of validity
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_date"
    )]
    pub date_fin: Option<NaiveDate>,
}

/// Accepts `"YYYY-MM-DD"` or a full timestamp; anything else becomes `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
}

/// IDCC values are stored as text or as integers depending on the ingester.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl PassageMetadata {
    /// "Livre > Titre > Chapitre > Section", skipping missing levels.
    pub fn hierarchy_path(&self) -> Option<String> {
        let levels: Vec<&str> = [&self.livre, &self.titre, &self.chapitre, &self.section_title]
            .into_iter()
            .filter_map(|l| l.as_deref())
            .filter(|l| !l.trim().is_empty())
            .collect();
        (!levels.is_empty()).then(|| levels.join(" > "))
    }

    /// Whether the article is in force on `date` (open-ended bounds count as valid).
    pub fn is_in_force(&self, date: NaiveDate) -> bool {
        self.date_debut.map_or(true, |start| start <= date)
            && self.date_fin.map_or(true, |end| date < end)
    }

    /// "2/5" for chunked articles.
    pub fn chunk_label(&self) -> Option<String> {
        match (self.chunk_index, self.total_chunks) {
            (Some(i), Some(n)) if n > 1 => Some(format!("{}/{}", i + 1, n)),
            _ => None,
        }
    }
}

/// A passage returned by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub source_collection: CollectionKind,
    pub passage_id: String,
    pub text: String,

    /// Similarity in [0, 1], higher is more relevant
    pub similarity_score: f32,

    pub metadata: PassageMetadata,

    /// Sector filter the passage was retrieved under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_name: Option<String>,
}

/// Outcome of one collection call, kept for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub collection: CollectionKind,

    /// Passages contributed before merging
    pub returned: usize,

    /// Set when the call failed or timed out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Deduplicated, score-sorted and truncated passages.
///
/// Built in one go by [`RankedResultSet::merge`]; never edited afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResultSet {
    passages: Vec<RetrievedPassage>,
    top_k: usize,
}

impl RankedResultSet {
    /// Merge batches given in call order.
    ///
    /// Concatenates, keeps the first occurrence of each `passage_id`, sorts by
    /// descending score (stable, so ties keep call order) and truncates to
    /// `top_k`.
    pub fn merge<I>(batches: I, top_k: usize) -> Self
    where
        I: IntoIterator<Item = Vec<RetrievedPassage>>,
    {
        let mut seen = HashSet::new();
        let mut passages: Vec<RetrievedPassage> = batches
            .into_iter()
            .flatten()
            .filter(|p| seen.insert(p.passage_id.clone()))
            .collect();

        passages.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        passages.truncate(top_k);

        Self { passages, top_k }
    }

    pub fn passages(&self) -> &[RetrievedPassage] {
        &self.passages
    }

    pub fn into_passages(self) -> Vec<RetrievedPassage> {
        self.passages
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Router output. Created once per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub strategy: RoutingStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<String>,

    pub confidence_rationale: String,

    /// Set when the decision is the routing fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
}

impl RoutingDecision {
    /// General-only decision used whenever routing fails.
    pub fn fallback(detail: &str) -> Self {
        Self {
            strategy: RoutingStrategy::GeneralOnly,
            sector_id: None,
            confidence_rationale: format!(
                "fallback: {} ({})",
                FallbackReason::RoutingError,
                detail
            ),
            fallback: Some(FallbackReason::RoutingError),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Synthesizer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedAnswer {
    pub answer_text: String,

    /// In [0, 1]
    pub confidence: f32,

    /// 1-based positions in the passage list given to synthesis
    pub cited_indices: BTreeSet<usize>,

    pub synthesis_rationale: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
}
