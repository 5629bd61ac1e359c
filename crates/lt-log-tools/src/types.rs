//! Core data model: severity levels, count snapshots, comparisons and aggregates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::LogError;

/// Identifier used when a destination's backing file names cannot be determined.
pub const UNKNOWN_SOURCE: &str = "unknown";

// ── Severity ──────────────────────────────────────────────────

/// Log severity level, ordered from least to most severe.
///
/// Variant declaration order is the `Ord` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    /// All eight levels, most severe first.
    pub const ALL: [Severity; 8] = [
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }

    /// Uppercase level name as it appears in `channel.LEVEL:` headers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Alert => "ALERT",
            Self::Emergency => "EMERGENCY",
        }
    }

    /// Substring counted by the severity scanner, e.g. `.ERROR`.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Debug => ".DEBUG",
            Self::Info => ".INFO",
            Self::Notice => ".NOTICE",
            Self::Warning => ".WARNING",
            Self::Error => ".ERROR",
            Self::Critical => ".CRITICAL",
            Self::Alert => ".ALERT",
            Self::Emergency => ".EMERGENCY",
        }
    }

    /// Levels that count as "issues" when comparing runs (warning and above).
    pub fn is_issue(&self) -> bool {
        *self >= Self::Warning
    }
}

impl FromStr for Severity {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            other => Err(LogError::UnknownSeverity(other.to_string())),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Severity Counts ───────────────────────────────────────────

/// Number of records per severity level in one counting pass.
///
/// Serializes to a flat mapping keyed by level name; missing keys
/// deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityCounts {
    pub emergency: u64,
    pub alert: u64,
    pub critical: u64,
    pub error: u64,
    pub warning: u64,
    pub notice: u64,
    pub info: u64,
    pub debug: u64,
}

impl SeverityCounts {
    pub fn get(&self, level: Severity) -> u64 {
        match level {
            Severity::Emergency => self.emergency,
            Severity::Alert => self.alert,
            Severity::Critical => self.critical,
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Notice => self.notice,
            Severity::Info => self.info,
            Severity::Debug => self.debug,
        }
    }

    /// Return a copy with `level` set to `count`.
    pub fn with(mut self, level: Severity, count: u64) -> Self {
        *self.slot_mut(level) = count;
        self
    }

    fn slot_mut(&mut self, level: Severity) -> &mut u64 {
        match level {
            Severity::Emergency => &mut self.emergency,
            Severity::Alert => &mut self.alert,
            Severity::Critical => &mut self.critical,
            Severity::Error => &mut self.error,
            Severity::Warning => &mut self.warning,
            Severity::Notice => &mut self.notice,
            Severity::Info => &mut self.info,
            Severity::Debug => &mut self.debug,
        }
    }

    /// Sum of all eight levels.
    pub fn total(&self) -> u64 {
        Severity::ALL.iter().map(|level| self.get(*level)).sum()
    }

    /// Field-wise sum, saturating.
    pub fn merge(&self, other: &SeverityCounts) -> SeverityCounts {
        let mut merged = *self;
        for level in Severity::ALL {
            *merged.slot_mut(level) = self.get(level).saturating_add(other.get(level));
        }
        merged
    }

    /// Signed field-wise difference `self - earlier`.
    pub fn diff(&self, earlier: &SeverityCounts) -> SeverityDeltas {
        let mut deltas = SeverityDeltas::default();
        for level in Severity::ALL {
            *deltas.slot_mut(level) =
                signed(self.get(level)).saturating_sub(signed(earlier.get(level)));
        }
        deltas
    }

    pub fn to_mapping(&self) -> Map<String, Value> {
        Severity::ALL
            .iter()
            .map(|level| (level.as_str().to_string(), Value::from(self.get(*level))))
            .collect()
    }

    /// Build from a loosely-typed mapping. Missing, negative or non-integer
    /// values read as zero; unrelated keys are ignored.
    pub fn from_mapping(map: &Map<String, Value>) -> Self {
        Severity::ALL.iter().fold(Self::default(), |counts, level| {
            let count = map.get(level.as_str()).and_then(Value::as_u64).unwrap_or(0);
            counts.with(*level, count)
        })
    }
}

fn signed(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

// ── Severity Deltas ───────────────────────────────────────────

/// Signed per-level difference between two count snapshots.
///
/// Negative values appear after rotation or deletion shrinks a file and
/// are reported as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityDeltas {
    pub emergency: i64,
    pub alert: i64,
    pub critical: i64,
    pub error: i64,
    pub warning: i64,
    pub notice: i64,
    pub info: i64,
    pub debug: i64,
}

impl SeverityDeltas {
    pub fn get(&self, level: Severity) -> i64 {
        match level {
            Severity::Emergency => self.emergency,
            Severity::Alert => self.alert,
            Severity::Critical => self.critical,
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Notice => self.notice,
            Severity::Info => self.info,
            Severity::Debug => self.debug,
        }
    }

    fn slot_mut(&mut self, level: Severity) -> &mut i64 {
        match level {
            Severity::Emergency => &mut self.emergency,
            Severity::Alert => &mut self.alert,
            Severity::Critical => &mut self.critical,
            Severity::Error => &mut self.error,
            Severity::Warning => &mut self.warning,
            Severity::Notice => &mut self.notice,
            Severity::Info => &mut self.info,
            Severity::Debug => &mut self.debug,
        }
    }

    /// Positive part of the delta for one level.
    pub fn clamped(&self, level: Severity) -> u64 {
        u64::try_from(self.get(level)).unwrap_or(0)
    }
}

// ── Comparison Result ─────────────────────────────────────────

/// Outcome of comparing a fresh count against the previously cached snapshot.
///
/// Deserialization ignores any serialized `differences` and recomputes them
/// from `current` and `cached`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawComparison")]
pub struct ComparisonResult {
    current: SeverityCounts,
    cached: SeverityCounts,
    differences: SeverityDeltas,
    source_identifier: String,
    cached_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComparison {
    current: SeverityCounts,
    cached: SeverityCounts,
    #[serde(default = "unknown_source")]
    source_identifier: String,
    #[serde(default)]
    cached_at: Option<String>,
}

impl From<RawComparison> for ComparisonResult {
    fn from(raw: RawComparison) -> Self {
        Self::new(raw.current, raw.cached, raw.source_identifier, raw.cached_at)
    }
}

fn unknown_source() -> String {
    UNKNOWN_SOURCE.to_string()
}

impl ComparisonResult {
    /// Build a comparison; `differences` is always derived from the two snapshots.
    pub fn new(
        current: SeverityCounts,
        cached: SeverityCounts,
        source_identifier: impl Into<String>,
        cached_at: Option<String>,
    ) -> Self {
        Self {
            differences: current.diff(&cached),
            current,
            cached,
            source_identifier: source_identifier.into(),
            cached_at,
        }
    }

    /// All-zero comparison for a destination that could not be resolved.
    pub fn placeholder() -> Self {
        Self::new(
            SeverityCounts::default(),
            SeverityCounts::default(),
            UNKNOWN_SOURCE,
            None,
        )
    }

    pub fn current(&self) -> &SeverityCounts {
        &self.current
    }

    pub fn cached(&self) -> &SeverityCounts {
        &self.cached
    }

    pub fn differences(&self) -> &SeverityDeltas {
        &self.differences
    }

    pub fn source_identifier(&self) -> &str {
        &self.source_identifier
    }

    /// Timestamp of the snapshot this run was compared against (None on first run).
    pub fn cached_at(&self) -> Option<&str> {
        self.cached_at.as_deref()
    }

    pub fn is_new(&self, level: Severity) -> bool {
        self.differences.get(level) > 0
    }

    pub fn new_count(&self, level: Severity) -> u64 {
        self.differences.clamped(level)
    }

    /// True when any warning-or-worse level grew since the cached snapshot.
    pub fn has_any_new_issues(&self) -> bool {
        Severity::ALL
            .iter()
            .any(|level| level.is_issue() && self.is_new(*level))
    }

    pub fn total_new_issues(&self) -> u64 {
        Severity::ALL
            .iter()
            .filter(|level| level.is_issue())
            .map(|level| self.new_count(*level))
            .sum()
    }

    pub fn total_new_count(&self) -> u64 {
        Severity::ALL.iter().map(|level| self.new_count(*level)).sum()
    }
}

// ── Aggregate Result ──────────────────────────────────────────

/// Per-destination entry: plain counts, or a comparison when caching was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateEntry {
    Comparison(ComparisonResult),
    Counts(SeverityCounts),
}

impl AggregateEntry {
    /// The counts this entry contributes to totals (`current` for comparisons).
    pub fn counts(&self) -> &SeverityCounts {
        match self {
            Self::Comparison(comparison) => comparison.current(),
            Self::Counts(counts) => counts,
        }
    }

    pub fn as_comparison(&self) -> Option<&ComparisonResult> {
        match self {
            Self::Comparison(comparison) => Some(comparison),
            Self::Counts(_) => None,
        }
    }
}

impl From<SeverityCounts> for AggregateEntry {
    fn from(counts: SeverityCounts) -> Self {
        Self::Counts(counts)
    }
}

impl From<ComparisonResult> for AggregateEntry {
    fn from(comparison: ComparisonResult) -> Self {
        Self::Comparison(comparison)
    }
}

/// Combined view over several destinations, keyed by destination name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(default)]
    destinations: BTreeMap<String, AggregateEntry>,
}

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `destination`.
    pub fn insert(&mut self, destination: impl Into<String>, entry: impl Into<AggregateEntry>) {
        self.destinations.insert(destination.into(), entry.into());
    }

    pub fn get(&self, destination: &str) -> Option<&AggregateEntry> {
        self.destinations.get(destination)
    }

    pub fn comparison(&self, destination: &str) -> Option<&ComparisonResult> {
        self.get(destination).and_then(AggregateEntry::as_comparison)
    }

    pub fn destinations(&self) -> impl Iterator<Item = (&str, &AggregateEntry)> {
        self.destinations
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn has_comparison_data(&self) -> bool {
        self.destinations
            .values()
            .any(|entry| entry.as_comparison().is_some())
    }

    /// Sum of one level across all destinations.
    pub fn level_total(&self, level: Severity) -> u64 {
        self.destinations
            .values()
            .map(|entry| entry.counts().get(level))
            .sum()
    }

    /// Level-wise sums across all destinations.
    pub fn totals(&self) -> SeverityCounts {
        self.destinations
            .values()
            .fold(SeverityCounts::default(), |acc, entry| acc.merge(entry.counts()))
    }

    pub fn total(&self) -> u64 {
        self.totals().total()
    }

    /// JSON report with per-destination entries and level totals.
    pub fn report(&self) -> Value {
        let mut totals = self.totals().to_mapping();
        totals.insert("total".to_string(), Value::from(self.total()));
        json!({
            "destinations": self.destinations,
            "totals": totals,
        })
    }
}

// ── Retention Action ──────────────────────────────────────────

/// What to remove when pruning a destination's log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionAction {
    /// Remove the active file only.
    Latest,
    /// Remove the active file and every rotated sibling.
    All,
}

impl RetentionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::All => "all",
        }
    }

    /// Human-readable description for prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Latest => "Delete only latest record",
            Self::All => "Delete all logs",
        }
    }
}

impl FromStr for RetentionAction {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "all" => Ok(Self::All),
            other => Err(LogError::InvalidAction(other.to_string())),
        }
    }
}

impl std::fmt::Display for RetentionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
