use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::level::Level;
use crate::sensitivity::LabelQuery;

const LABEL_HEADERS: &[&str] = &["label", "domain", "category", "data type", "attribute_type"];
const LEVEL_HEADERS: &[&str] = &[
    "level",
    "sensitivity",
    "sensitivity level",
    "sensitivitylevel",
    "sensitivity_level",
    "classification",
];
const OWNER_HEADERS: &[&str] = &["owner", "about"];
const SCOPE_HEADERS: &[&str] = &["scope"];
const EXPLAINABILITY_HEADERS: &[&str] = &["explainability", "explanation"];
const SHARING_HEADERS: &[&str] = &["sharing entity", "sharing_entity", "sharingentity"];

/// Rendered when a compliance column has no value
pub const NOT_AVAILABLE: &str = "N/A";

/// Which lookups a policy row applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyScope {
    /// Matches both domain and owner lookups
    Any(String),
    Domain(String),
    Owner(String),
    Pair { domain: String, owner: String },
}

/// Free-text compliance columns of a pair row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceNotes {
    pub explainability: Option<String>,
    pub sharing_entity: Option<String>,
}

impl ComplianceNotes {
    pub fn is_empty(&self) -> bool {
        self.explainability.is_none() && self.sharing_entity.is_none()
    }
}

/// One row of the static policy table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitivityEntry {
    pub scope: PolicyScope,
    pub level: Level,
    /// Only kept for pair rows
    pub notes: ComplianceNotes,
}

impl SensitivityEntry {
    pub fn new(scope: PolicyScope, level: Level) -> Self {
        Self {
            scope,
            level,
            notes: ComplianceNotes::default(),
        }
    }

    pub fn with_notes(mut self, notes: ComplianceNotes) -> Self {
        self.notes = notes;
        self
    }
}

/// What the policy says about a source's declared (domain, owner) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceRecord {
    pub sensitivity: Level,
    pub explainability: String,
    pub sharing_entity: String,
}

/// Validated label -> level lookup, immutable once loaded
#[derive(Debug, Clone)]
pub struct PolicyTable {
    any: HashMap<String, Level>,
    domains: HashMap<String, Level>,
    owners: HashMap<String, Level>,
    pairs: HashMap<(String, String), Level>,
    notes: HashMap<(String, String), ComplianceNotes>,
    default_level: Level,
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Returns true when `level` became the stored level for `key`
fn keep_highest<K: std::hash::Hash + Eq + std::fmt::Debug>(
    map: &mut HashMap<K, Level>,
    key: K,
    level: Level,
) -> bool {
    match map.get(&key) {
        Some(existing) if *existing >= level => {
            debug!("Keeping {} for duplicate policy label {:?}", existing, key);
            false
        }
        _ => {
            map.insert(key, level);
            true
        }
    }
}

impl PolicyTable {
    /// Empty table; every lookup answers `default_level`
    pub fn new(default_level: Level) -> Self {
        Self {
            any: HashMap::new(),
            domains: HashMap::new(),
            owners: HashMap::new(),
            pairs: HashMap::new(),
            notes: HashMap::new(),
            default_level,
        }
    }

    pub fn from_entries<I>(entries: I, default_level: Level) -> Self
    where
        I: IntoIterator<Item = SensitivityEntry>,
    {
        let mut table = Self::new(default_level);
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Adds a row. A label listed twice keeps its highest level, and a pair
    /// keeps the compliance notes of the row that set that level.
    pub fn insert(&mut self, entry: SensitivityEntry) {
        match entry.scope {
            PolicyScope::Any(label) => {
                keep_highest(&mut self.any, normalize(&label), entry.level);
            }
            PolicyScope::Domain(label) => {
                keep_highest(&mut self.domains, normalize(&label), entry.level);
            }
            PolicyScope::Owner(label) => {
                keep_highest(&mut self.owners, normalize(&label), entry.level);
            }
            PolicyScope::Pair { domain, owner } => {
                let key = (normalize(&domain), normalize(&owner));
                if keep_highest(&mut self.pairs, key.clone(), entry.level) {
                    if entry.notes.is_empty() {
                        self.notes.remove(&key);
                    } else {
                        self.notes.insert(key, entry.notes);
                    }
                } else if !entry.notes.is_empty() {
                    self.notes.entry(key).or_insert(entry.notes);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.any.len() + self.domains.len() + self.owners.len() + self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn default_level(&self) -> Level {
        self.default_level
    }

    /// Loads the table from a CSV file. Any malformed row rejects the whole file.
    pub fn load_csv(path: &Path, default_level: Level) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot open policy table {}: {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_csv_reader(file, default_level)?;
        if table.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "policy table {} has no rows",
                path.display()
            )));
        }
        info!("Loaded {} policy entries from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_csv_reader<R: Read>(reader: R, default_level: Level) -> Result<Self> {
        let mut csv = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| PipelineError::Configuration(format!("unreadable policy header: {}", e)))?
            .clone();
        let label_col = find_column(&headers, LABEL_HEADERS).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "policy table needs a label column, found {:?}",
                headers.iter().collect::<Vec<_>>()
            ))
        })?;
        let level_col = find_column(&headers, LEVEL_HEADERS).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "policy table needs a level column, found {:?}",
                headers.iter().collect::<Vec<_>>()
            ))
        })?;
        let owner_col = find_column(&headers, OWNER_HEADERS);
        let scope_col = find_column(&headers, SCOPE_HEADERS);
        let explainability_col = find_column(&headers, EXPLAINABILITY_HEADERS);
        let sharing_col = find_column(&headers, SHARING_HEADERS);

        let mut table = Self::new(default_level);
        for record in csv.records() {
            let record = record
                .map_err(|e| PipelineError::Configuration(format!("unreadable policy row: {}", e)))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let cell = |col: Option<usize>| {
                col.and_then(|c| record.get(c))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };

            let label = cell(Some(label_col)).ok_or_else(|| {
                PipelineError::Configuration(format!("policy row {}: label is empty", line))
            })?;
            let level: Level = cell(Some(level_col))
                .ok_or_else(|| {
                    PipelineError::Configuration(format!("policy row {}: level is empty", line))
                })?
                .parse()
                .map_err(|e| PipelineError::Configuration(format!("policy row {}: {}", line, e)))?;
            let owner = cell(owner_col);

            let scope = match (cell(scope_col).map(str::to_lowercase).as_deref(), owner) {
                (Some("pair"), Some(owner)) | (None, Some(owner)) => PolicyScope::Pair {
                    domain: label.to_string(),
                    owner: owner.to_string(),
                },
                (Some("pair"), None) => {
                    return Err(PipelineError::Configuration(format!(
                        "policy row {}: pair scope needs an owner",
                        line
                    )))
                }
                (Some("domain"), _) => PolicyScope::Domain(label.to_string()),
                (Some("owner"), _) => PolicyScope::Owner(label.to_string()),
                (Some("any"), _) | (None, None) => PolicyScope::Any(label.to_string()),
                (Some(other), _) => {
                    return Err(PipelineError::Configuration(format!(
                        "policy row {}: unknown scope '{}'",
                        line, other
                    )))
                }
            };
            let notes = ComplianceNotes {
                explainability: cell(explainability_col).map(str::to_string),
                sharing_entity: cell(sharing_col).map(str::to_string),
            };
            if !notes.is_empty() && !matches!(scope, PolicyScope::Pair { .. }) {
                debug!("Policy row {}: compliance notes ignored outside pair rows", line);
            }
            table.insert(SensitivityEntry::new(scope, level).with_notes(notes));
        }
        Ok(table)
    }

    /// Resolves a label or pair to exactly one level.
    ///
    /// Unmapped labels answer the table default. A pair answers the highest
    /// of its domain level, its owner level and any explicit pair row.
    pub fn resolve(&self, query: LabelQuery<'_>) -> Level {
        match query {
            LabelQuery::Domain(label) => {
                let key = normalize(label);
                self.domains
                    .get(&key)
                    .or_else(|| self.any.get(&key))
                    .copied()
                    .unwrap_or(self.default_level)
            }
            LabelQuery::Owner(label) => {
                let key = normalize(label);
                self.owners
                    .get(&key)
                    .or_else(|| self.any.get(&key))
                    .copied()
                    .unwrap_or(self.default_level)
            }
            LabelQuery::Pair { domain, owner } => {
                let explicit = self
                    .pairs
                    .get(&(normalize(domain), normalize(owner)))
                    .copied()
                    .unwrap_or(Level::Low);
                self.resolve(LabelQuery::Domain(domain))
                    .max(self.resolve(LabelQuery::Owner(owner)))
                    .max(explicit)
            }
        }
    }
}

impl PolicyTable {
    /// Level and compliance notes for a source's declared pair. Missing
    /// notes render as `N/A`.
    pub fn compliance(&self, domain: &str, owner: &str) -> ComplianceRecord {
        let notes = self.notes.get(&(normalize(domain), normalize(owner)));
        let text = |field: Option<&String>| {
            field
                .cloned()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };
        ComplianceRecord {
            sensitivity: self.resolve(LabelQuery::Pair { domain, owner }),
            explainability: text(notes.and_then(|n| n.explainability.as_ref())),
            sharing_entity: text(notes.and_then(|n| n.sharing_entity.as_ref())),
        }
    }
}

fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
}
