//! Rule, Condition, and RuleVersion data model (§3, §4.6.S).
//!
//! Grounded on the original `backend/rules/rule_store.py` (append-only version history keyed by
//! a monotonic `version` per rule).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Severity;

/// Which document field a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Text,
    MetadataFilename,
    MetadataTags,
    DocumentType,
}

/// How a condition compares the resolved field value against its comparand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    RegexMatch,
    WordCountGt,
    WordCountLt,
}

/// The comparand carried by a condition; `contains`/`regex_match` use `Str`, the `word_count_*`
/// operators use `Num`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl ConditionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConditionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ConditionValue::Num(n) if *n >= 0.0 => Some(*n as usize),
            _ => None,
        }
    }
}

/// One condition in a rule's condition list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: Field,
    pub operator: Operator,
    pub value: ConditionValue,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// How a rule's conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

/// A deterministic override rule (§3: "Rule").
///
/// *Invariant:* `conditions` is non-empty; `priority` in `1..=100`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub priority: u8,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
    pub severity_override: Severity,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        priority: u8,
        conditions: Vec<Condition>,
        combinator: Combinator,
        severity_override: Severity,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            priority: priority.clamp(1, 100),
            active: true,
            conditions,
            combinator,
            severity_override,
            version: 1,
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }

    pub fn check_invariant(&self) -> Result<(), String> {
        if self.conditions.is_empty() {
            return Err(format!("rule {} has no conditions", self.id));
        }
        if self.priority == 0 {
            return Err(format!("rule {} has priority 0, must be 1..=100", self.id));
        }
        Ok(())
    }
}

/// Immutable snapshot of a rule at a point in time. Every create/update/activate/deactivate
/// appends one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleVersion {
    pub rule_id: String,
    pub version: u32,
    pub snapshot: Rule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub change_description: String,
    pub recorded_at: DateTime<Utc>,
}

/// Per-rule effectiveness counters (§3.1, §4.6: "Effectiveness tracking").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEffectiveness {
    pub rule_id: String,
    pub total_applications: u64,
    pub successful_overrides: u64,
    pub mean_confidence_delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_at: Option<DateTime<Utc>>,
}

impl RuleEffectiveness {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            total_applications: 0,
            successful_overrides: 0,
            mean_confidence_delta: 0.0,
            last_applied_at: None,
        }
    }

    /// Fold in one more application (§4.6: running mean confidence delta = final − model).
    pub fn record_application(&mut self, confidence_delta: f64, upheld: bool) {
        let n = self.total_applications as f64;
        self.mean_confidence_delta = (self.mean_confidence_delta * n + confidence_delta) / (n + 1.0);
        self.total_applications += 1;
        if upheld {
            self.successful_overrides += 1;
        }
        self.last_applied_at = Some(Utc::now());
    }
}
