//! The review record — a validated, immutable snapshot of one LLM review.
//!
//! External input (a JSON object from the model) is only admitted through
//! [`Review::from_value`] / [`Review::from_json_str`], which deserialize and
//! then enforce the numeric range constraints the wire format cannot express.
//! After construction there is no mutation API; the single sanctioned
//! rewrite is [`Review::with_model`], used by the orchestrator to replace
//! the model's self-reported name with the configured one.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::SchemaError;

/// Finding severity, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// PR complexity tier as judged by the reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityTier {
    Trivial,
    Standard,
    Complex,
    Critical,
}

impl ComplexityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Trivial => "TRIVIAL",
            ComplexityTier::Standard => "STANDARD",
            ComplexityTier::Complex => "COMPLEX",
            ComplexityTier::Critical => "CRITICAL",
        }
    }
}

/// The five scoring axes a finding can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Security,
    Logic,
    Governance,
    Reliability,
    Observability,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::Security => "security",
            FindingCategory::Logic => "logic",
            FindingCategory::Governance => "governance",
            FindingCategory::Reliability => "reliability",
            FindingCategory::Observability => "observability",
        }
    }
}

/// Kind of audit that produced the review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    PrReview,
    SecurityAudit,
    GovernanceCheck,
    SurpriseAudit,
}

impl AuditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditType::PrReview => "pr_review",
            AuditType::SecurityAudit => "security_audit",
            AuditType::GovernanceCheck => "governance_check",
            AuditType::SurpriseAudit => "surprise_audit",
        }
    }
}

/// Escalation severity (escalations never go below MEDIUM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EscalationSeverity {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationCategory {
    Security,
    Compliance,
    Architecture,
    Pattern,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscalationTarget {
    SecurityTeam,
    Infrastructure,
    DomainExpert,
    TechLead,
    Compliance,
}

impl EscalationTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationTarget::SecurityTeam => "security-team",
            EscalationTarget::Infrastructure => "infrastructure",
            EscalationTarget::DomainExpert => "domain-expert",
            EscalationTarget::TechLead => "tech-lead",
            EscalationTarget::Compliance => "compliance",
        }
    }
}

/// Review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Provisional,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Pass => "PASS",
            VerdictStatus::Fail => "FAIL",
            VerdictStatus::Provisional => "PROVISIONAL",
        }
    }
}

/// Tone the persona chose for this review. Opaque to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneRegister {
    GrudgingRespect,
    Mild,
    Grumpy,
    Disappointed,
    Frustrated,
    Alarmed,
    Professional,
}

/// ASCII-art banner selector. Opaque to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsciiArtKey {
    AllClear,
    Standard,
    Warning,
    Critical,
    Surprise,
}

/// PR metadata echoed back by the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrMetadata {
    pub title: String,
    pub author: String,
    /// "source → target" branch descriptor.
    pub branch: String,
    pub complexity_tier: ComplexityTier,
}

/// What the review actually covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewScope {
    pub files_in_diff: u32,
    pub files_reviewed: u32,
    pub coverage_percentage: f32,
    pub governance_rules_applied: Vec<String>,
    pub modes_active: Vec<String>,
}

/// A single review finding. Equality is by content; the fingerprint cache
/// never participates.
#[derive(Debug, Serialize, Deserialize)]
pub struct Finding {
    /// F-001 through F-999.
    pub id: String,
    pub severity: Severity,
    /// 0–100, enforced by [`Finding::validate`].
    pub confidence: u8,
    pub category: FindingCategory,
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub title: String,
    pub description: String,
    pub suggestion: String,
    #[serde(default)]
    pub governance_rule_id: Option<String>,
    pub evidence: String,
    /// Short persona note, max 280 chars.
    pub grippy_note: String,

    #[serde(skip)]
    fingerprint: OnceLock<String>,
}

impl Finding {
    /// Deterministic 12-char hex digest for cross-round finding matching.
    ///
    /// Keyed on file + category + lowercased title, so it is stable across
    /// line-number shifts, severity re-ratings and description rewrites.
    /// Computed on first access and memoized for the life of the instance.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            let key = format!(
                "{}:{}:{}",
                self.file.trim(),
                self.category.as_str(),
                self.title.trim().to_lowercase()
            );
            let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
            digest[..12].to_string()
        })
    }

    /// Range checks the wire format cannot express.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.confidence > 100 {
            return Err(SchemaError::OutOfRange {
                field: "finding.confidence",
                got: i64::from(self.confidence),
                expected: "0..=100",
            });
        }
        let note_chars = self.grippy_note.chars().count();
        if note_chars > 280 {
            return Err(SchemaError::NoteTooLong(note_chars));
        }
        Ok(())
    }
}

impl Clone for Finding {
    fn clone(&self) -> Self {
        let fingerprint = OnceLock::new();
        if let Some(fp) = self.fingerprint.get() {
            let _ = fingerprint.set(fp.clone());
        }
        Self {
            id: self.id.clone(),
            severity: self.severity,
            confidence: self.confidence,
            category: self.category,
            file: self.file.clone(),
            line_start: self.line_start,
            line_end: self.line_end,
            title: self.title.clone(),
            description: self.description.clone(),
            suggestion: self.suggestion.clone(),
            governance_rule_id: self.governance_rule_id.clone(),
            evidence: self.evidence.clone(),
            grippy_note: self.grippy_note.clone(),
            fingerprint,
        }
    }
}

impl PartialEq for Finding {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.severity == other.severity
            && self.confidence == other.confidence
            && self.category == other.category
            && self.file == other.file
            && self.line_start == other.line_start
            && self.line_end == other.line_end
            && self.title == other.title
            && self.description == other.description
            && self.suggestion == other.suggestion
            && self.governance_rule_id == other.governance_rule_id
            && self.evidence == other.evidence
            && self.grippy_note == other.grippy_note
    }
}

impl Eq for Finding {}

/// A concern the reviewer wants routed to a human team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    /// E-001 through E-099.
    pub id: String,
    pub severity: EscalationSeverity,
    pub category: EscalationCategory,
    pub summary: String,
    pub details: String,
    pub recommended_target: EscalationTarget,
    pub blocking: bool,
}

/// Per-axis score breakdown, each 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub security: u8,
    pub logic: u8,
    pub governance: u8,
    pub reliability: u8,
    pub observability: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDeductions {
    pub critical_count: u32,
    pub high_count: u32,
    pub medium_count: u32,
    pub low_count: u32,
    pub total_deduction: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub overall: u8,
    pub breakdown: ScoreBreakdown,
    pub deductions: ScoreDeductions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub threshold_applied: u8,
    pub merge_blocking: bool,
    pub summary: String,
}

/// Persona flavor. Passed through verbatim to rendered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub tone_register: ToneRegister,
    pub opening_catchphrase: String,
    pub closing_line: String,
    #[serde(default)]
    pub disguise_used: Option<String>,
    pub ascii_art_key: AsciiArtKey,
}

/// Run accounting the reviewer reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewMeta {
    pub review_duration_ms: u64,
    pub tokens_used: u64,
    pub context_files_loaded: u32,
    pub confidence_filter_suppressed: u32,
    pub duplicate_filter_suppressed: u32,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Complete structured output of one review run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default = "default_version")]
    pub version: String,
    pub audit_type: AuditType,
    /// ISO-8601.
    pub timestamp: String,
    pub model: String,

    pub pr: PrMetadata,
    pub scope: ReviewScope,
    pub findings: Vec<Finding>,
    pub escalations: Vec<Escalation>,
    pub score: Score,
    pub verdict: Verdict,
    pub personality: Personality,
    pub meta: ReviewMeta,
}

impl Review {
    /// Admit a JSON object, enforcing ranges after deserialization.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let review: Review = serde_json::from_value(value)?;
        review.validate()?;
        Ok(review)
    }

    /// Admit a JSON string, enforcing ranges after deserialization.
    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        let review: Review = serde_json::from_str(s)?;
        review.validate()?;
        Ok(review)
    }

    /// Enforce the numeric constraints serde cannot encode.
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_axis("score.overall", self.score.overall)?;
        check_axis("score.breakdown.security", self.score.breakdown.security)?;
        check_axis("score.breakdown.logic", self.score.breakdown.logic)?;
        check_axis("score.breakdown.governance", self.score.breakdown.governance)?;
        check_axis(
            "score.breakdown.reliability",
            self.score.breakdown.reliability,
        )?;
        check_axis(
            "score.breakdown.observability",
            self.score.breakdown.observability,
        )?;
        check_axis("verdict.threshold_applied", self.verdict.threshold_applied)?;
        for finding in &self.findings {
            finding.validate()?;
        }
        Ok(())
    }

    /// Rebuild the record with a different model identifier.
    ///
    /// The record stays otherwise immutable; the orchestrator uses this to
    /// replace the model's self-reported name with the configured id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn check_axis(field: &'static str, value: u8) -> Result<(), SchemaError> {
    if value > 100 {
        return Err(SchemaError::OutOfRange {
            field,
            got: i64::from(value),
            expected: "0..=100",
        });
    }
    Ok(())
}
