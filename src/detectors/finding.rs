use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::SourceLocation;

/// A security finding produced by a detector.
///
/// Field names and the [0,10] score ranges are a file-boundary contract
/// consumed by downstream reporting; keep them stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Unique per-finding id. Not part of the determinism contract.
    pub id: String,
    pub detector_type: DetectorType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub evidence: Vec<Evidence>,
    /// Ordered, human-auditable exploit narrative. Never executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploit_chain: Option<Vec<ExploitStep>>,
    pub recommendation: String,
    pub business_impact: BusinessImpact,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    /// Fresh finding with a v4 id and current timestamp.
    pub fn new(
        detector_type: DetectorType,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            detector_type,
            severity,
            title: title.into(),
            description: description.into(),
            evidence: Vec::new(),
            exploit_chain: None,
            recommendation: String::new(),
            business_impact: BusinessImpact::default(),
            created_at: Utc::now(),
        }
    }

    /// Primary location, taken from the first piece of evidence.
    pub fn location(&self) -> Option<&SourceLocation> {
        self.evidence.first().map(|e| &e.location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Vulnerability family a detector targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorType {
    HardcodedCredentials,
    TokenHandling,
    MissingAuthorization,
    PrivilegeEscalation,
    TenantIsolation,
    Injection,
    BusinessLogic,
}

impl std::fmt::Display for DetectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardcodedCredentials => write!(f, "hardcoded_credentials"),
            Self::TokenHandling => write!(f, "token_handling"),
            Self::MissingAuthorization => write!(f, "missing_authorization"),
            Self::PrivilegeEscalation => write!(f, "privilege_escalation"),
            Self::TenantIsolation => write!(f, "tenant_isolation"),
            Self::Injection => write!(f, "injection"),
            Self::BusinessLogic => write!(f, "business_logic"),
        }
    }
}

/// Evidence supporting a finding: where, what, and optional tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub location: SourceLocation,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Evidence {
    pub fn at(location: SourceLocation, snippet: impl Into<String>) -> Self {
        Self {
            location,
            snippet: snippet.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// One step in an exploit narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploitStep {
    pub order: u32,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub expected_result: String,
    pub risk_level: Severity,
}

impl ExploitStep {
    pub fn new(
        order: u32,
        action: impl Into<String>,
        expected_result: impl Into<String>,
        risk_level: Severity,
    ) -> Self {
        Self {
            order,
            action: action.into(),
            payload: None,
            expected_result: expected_result.into(),
            risk_level,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Business impact scoring, each axis in [0,10].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessImpact {
    pub financial: f64,
    pub reputation: f64,
    pub compliance: f64,
    pub operational: f64,
}

impl BusinessImpact {
    pub fn new(financial: f64, reputation: f64, compliance: f64, operational: f64) -> Self {
        Self {
            financial: financial.clamp(0.0, 10.0),
            reputation: reputation.clamp(0.0, 10.0),
            compliance: compliance.clamp(0.0, 10.0),
            operational: operational.clamp(0.0, 10.0),
        }
    }

    /// Highest axis, used when a single scalar is needed.
    pub fn peak(&self) -> f64 {
        self.financial
            .max(self.reputation)
            .max(self.compliance)
            .max(self.operational)
    }
}

/// Metadata about a detector, used for `list-detectors` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub detector_type: DetectorType,
    pub default_severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_info_lowest() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_lenient_parse() {
        assert_eq!(Severity::from_str_lenient("CRIT"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_lenient("med"), Some(Severity::Medium));
        assert_eq!(Severity::from_str_lenient("bogus"), None);
    }

    #[test]
    fn business_impact_clamps_on_construction() {
        let impact = BusinessImpact::new(12.0, -3.0, 5.0, 10.5);
        assert_eq!(impact.financial, 10.0);
        assert_eq!(impact.reputation, 0.0);
        assert_eq!(impact.peak(), 10.0);
    }

    #[test]
    fn finding_ids_are_unique() {
        let a = Finding::new(
            DetectorType::Injection,
            Severity::High,
            "t",
            "d",
        );
        let b = Finding::new(
            DetectorType::Injection,
            Severity::High,
            "t",
            "d",
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let mut finding = Finding::new(
            DetectorType::MissingAuthorization,
            Severity::High,
            "MISSING_AUTH: unprotected route",
            "route lacks authorization",
        );
        finding.business_impact = BusinessImpact::new(7.0, 6.0, 8.0, 4.0);
        let json = serde_json::to_value(&finding).unwrap();
        assert!(json.get("detectorType").is_some());
        assert!(json.get("businessImpact").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["detectorType"], "missing_authorization");
    }
}
