//! Data models for report retrieval.
//!
//! This module contains the entity catalog: applications, organizations,
//! pipeline stages, the three report shapes and the report diff. Field names
//! follow the server's camelCase wire format exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

/// A position in the software delivery pipeline at which an evaluation is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Proxy,
    Develop,
    Build,
    StageRelease,
    Release,
    Operate,
    ContinuousMonitoring,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::Proxy,
        Stage::Develop,
        Stage::Build,
        Stage::StageRelease,
        Stage::Release,
        Stage::Operate,
        Stage::ContinuousMonitoring,
    ];

    /// Stages walked by the organization and component aggregations.
    pub const LATE: [Stage; 4] = [
        Stage::Build,
        Stage::StageRelease,
        Stage::Release,
        Stage::Operate,
    ];

    /// Wire name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Proxy => "proxy",
            Stage::Develop => "develop",
            Stage::Build => "build",
            Stage::StageRelease => "stage-release",
            Stage::Release => "release",
            Stage::Operate => "operate",
            Stage::ContinuousMonitoring => "continuous-monitoring",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown stage '{}' (expected one of: {})",
                    s,
                    Stage::ALL.map(|st| st.as_str()).join(", ")
                )
            })
    }
}

/// Tag attached to an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationTag {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub application_id: String,
}

/// An application registered with the policy server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    /// Internal identifier.
    pub id: String,
    /// Human-facing identifier used on the command line and in report paths.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub public_id: String,
    pub name: String,
    pub organization_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_user_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub application_tags: Vec<ApplicationTag>,
}

/// A category tag that can be applied to applications of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// An organization, used to resolve names to internal IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Category>,
}

/// Summary record of one evaluation.
///
/// The evaluation timestamp arrives as an RFC3339 string and is parsed once,
/// on first use, by [`ReportInfo::evaluation_date`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportInfo {
    pub application_id: String,
    pub embeddable_report_html_url: String,
    /// Raw RFC3339 evaluation timestamp as sent by the server.
    pub evaluation_date: String,
    pub report_data_url: String,
    pub report_html_url: String,
    pub report_pdf_url: String,
    pub stage: String,
    #[serde(skip)]
    evaluated_at: OnceLock<DateTime<Utc>>,
}

// The memoized timestamp is derived state and stays out of equality.
impl PartialEq for ReportInfo {
    fn eq(&self, other: &Self) -> bool {
        self.application_id == other.application_id
            && self.embeddable_report_html_url == other.embeddable_report_html_url
            && self.evaluation_date == other.evaluation_date
            && self.report_data_url == other.report_data_url
            && self.report_html_url == other.report_html_url
            && self.report_pdf_url == other.report_pdf_url
            && self.stage == other.stage
    }
}

impl ReportInfo {
    /// Report identifier: the terminal path segment of the HTML report URL.
    pub fn report_id(&self) -> &str {
        self.report_html_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Stage of this summary, if the server sent a known one.
    pub fn stage(&self) -> Option<Stage> {
        self.stage.parse().ok()
    }

    pub fn is_stage(&self, stage: Stage) -> bool {
        self.stage == stage.as_str()
    }

    /// Location of the raw component inventory.
    ///
    /// When the server only sent a policy location, the raw one is derived
    /// from it.
    pub fn raw_data_url(&self) -> String {
        if self.report_data_url.contains("/raw") {
            self.report_data_url.clone()
        } else {
            self.report_data_url.replacen("/policy", "/raw", 1)
        }
    }

    /// Location of the policy verdicts, derived from the raw-data location.
    pub fn policy_data_url(&self) -> String {
        self.report_data_url.replacen("/raw", "/policy", 1)
    }

    /// Parsed evaluation timestamp, if the server sent a valid RFC3339 value.
    pub fn parsed_evaluation_date(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.evaluation_date)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }

    /// Evaluation timestamp, parsed once and memoized.
    ///
    /// An unparseable value yields the current time. Chronological
    /// comparisons that must not be distorted by that sentinel should use
    /// [`ReportInfo::parsed_evaluation_date`] instead.
    pub fn evaluation_date(&self) -> DateTime<Utc> {
        *self.evaluated_at.get_or_init(|| {
            self.parsed_evaluation_date().unwrap_or_else(|| {
                warn!(
                    "Could not parse evaluation date '{}' of report {}; using current time",
                    self.evaluation_date,
                    self.report_id()
                );
                Utc::now()
            })
        })
    }
}

/// Format and coordinates identifying a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentIdentifier {
    pub format: String,
    pub coordinates: BTreeMap<String, String>,
}

/// A third-party component. Its content hash is its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Component {
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_identifier: Option<ComponentIdentifier>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub package_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub proprietary: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub match_state: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pathnames: Vec<String>,
}

impl Component {
    /// Name shown to humans: display name, package URL, then hash.
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else if !self.package_url.is_empty() {
            &self.package_url
        } else {
            &self.hash
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct License {
    pub license_id: String,
    pub license_name: String,
}

/// Declared, observed and effective licenses of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LicenseData {
    pub declared_licenses: Vec<License>,
    pub observed_licenses: Vec<License>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effective_licenses: Vec<License>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overridden_licenses: Vec<License>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
}

/// A known vulnerability affecting a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityIssue {
    pub source: String,
    pub reference: String,
    pub severity: f64,
    pub status: String,
    pub url: String,
    pub threat_category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityData {
    pub security_issues: Vec<SecurityIssue>,
}

/// One entry of the raw component inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawReportComponent {
    #[serde(flatten)]
    pub component: Component,
    pub license_data: LicenseData,
    pub security_data: SecurityData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchSummary {
    pub known_component_count: i64,
    pub total_component_count: i64,
}

/// Full component inventory of one evaluation, without policy verdicts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRaw {
    pub components: Vec<RawReportComponent>,
    pub match_summary: MatchSummary,
    pub report_info: ReportInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstraintCondition {
    pub condition_reason: String,
    pub condition_summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConstraint {
    pub conditions: Vec<ConstraintCondition>,
    pub constraint_id: String,
    pub constraint_name: String,
}

/// A policy violated by a component.
///
/// `grandfathered` and `waived` are independent flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyViolation {
    pub constraints: Vec<PolicyConstraint>,
    pub grandfathered: bool,
    pub policy_id: String,
    pub policy_name: String,
    pub policy_threat_category: String,
    pub policy_threat_level: i64,
    pub waived: bool,
}

/// A component together with the policies it violates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyReportComponent {
    #[serde(flatten)]
    pub component: Component,
    pub violations: Vec<PolicyViolation>,
}

impl PolicyReportComponent {
    pub fn hash(&self) -> &str {
        &self.component.hash
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyCounts {
    pub exactly_matched_component_count: i64,
    pub grandfathered_policy_violation_count: i64,
    pub partially_matched_component_count: i64,
    pub total_component_count: i64,
}

/// Policy verdicts of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportPolicy {
    pub application: Application,
    pub components: Vec<PolicyReportComponent>,
    pub counts: PolicyCounts,
    /// Generation time in milliseconds since the epoch.
    pub report_time: i64,
    pub report_title: String,
    pub report_info: ReportInfo,
}

/// Policy and raw halves of the same evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "policyReport")]
    pub policy: ReportPolicy,
    #[serde(rename = "rawReport")]
    pub raw: ReportRaw,
}

impl Report {
    /// Summary the report was materialized from.
    pub fn info(&self) -> &ReportInfo {
        &self.raw.report_info
    }

    /// Number of policy violations that are neither waived nor grandfathered.
    pub fn open_violation_count(&self) -> usize {
        self.policy
            .components
            .iter()
            .flat_map(|c| &c.violations)
            .filter(|v| !v.waived && !v.grandfathered)
            .count()
    }
}

/// Differences between an earlier and a later report of one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDiff {
    /// `[earlier, later]`.
    pub reports: [Report; 2],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waived: Vec<PolicyReportComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed: Vec<PolicyReportComponent>,
}

impl ReportDiff {
    pub fn earlier(&self) -> &Report {
        &self.reports[0]
    }

    pub fn later(&self) -> &Report {
        &self.reports[1]
    }
}

/// Detailed metadata about a component, from the component-detail lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentDetail {
    pub component: Component,
    pub match_state: String,
    pub catalog_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_popularity: Option<i64>,
    pub license_data: LicenseData,
    pub security_data: SecurityData,
}
