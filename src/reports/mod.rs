//! Report retrieval pipeline.
//!
//! Resolution of report summaries and retrieval of the raw and policy halves
//! of a report, as methods on [`crate::client::IqClient`].

pub mod fetcher;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing {
    use crate::client::fake::FakeTransport;
    use crate::models::Stage;
    use serde_json::{json, Value};

    /// Wire form of a report summary for `report_id`.
    pub fn summary(app: &str, report_id: &str, stage: Stage, date: &str) -> Value {
        json!({
            "applicationId": format!("internal-{app}"),
            "embeddableReportHtmlUrl": format!("ui/links/application/{app}/report/{report_id}/embeddable"),
            "evaluationDate": date,
            "reportDataUrl": format!("api/v2/applications/{app}/reports/{report_id}/raw"),
            "reportHtmlUrl": format!("ui/links/application/{app}/report/{report_id}"),
            "reportPdfUrl": format!("ui/links/application/{app}/report/{report_id}/pdf"),
            "stage": stage.as_str(),
        })
    }

    /// Wire form of a policy component with `(policy id, waived)` violations.
    pub fn component(hash: &str, violations: &[(&str, bool)]) -> Value {
        let violations: Vec<Value> = violations
            .iter()
            .map(|(policy_id, waived)| {
                json!({
                    "policyId": policy_id,
                    "policyName": format!("{policy_id}-name"),
                    "policyThreatCategory": "SECURITY",
                    "policyThreatLevel": 9,
                    "grandfathered": false,
                    "waived": waived,
                    "constraints": []
                })
            })
            .collect();
        json!({
            "hash": hash,
            "displayName": format!("component {hash}"),
            "violations": violations,
        })
    }

    /// Registers the public ID lookup and the summary listing of an application.
    pub async fn seed_application(fake: &FakeTransport, public_id: &str, id: &str, infos: Value) {
        fake.respond_json(
            &format!("api/v2/applications?publicId={public_id}"),
            json!({"applications": [
                {"id": id, "publicId": public_id, "name": public_id, "organizationId": "org-1"}
            ]}),
        )
        .await;
        fake.respond_json(&format!("api/v2/reports/applications/{id}"), infos)
            .await;
    }

    /// Registers both halves of one report; `raw_hashes` lists the inventory.
    pub async fn seed_report(
        fake: &FakeTransport,
        app: &str,
        report_id: &str,
        policy_components: Value,
        raw_hashes: Value,
    ) {
        let total = policy_components.as_array().map_or(0, |c| c.len());
        fake.respond_json(
            &format!("api/v2/applications/{app}/reports/{report_id}/policy"),
            json!({
                "application": {"id": format!("internal-{app}"), "publicId": app, "name": app, "organizationId": "org-1"},
                "components": policy_components,
                "counts": {"totalComponentCount": total},
                "reportTime": 1709288100000i64,
                "reportTitle": app,
            }),
        )
        .await;

        let raw_components: Vec<Value> = raw_hashes
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|hash| {
                json!({
                    "hash": hash,
                    "licenseData": {"declaredLicenses": [], "observedLicenses": []},
                    "securityData": {"securityIssues": []}
                })
            })
            .collect();
        let count = raw_components.len();
        fake.respond_json(
            &format!("api/v2/applications/{app}/reports/{report_id}/raw"),
            json!({
                "components": raw_components,
                "matchSummary": {"knownComponentCount": count, "totalComponentCount": count},
            }),
        )
        .await;
    }
}
