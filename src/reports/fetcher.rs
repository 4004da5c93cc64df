//! Raw and policy report retrieval.
//!
//! Each fetch issues one GET and stamps the result with the summary it was
//! fetched for; the summary is never re-derived from the payload.

use tracing::{debug, info};

use crate::client::{Cancel, IqClient};
use crate::error::Result;
use crate::models::{Report, ReportInfo, ReportPolicy, ReportRaw, Stage};

pub(crate) fn report_raw_path(app_public_id: &str, report_id: &str) -> String {
    format!("api/v2/applications/{}/reports/{}/raw", app_public_id, report_id)
}

pub(crate) fn report_policy_path(app_public_id: &str, report_id: &str) -> String {
    format!(
        "api/v2/applications/{}/reports/{}/policy",
        app_public_id, report_id
    )
}

impl IqClient {
    async fn raw_report_at(&self, cancel: &Cancel, path: &str) -> Result<ReportRaw> {
        self.get_json(cancel, path, "raw report").await
    }

    async fn policy_report_at(&self, cancel: &Cancel, path: &str) -> Result<ReportPolicy> {
        self.get_json(cancel, path, "policy report").await
    }

    /// Component inventory of the evaluation `info` points at.
    pub async fn fetch_raw(&self, cancel: &Cancel, info: &ReportInfo) -> Result<ReportRaw> {
        let mut raw = self.raw_report_at(cancel, &info.raw_data_url()).await?;
        raw.report_info = info.clone();
        Ok(raw)
    }

    /// Policy verdicts of the evaluation `info` points at.
    pub async fn fetch_policy(&self, cancel: &Cancel, info: &ReportInfo) -> Result<ReportPolicy> {
        let mut policy = self
            .policy_report_at(cancel, &info.policy_data_url())
            .await?;
        policy.report_info = info.clone();
        Ok(policy)
    }

    pub async fn fetch_raw_by_stage(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        stage: Stage,
    ) -> Result<ReportRaw> {
        let info = self.find_report_info(cancel, app_public_id, stage).await?;
        self.fetch_raw(cancel, &info).await
    }

    pub async fn fetch_policy_by_stage(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        stage: Stage,
    ) -> Result<ReportPolicy> {
        let info = self.find_report_info(cancel, app_public_id, stage).await?;
        self.fetch_policy(cancel, &info).await
    }

    /// Both halves of the report for one summary. The first failure aborts.
    pub async fn fetch_report_for_info(&self, cancel: &Cancel, info: &ReportInfo) -> Result<Report> {
        let policy = self.fetch_policy(cancel, info).await?;
        let raw = self.fetch_raw(cancel, info).await?;
        Ok(Report { policy, raw })
    }

    /// Latest report of the application at `stage`.
    pub async fn fetch_report(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        stage: Stage,
    ) -> Result<Report> {
        let info = self.find_report_info(cancel, app_public_id, stage).await?;
        debug!(
            "Fetching {} report {} of '{}'",
            stage,
            info.report_id(),
            app_public_id
        );
        self.fetch_report_for_info(cancel, &info).await
    }

    /// Report of the application with the given report identifier.
    ///
    /// Historical reports are reachable by ID even after the summary list has
    /// moved on to a newer evaluation; in that case both halves keep an empty
    /// summary.
    pub async fn fetch_report_by_report_id(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        report_id: &str,
    ) -> Result<Report> {
        let mut policy = self
            .policy_report_at(cancel, &report_policy_path(app_public_id, report_id))
            .await?;
        let mut raw = self
            .raw_report_at(cancel, &report_raw_path(app_public_id, report_id))
            .await?;

        let infos = self
            .list_report_infos_for_application(cancel, app_public_id)
            .await?;
        match infos.into_iter().find(|i| i.report_id() == report_id) {
            Some(info) => {
                policy.report_info = info.clone();
                raw.report_info = info;
            }
            None => info!(
                "Report {} of '{}' is no longer listed; keeping it without a summary",
                report_id, app_public_id
            ),
        }

        Ok(Report { policy, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeTransport;
    use crate::error::IqError;
    use crate::reports::testing::{component, seed_application, seed_report, summary};
    use serde_json::json;
    use std::sync::Arc;

    async fn seeded() -> Arc<FakeTransport> {
        let fake = Arc::new(FakeTransport::default());
        seed_application(
            &fake,
            "webgoat",
            "a1",
            json!([
                summary("webgoat", "r-build", Stage::Build, "2024-03-01T10:00:00Z"),
                summary("webgoat", "r-release", Stage::Release, "2024-03-05T10:00:00Z"),
            ]),
        )
        .await;
        seed_report(
            &fake,
            "webgoat",
            "r-build",
            json!([component("h1", &[("p-sec", false)]), component("h2", &[("p-lic", true)])]),
            json!(["h1", "h2", "h3"]),
        )
        .await;
        seed_report(
            &fake,
            "webgoat",
            "r-release",
            json!([component("h1", &[("p-sec", true)])]),
            json!(["h1"]),
        )
        .await;
        fake
    }

    #[tokio::test]
    async fn test_fetch_stamps_input_summary() {
        let fake = seeded().await;
        let client = IqClient::new(fake);
        let cancel = Cancel::new();

        let info = client
            .find_report_info(&cancel, "webgoat", Stage::Build)
            .await
            .unwrap();
        let raw = client.fetch_raw(&cancel, &info).await.unwrap();
        assert_eq!(raw.components.len(), 3);
        assert_eq!(raw.report_info, info);

        let policy = client.fetch_policy(&cancel, &info).await.unwrap();
        assert_eq!(policy.components.len(), 2);
        assert_eq!(policy.report_info, info);
    }

    #[tokio::test]
    async fn test_fetch_by_stage_halves() {
        let fake = seeded().await;
        let client = IqClient::new(fake);
        let cancel = Cancel::new();

        let raw = client
            .fetch_raw_by_stage(&cancel, "webgoat", Stage::Release)
            .await
            .unwrap();
        assert_eq!(raw.report_info.report_id(), "r-release");
        let policy = client
            .fetch_policy_by_stage(&cancel, "webgoat", Stage::Release)
            .await
            .unwrap();
        assert!(policy.components[0].violations[0].waived);
    }

    #[tokio::test]
    async fn test_fetch_report_aborts_on_first_failure() {
        let fake = seeded().await;
        fake.fail(&report_policy_path("webgoat", "r-build")).await;
        let client = IqClient::new(fake.clone());

        let err = client
            .fetch_report(&Cancel::new(), "webgoat", Stage::Build)
            .await
            .unwrap_err();
        assert!(matches!(err, IqError::RequestFailed { .. }));
        assert_eq!(fake.calls(&report_raw_path("webgoat", "r-build")), 0);
    }

    #[tokio::test]
    async fn test_fetch_report_malformed_payload() {
        let fake = seeded().await;
        fake.respond(&report_raw_path("webgoat", "r-build"), 200, "[1, 2")
            .await;
        let client = IqClient::new(fake);

        let err = client
            .fetch_report(&Cancel::new(), "webgoat", Stage::Build)
            .await
            .unwrap_err();
        assert!(matches!(err, IqError::DecodeFailed { what: "raw report", .. }));
    }

    #[tokio::test]
    async fn test_missing_stage_is_not_found() {
        let fake = seeded().await;
        let client = IqClient::new(fake);
        let err = client
            .fetch_report(&Cancel::new(), "webgoat", Stage::Operate)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_by_stage_and_by_id_are_identical() {
        let fake = seeded().await;
        let client = IqClient::new(fake);
        let cancel = Cancel::new();

        let by_stage = client
            .fetch_report(&cancel, "webgoat", Stage::Build)
            .await
            .unwrap();
        let by_id = client
            .fetch_report_by_report_id(&cancel, "webgoat", by_stage.info().report_id())
            .await
            .unwrap();
        assert_eq!(by_stage, by_id);
    }

    #[tokio::test]
    async fn test_unlisted_report_id_keeps_empty_summary() {
        let fake = seeded().await;
        seed_report(
            &fake,
            "webgoat",
            "r-old",
            json!([component("h9", &[("p-sec", false)])]),
            json!(["h9"]),
        )
        .await;
        let client = IqClient::new(fake);

        let report = client
            .fetch_report_by_report_id(&Cancel::new(), "webgoat", "r-old")
            .await
            .unwrap();
        assert_eq!(report.policy.components[0].hash(), "h9");
        assert_eq!(report.raw.report_info, ReportInfo::default());
        assert_eq!(report.policy.report_info, ReportInfo::default());
    }
}
