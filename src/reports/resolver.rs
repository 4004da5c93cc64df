//! Report summary resolution.
//!
//! Lists the report summaries retained for an application and picks one by
//! stage or by report identifier. Retention is decided by the server.

use tracing::debug;

use crate::client::{Cancel, IqClient};
use crate::error::{IqError, Result};
use crate::models::{ReportInfo, Stage};

pub(crate) const REST_REPORTS: &str = "api/v2/reports/applications";

impl IqClient {
    /// Every report summary currently retained for the application.
    ///
    /// An application without evaluations yields an empty list.
    pub async fn list_report_infos_for_application(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
    ) -> Result<Vec<ReportInfo>> {
        let app = self.application_by_public_id(cancel, app_public_id).await?;
        let path = format!("{}/{}", REST_REPORTS, app.id);
        let infos: Vec<ReportInfo> = self.get_json(cancel, &path, "report infos").await?;
        debug!(
            "Application '{}' has {} report summaries",
            app_public_id,
            infos.len()
        );
        Ok(infos)
    }

    /// First summary, in server order, evaluated at `stage`.
    pub async fn find_report_info(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        stage: Stage,
    ) -> Result<ReportInfo> {
        self.list_report_infos_for_application(cancel, app_public_id)
            .await?
            .into_iter()
            .find(|info| info.is_stage(stage))
            .ok_or_else(|| {
                IqError::not_found("report", format!("{}@{}", app_public_id, stage))
            })
    }

    /// First summary, in server order, whose report ID is `report_id`.
    pub async fn find_report_info_by_id(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        report_id: &str,
    ) -> Result<ReportInfo> {
        self.list_report_infos_for_application(cancel, app_public_id)
            .await?
            .into_iter()
            .find(|info| info.report_id() == report_id)
            .ok_or_else(|| IqError::not_found("report", format!("{}/{}", app_public_id, report_id)))
    }
}
