//! Report aggregation across stages, applications and organizations.
//!
//! Fan-out is bounded by the configured concurrency and keeps input order.
//! A failing item never aborts its siblings: it is recorded in the returned
//! [`Partial`] so callers can tell "no data" from "some sources failed".
//! Cancellation always aborts the whole aggregation.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

use crate::client::{Cancel, IqClient};
use crate::error::{IqError, Result};
use crate::models::{
    Application, Component, ComponentDetail, Report, ReportInfo, ReportPolicy, ReportRaw, Stage,
};
use crate::reports::resolver::REST_REPORTS;

/// One source that could not be retrieved during an aggregation.
#[derive(Debug)]
pub struct ItemFailure {
    /// What was being retrieved, e.g. `webgoat@build`.
    pub item: String,
    pub error: IqError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.error)
    }
}

/// Aggregated items plus the failures encountered while collecting them.
#[derive(Debug)]
pub struct Partial<T> {
    pub items: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Partial<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record `error` against `item`. Cancellation is handed back instead.
    fn fail(&mut self, item: impl Into<String>, error: IqError) -> Result<()> {
        if error.is_cancelled() {
            return Err(error);
        }
        let item = item.into();
        warn!("Skipping {}: {}", item, error);
        self.failures.push(ItemFailure { item, error });
        Ok(())
    }

    fn absorb(&mut self, item: impl Into<String>, result: Result<T>) -> Result<()> {
        match result {
            Ok(value) => {
                self.items.push(value);
                Ok(())
            }
            Err(e) => self.fail(item, e),
        }
    }
}

/// Runs the report pipeline across many applications and stages.
#[derive(Clone)]
pub struct Aggregator {
    client: IqClient,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(client: IqClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &IqClient {
        &self.client
    }

    /// Every report summary on the instance.
    pub async fn all_report_infos(&self, cancel: &Cancel) -> Result<Vec<ReportInfo>> {
        let infos: Vec<ReportInfo> = self
            .client
            .get_json(cancel, REST_REPORTS, "report infos")
            .await?;
        info!("Instance lists {} report summaries", infos.len());
        Ok(infos)
    }

    /// Every report on the instance.
    ///
    /// A report whose raw or policy half cannot be fetched is still included,
    /// stamped with its summary and with an empty payload for that half.
    pub async fn all_reports(&self, cancel: &Cancel) -> Result<Partial<Report>> {
        let infos = self.all_report_infos(cancel).await?;
        let client = &self.client;

        let outcomes: Vec<_> = stream::iter(infos)
            .map(|info| async move {
                let raw = client.fetch_raw(cancel, &info).await;
                let policy = client.fetch_policy(cancel, &info).await;
                (info, raw, policy)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut partial = Partial::default();
        for (info, raw, policy) in outcomes {
            let label = format!("report {}", info.report_id());
            let raw = raw.or_else(|e| {
                partial.fail(format!("{label} (raw)"), e)?;
                Ok::<_, IqError>(ReportRaw {
                    report_info: info.clone(),
                    ..Default::default()
                })
            })?;
            let policy = policy.or_else(|e| {
                partial.fail(format!("{label} (policy)"), e)?;
                Ok::<_, IqError>(ReportPolicy {
                    report_info: info.clone(),
                    ..Default::default()
                })
            })?;
            partial.items.push(Report { policy, raw });
        }
        Ok(partial)
    }

    /// Report summaries of every application in the organization.
    pub async fn report_infos_for_organization(
        &self,
        cancel: &Cancel,
        org_name: &str,
    ) -> Result<Partial<ReportInfo>> {
        let apps = self
            .client
            .applications_by_organization(cancel, org_name)
            .await?;

        let mut partial = Partial::default();
        for (app, result) in self.list_infos(cancel, apps).await {
            match result {
                Ok(infos) => partial.items.extend(infos),
                Err(e) => partial.fail(app.public_id, e)?,
            }
        }
        info!(
            "Organization '{}': {} report summaries, {} failures",
            org_name,
            partial.items.len(),
            partial.failures.len()
        );
        Ok(partial)
    }

    /// Late-stage reports of every application in the organization.
    ///
    /// A stage without a report is simply absent from the result.
    pub async fn reports_for_organization(
        &self,
        cancel: &Cancel,
        org_name: &str,
    ) -> Result<Partial<Report>> {
        let apps = self
            .client
            .applications_by_organization(cancel, org_name)
            .await?;

        let mut partial = Partial::default();
        let mut wanted = Vec::new();
        for (app, result) in self.list_infos(cancel, apps).await {
            match result {
                Ok(infos) => wanted.extend(
                    late_stage_infos(&infos)
                        .into_iter()
                        .map(|(stage, info)| (format!("{}@{}", app.public_id, stage), info)),
                ),
                Err(e) => partial.fail(app.public_id, e)?,
            }
        }

        let client = &self.client;
        let fetched: Vec<_> = stream::iter(wanted)
            .map(|(label, info)| async move {
                let report = client.fetch_report_for_info(cancel, &info).await;
                (label, report)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (label, report) in fetched {
            partial.absorb(label, report)?;
        }
        info!(
            "Organization '{}': {} reports, {} failures",
            org_name,
            partial.items.len(),
            partial.failures.len()
        );
        Ok(partial)
    }

    /// Distinct components across the application's late-stage raw reports,
    /// with their detailed metadata.
    pub async fn components_for_application(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
    ) -> Result<Partial<ComponentDetail>> {
        let infos = self
            .client
            .list_report_infos_for_application(cancel, app_public_id)
            .await?;

        let client = &self.client;
        let raws: Vec<_> = stream::iter(late_stage_infos(&infos))
            .map(|(stage, info)| async move { (stage, client.fetch_raw(cancel, &info).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut partial = Partial::default();
        let mut seen = HashSet::new();
        let mut components: Vec<Component> = Vec::new();
        for (stage, raw) in raws {
            match raw {
                Ok(raw) => {
                    for c in raw.components {
                        if seen.insert(c.component.hash.clone()) {
                            components.push(c.component);
                        }
                    }
                }
                Err(e) => partial.fail(format!("{}@{}", app_public_id, stage), e)?,
            }
        }
        debug!(
            "Application '{}' has {} distinct components",
            app_public_id,
            components.len()
        );

        partial.items = self.client.component_details(cancel, &components).await?;
        Ok(partial)
    }

    /// Distinct components across every application on the instance.
    pub async fn all_components(&self, cancel: &Cancel) -> Result<Partial<ComponentDetail>> {
        let apps = self.client.all_applications(cancel).await?;

        let per_app: Vec<_> = stream::iter(apps)
            .map(|app| async move {
                let details = self.components_for_application(cancel, &app.public_id).await;
                (app, details)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut partial = Partial::default();
        let mut seen = HashSet::new();
        for (app, details) in per_app {
            match details {
                Ok(app_partial) => {
                    partial.failures.extend(app_partial.failures);
                    for detail in app_partial.items {
                        if seen.insert(detail.component.hash.clone()) {
                            partial.items.push(detail);
                        }
                    }
                }
                Err(e) => partial.fail(app.public_id, e)?,
            }
        }
        info!(
            "Instance has {} distinct components, {} failures",
            partial.items.len(),
            partial.failures.len()
        );
        Ok(partial)
    }

    async fn list_infos(
        &self,
        cancel: &Cancel,
        apps: Vec<Application>,
    ) -> Vec<(Application, Result<Vec<ReportInfo>>)> {
        let client = &self.client;
        stream::iter(apps)
            .map(|app| async move {
                let infos = client
                    .list_report_infos_for_application(cancel, &app.public_id)
                    .await;
                (app, infos)
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// First summary per late stage, in stage order.
fn late_stage_infos(infos: &[ReportInfo]) -> Vec<(Stage, ReportInfo)> {
    Stage::LATE
        .into_iter()
        .filter_map(|stage| {
            infos
                .iter()
                .find(|info| info.is_stage(stage))
                .map(|info| (stage, info.clone()))
        })
        .collect()
}

/// Group report summaries by application ID, keeping server order per group.
pub fn group_by_application(infos: &[ReportInfo]) -> BTreeMap<&str, Vec<&ReportInfo>> {
    let mut grouped: BTreeMap<&str, Vec<&ReportInfo>> = BTreeMap::new();

    for info in infos {
        grouped
            .entry(info.application_id.as_str())
            .or_default()
            .push(info);
    }

    grouped
}
