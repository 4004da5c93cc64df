//! Application, organization and component-detail lookups.
//!
//! These translate human-facing identifiers into internal IDs before report
//! paths are built, and fetch detailed component metadata for the component
//! aggregations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cancel, IqClient};
use crate::error::{IqError, Result};
use crate::models::{Application, Component, ComponentDetail, ComponentIdentifier, Organization};

const REST_APPLICATIONS: &str = "api/v2/applications";
const REST_ORGANIZATIONS: &str = "api/v2/organizations";
const REST_COMPONENT_DETAILS: &str = "api/v2/components/details";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplicationsResponse {
    applications: Vec<Application>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganizationsResponse {
    organizations: Vec<Organization>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestedComponent<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    component_identifier: Option<&'a ComponentIdentifier>,
    #[serde(skip_serializing_if = "str::is_empty")]
    package_url: &'a str,
}

#[derive(Debug, Serialize)]
struct DetailsRequest<'a> {
    components: Vec<RequestedComponent<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DetailsResponse {
    component_details: Vec<ComponentDetail>,
}

/// Lookup path with `public_id` form-encoded into the query.
fn application_by_public_id_path(public_id: &str) -> Result<String> {
    let mut url = reqwest::Url::parse("iq:/")
        .map_err(|e| IqError::request_failed(REST_APPLICATIONS, None, e.to_string()))?;
    url.query_pairs_mut().append_pair("publicId", public_id);
    Ok(format!(
        "{}?{}",
        REST_APPLICATIONS,
        url.query().unwrap_or_default()
    ))
}

impl IqClient {
    /// Resolve an application from its public ID.
    pub async fn application_by_public_id(
        &self,
        cancel: &Cancel,
        public_id: &str,
    ) -> Result<Application> {
        let path = application_by_public_id_path(public_id)?;
        let response: ApplicationsResponse = self.get_json(cancel, &path, "applications").await?;
        response
            .applications
            .into_iter()
            .next()
            .ok_or_else(|| IqError::not_found("application", public_id))
    }

    pub async fn all_applications(&self, cancel: &Cancel) -> Result<Vec<Application>> {
        let response: ApplicationsResponse = self
            .get_json(cancel, REST_APPLICATIONS, "applications")
            .await?;
        Ok(response.applications)
    }

    pub async fn all_organizations(&self, cancel: &Cancel) -> Result<Vec<Organization>> {
        let response: OrganizationsResponse = self
            .get_json(cancel, REST_ORGANIZATIONS, "organizations")
            .await?;
        Ok(response.organizations)
    }

    /// Resolve an organization by its exact name.
    pub async fn organization_by_name(&self, cancel: &Cancel, name: &str) -> Result<Organization> {
        self.all_organizations(cancel)
            .await?
            .into_iter()
            .find(|org| org.name == name)
            .ok_or_else(|| IqError::not_found("organization", name))
    }

    /// Every application owned by the named organization.
    pub async fn applications_by_organization(
        &self,
        cancel: &Cancel,
        name: &str,
    ) -> Result<Vec<Application>> {
        let org = self.organization_by_name(cancel, name).await?;
        let apps: Vec<Application> = self
            .all_applications(cancel)
            .await?
            .into_iter()
            .filter(|app| app.organization_id == org.id)
            .collect();
        debug!("Organization '{}' owns {} applications", name, apps.len());
        Ok(apps)
    }

    /// Look up detailed metadata for the given components.
    pub async fn component_details(
        &self,
        cancel: &Cancel,
        components: &[Component],
    ) -> Result<Vec<ComponentDetail>> {
        if components.is_empty() {
            return Ok(Vec::new());
        }
        let request = DetailsRequest {
            components: components
                .iter()
                .map(|c| RequestedComponent {
                    hash: &c.hash,
                    component_identifier: c.component_identifier.as_ref(),
                    package_url: &c.package_url,
                })
                .collect(),
        };
        let response: DetailsResponse = self
            .post_json(cancel, REST_COMPONENT_DETAILS, &request, "component details")
            .await?;
        Ok(response.component_details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeTransport;
    use serde_json::json;
    use std::sync::Arc;

    async fn directory() -> (Arc<FakeTransport>, IqClient) {
        let fake = Arc::new(FakeTransport::default());
        fake.respond_json(
            REST_ORGANIZATIONS,
            json!({"organizations": [
                {"id": "org-1", "name": "Sandbox"},
                {"id": "org-2", "name": "Payments", "tags": [{"id": "t1", "name": "Internal", "color": "dark-blue"}]}
            ]}),
        )
        .await;
        fake.respond_json(
            REST_APPLICATIONS,
            json!({"applications": [
                {"id": "a1", "publicId": "webgoat", "name": "WebGoat", "organizationId": "org-1"},
                {"id": "a2", "publicId": "ledger", "name": "Ledger", "organizationId": "org-2"},
                {"id": "a3", "publicId": "billing", "name": "Billing", "organizationId": "org-2"}
            ]}),
        )
        .await;
        fake.respond_json(
            &application_by_public_id_path("webgoat").unwrap(),
            json!({"applications": [
                {"id": "a1", "publicId": "webgoat", "name": "WebGoat", "organizationId": "org-1"}
            ]}),
        )
        .await;
        fake.respond_json(
            &application_by_public_id_path("ghost").unwrap(),
            json!({"applications": []}),
        )
        .await;
        let client = IqClient::new(fake.clone());
        (fake, client)
    }

    #[tokio::test]
    async fn test_application_by_public_id() {
        let (_, client) = directory().await;
        let cancel = Cancel::new();

        let app = client.application_by_public_id(&cancel, "webgoat").await.unwrap();
        assert_eq!(app.id, "a1");

        let err = client
            .application_by_public_id(&cancel, "ghost")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_public_id_is_encoded_in_query() {
        assert_eq!(
            application_by_public_id_path("webgoat").unwrap(),
            "api/v2/applications?publicId=webgoat"
        );
        assert_eq!(
            application_by_public_id_path("pay & go/v2").unwrap(),
            "api/v2/applications?publicId=pay+%26+go%2Fv2"
        );

        let (fake, client) = directory().await;
        fake.respond_json(
            "api/v2/applications?publicId=pay+%26+go%2Fv2",
            json!({"applications": [{"id": "a9", "publicId": "pay & go/v2", "name": "Pay"}]}),
        )
        .await;
        let app = client
            .application_by_public_id(&Cancel::new(), "pay & go/v2")
            .await
            .unwrap();
        assert_eq!(app.id, "a9");
    }

    #[tokio::test]
    async fn test_organization_by_name() {
        let (_, client) = directory().await;
        let cancel = Cancel::new();

        let org = client.organization_by_name(&cancel, "Payments").await.unwrap();
        assert_eq!(org.id, "org-2");
        assert_eq!(org.tags[0].color, "dark-blue");

        let err = client
            .organization_by_name(&cancel, "payments")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_applications_by_organization_filters_owner() {
        let (_, client) = directory().await;
        let apps = client
            .applications_by_organization(&Cancel::new(), "Payments")
            .await
            .unwrap();
        let ids: Vec<_> = apps.iter().map(|a| a.public_id.as_str()).collect();
        assert_eq!(ids, vec!["ledger", "billing"]);
    }

    #[tokio::test]
    async fn test_component_details_request_shape() {
        let (fake, client) = directory().await;
        fake.respond_json(
            REST_COMPONENT_DETAILS,
            json!({"componentDetails": [
                {"component": {"hash": "h1"}, "matchState": "exact", "catalogDate": "2019-01-01", "relativePopularity": 42}
            ]}),
        )
        .await;

        let components = vec![Component {
            hash: "h1".to_string(),
            package_url: "pkg:npm/lodash@4.17.4".to_string(),
            ..Default::default()
        }];
        let details = client
            .component_details(&Cancel::new(), &components)
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].relative_popularity, Some(42));

        let posted = fake.posted.lock().await;
        assert_eq!(
            posted[0].1,
            json!({"components": [{"hash": "h1", "packageUrl": "pkg:npm/lodash@4.17.4"}]})
        );
    }

    #[tokio::test]
    async fn test_component_details_skips_empty_request() {
        let (fake, client) = directory().await;
        let details = client.component_details(&Cancel::new(), &[]).await.unwrap();
        assert!(details.is_empty());
        assert_eq!(fake.calls(REST_COMPONENT_DETAILS), 0);
    }
}
