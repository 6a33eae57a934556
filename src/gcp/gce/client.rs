use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::client::CLIENT;
use crate::gcp::gce::types::{
    AddressAggregatedList, Disk, DiskList, Instance, InstanceRequest, Operation,
};
use crate::gcp::types::Credential;

pub const GCE_API_BASE: &str = "https://www.googleapis.com/compute/v1";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("compute api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("compute api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// The subset of the Compute Engine API the provisioning workflow uses.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// All disks in a zone, in provider order.
    async fn list_disks(&self, project: &str, zone: &str) -> Result<Vec<Disk>, ApiError>;

    /// All addresses in a project, across every region.
    async fn aggregated_addresses(&self, project: &str)
    -> Result<AddressAggregatedList, ApiError>;

    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &InstanceRequest,
    ) -> Result<Operation, ApiError>;

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ApiError>;

    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Instance, ApiError>;
}

/// REST client for the Compute Engine v1 API.
#[derive(Clone)]
pub struct ComputeClient {
    base: String,
    authorization: String,
    http: reqwest::Client,
}

impl ComputeClient {
    pub fn new(credential: &Credential) -> Self {
        ComputeClient::with_base(GCE_API_BASE, credential)
    }

    pub fn with_base(base: impl Into<String>, credential: &Credential) -> Self {
        ComputeClient {
            base: base.into(),
            authorization: credential.authorization(),
            http: CLIENT.clone(),
        }
    }

    fn url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{}{}", self.base, project, path)
    }

    async fn check(
        resp: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        page_token: Option<&str>,
        endpoint: &'static str,
    ) -> Result<T, ApiError> {
        let mut req = self
            .http
            .get(url)
            .header("Authorization", &self.authorization);
        if let Some(t) = page_token {
            req = req.query(&[("pageToken", t)]);
        }
        let resp = req.send().await?;
        Ok(Self::check(resp, endpoint).await?.json().await?)
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    async fn list_disks(&self, project: &str, zone: &str) -> Result<Vec<Disk>, ApiError> {
        let url = self.url(project, &format!("/zones/{}/disks", zone));
        let mut disks = Vec::new();
        let mut page_token: Option<String> = None;
        // Loop to handle paginated results.
        loop {
            let page: DiskList = self
                .get_json(&url, page_token.as_deref(), "disks.list")
                .await?;
            disks.extend(page.items);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(disks)
    }

    async fn aggregated_addresses(
        &self,
        project: &str,
    ) -> Result<AddressAggregatedList, ApiError> {
        let url = self.url(project, "/aggregated/addresses");
        let mut all = AddressAggregatedList::default();
        let mut page_token: Option<String> = None;
        loop {
            let page: AddressAggregatedList = self
                .get_json(&url, page_token.as_deref(), "addresses.aggregatedList")
                .await?;
            page_token = page.next_page_token.clone();
            all.merge(page);
            if page_token.is_none() {
                break;
            }
        }
        Ok(all)
    }

    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &InstanceRequest,
    ) -> Result<Operation, ApiError> {
        let resp = self
            .http
            .post(self.url(project, &format!("/zones/{}/instances", zone)))
            .header("Authorization", &self.authorization)
            .json(instance)
            .send()
            .await?;
        Ok(Self::check(resp, "instances.insert").await?.json().await?)
    }

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ApiError> {
        let url = self.url(project, &format!("/zones/{}/operations/{}", zone, operation));
        self.get_json(&url, None, "zoneOperations.get").await
    }

    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Instance, ApiError> {
        let url = self.url(project, &format!("/zones/{}/instances/{}", zone, instance));
        self.get_json(&url, None, "instances.get").await
    }
}
