//! Remote cloud API client
//!
//! Defines the [`CloudClient`] trait — the exact set of remote operations the
//! engine needs — and [`DoApiClient`], the DigitalOcean v2 REST implementation.
//! Any type implementing the trait is substitutable, which is how the engine
//! tests run against an in-memory fake.
//!
//! Listings on the remote API are paginated and read-after-write eventually
//! consistent; the client pages until exhaustion, the engine polls.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.digitalocean.com";

/// Default listing page size
const DEFAULT_PAGE_SIZE: u32 = 200;

/// A live (running or provisioning) compute instance.
///
/// Owned entirely by the remote API; never cached across engine operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Droplet {
    /// Droplet ID
    pub id: u64,

    /// Droplet name; expected to equal a logical server name exactly
    pub name: String,

    /// Remote status string ("new", "active", "off", ...)
    pub status: String,

    /// Attached networks; a non-empty v4 list implies the droplet is active
    #[serde(default)]
    pub networks: Networks,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Network addresses attached to a droplet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Networks {
    /// IPv4 addresses, ordered as returned by the API
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
}

/// One IPv4 address entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkV4 {
    /// Dotted-quad address
    pub ip_address: String,

    /// Address type ("public" or "private")
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Droplet {
    /// The droplet's public IPv4 address, if it has finished provisioning.
    ///
    /// Prefers an address marked "public", falling back to the first entry.
    pub fn public_ip(&self) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == "public")
            .or_else(|| self.networks.v4.first())
            .map(|n| n.ip_address.as_str())
    }

    /// Whether the remote API reports the droplet as powered off
    pub fn is_off(&self) -> bool {
        self.status == "off"
    }
}

/// An immutable point-in-time droplet image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot ID (a string on this API, unlike droplet IDs)
    pub id: String,

    /// Snapshot name; encodes a logical server name plus a lineage marker
    pub name: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Regions holding the image; the first is used for placement
    #[serde(default)]
    pub regions: Vec<String>,

    /// Image size in gigabytes
    #[serde(default)]
    pub size_gigabytes: f64,
}

/// The eight remote operations the lifecycle engine is built on.
///
/// List operations return exhaustive results (all pages).
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// List all droplets
    async fn list_droplets(&self) -> Result<Vec<Droplet>>;

    /// Fetch one droplet by ID
    async fn get_droplet(&self, id: u64) -> Result<Droplet>;

    /// Create a droplet from an image; returns the droplet as created
    async fn create_droplet(
        &self,
        name: &str,
        region: &str,
        size: &str,
        image: &str,
    ) -> Result<Droplet>;

    /// Power a droplet off
    async fn power_off_droplet(&self, id: u64) -> Result<()>;

    /// Delete a droplet
    async fn delete_droplet(&self, id: u64) -> Result<()>;

    /// List all droplet snapshots
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>>;

    /// Request a named snapshot of a droplet
    async fn snapshot_droplet(&self, id: u64, name: &str) -> Result<()>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize, Default)]
struct PageMeta {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct DropletsPage {
    droplets: Vec<Droplet>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct SnapshotsPage {
    snapshots: Vec<Snapshot>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: Droplet,
}

/// DigitalOcean v2 REST client
pub struct DoApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl DoApiClient {
    /// Create a client against the production API endpoint
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the API endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the listing page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an API error carrying the body
    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(EngineError::api(status.as_u16(), message))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::checked(response).await
    }
}

#[async_trait]
impl CloudClient for DoApiClient {
    async fn list_droplets(&self) -> Result<Vec<Droplet>> {
        let mut droplets: Vec<Droplet> = Vec::new();
        for page in 1u32.. {
            let body: DropletsPage = self
                .get_json(
                    "/v2/droplets",
                    &[
                        ("page", page.to_string()),
                        ("per_page", self.page_size.to_string()),
                    ],
                )
                .await?;
            let fetched = body.droplets.len();
            droplets.extend(body.droplets);
            debug!(
                "droplets page {}: {} fetched, {} total",
                page, fetched, body.meta.total
            );
            if fetched == 0 || droplets.len() as u64 >= body.meta.total {
                break;
            }
        }
        Ok(droplets)
    }

    async fn get_droplet(&self, id: u64) -> Result<Droplet> {
        let body: DropletEnvelope = self
            .get_json(&format!("/v2/droplets/{id}"), &[])
            .await?;
        Ok(body.droplet)
    }

    async fn create_droplet(
        &self,
        name: &str,
        region: &str,
        size: &str,
        image: &str,
    ) -> Result<Droplet> {
        debug!("creating droplet {} in {} from image {}", name, region, image);
        let response = self
            .post_json(
                "/v2/droplets",
                json!({
                    "name": name,
                    "region": region,
                    "size": size,
                    "image": image,
                }),
            )
            .await?;
        let body: DropletEnvelope = response.json().await?;
        Ok(body.droplet)
    }

    async fn power_off_droplet(&self, id: u64) -> Result<()> {
        self.post_json(
            &format!("/v2/droplets/{id}/actions"),
            json!({ "type": "power_off" }),
        )
        .await?;
        Ok(())
    }

    async fn delete_droplet(&self, id: u64) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v2/droplets/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots: Vec<Snapshot> = Vec::new();
        for page in 1u32.. {
            let body: SnapshotsPage = self
                .get_json(
                    "/v2/snapshots",
                    &[
                        ("resource_type", "droplet".to_string()),
                        ("page", page.to_string()),
                        ("per_page", self.page_size.to_string()),
                    ],
                )
                .await?;
            let fetched = body.snapshots.len();
            snapshots.extend(body.snapshots);
            if fetched == 0 || snapshots.len() as u64 >= body.meta.total {
                break;
            }
        }
        Ok(snapshots)
    }

    async fn snapshot_droplet(&self, id: u64, name: &str) -> Result<()> {
        self.post_json(
            &format!("/v2/droplets/{id}/actions"),
            json!({ "type": "snapshot", "name": name }),
        )
        .await?;
        Ok(())
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v2/snapshots/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> DoApiClient {
        DoApiClient::new("test-token")
            .with_base_url(server.uri())
            .with_page_size(2)
    }

    fn droplet_json(id: u64, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "status": "active",
            "networks": { "v4": [{ "ip_address": "10.0.0.1", "type": "public" }] },
            "created_at": "2024-01-01T00:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_list_droplets_pages_until_exhaustion() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [droplet_json(1, "web"), droplet_json(2, "build")],
                "meta": { "total": 3 },
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [droplet_json(3, "minecraft")],
                "meta": { "total": 3 },
            })))
            .mount(&server)
            .await;

        let droplets = client_for(&server).list_droplets().await.unwrap();
        let names: Vec<_> = droplets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["web", "build", "minecraft"]);
    }

    #[tokio::test]
    async fn test_list_snapshots_filters_droplet_resource_type() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/snapshots"))
            .and(query_param("resource_type", "droplet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "snapshots": [{
                    "id": "snap-1",
                    "name": "web-1700000000000",
                    "created_at": "2024-01-01T00:00:00Z",
                    "regions": ["nyc3"],
                    "size_gigabytes": 25.5,
                }],
                "meta": { "total": 1 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshots = client_for(&server).list_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, "snap-1");
        assert_eq!(snapshots[0].regions, vec!["nyc3"]);
        assert_eq!(snapshots[0].size_gigabytes, 25.5);
    }

    #[tokio::test]
    async fn test_create_droplet_request_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .and(body_json(json!({
                "name": "web",
                "region": "nyc3",
                "size": "s-2vcpu-4gb",
                "image": "snap-1",
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "droplet": {
                    "id": 42,
                    "name": "web",
                    "status": "new",
                    "networks": { "v4": [] },
                    "created_at": "2024-01-01T00:00:00Z",
                },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let droplet = client_for(&server)
            .create_droplet("web", "nyc3", "s-2vcpu-4gb", "snap-1")
            .await
            .unwrap();
        assert_eq!(droplet.id, 42);
        assert_eq!(droplet.public_ip(), None);
    }

    #[tokio::test]
    async fn test_snapshot_action_request_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/droplets/42/actions"))
            .and(body_json(json!({ "type": "snapshot", "name": "web-1700000000000" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "action": {} })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .snapshot_droplet(42, "web-1700000000000")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("Unable to authenticate you"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).list_droplets().await.unwrap_err();
        match err {
            EngineError::Api { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("authenticate"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_public_ip_prefers_public_entry() {
        let droplet = Droplet {
            id: 1,
            name: "web".to_string(),
            status: "active".to_string(),
            networks: Networks {
                v4: vec![
                    NetworkV4 {
                        ip_address: "10.0.0.1".to_string(),
                        kind: "private".to_string(),
                    },
                    NetworkV4 {
                        ip_address: "203.0.113.7".to_string(),
                        kind: "public".to_string(),
                    },
                ],
            },
            created_at: Utc::now(),
        };
        assert_eq!(droplet.public_ip(), Some("203.0.113.7"));
    }
}
