// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client for the policy compute engine (PCE) REST API
//!
//! Implements [`InventoryClient`] over the PCE's v2 workload and label
//! endpoints, authenticating with an API user and key.

use anyhow::Context;
use anyhow::bail;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use slog::Logger;
use slog::debug;
use slog::o;
use std::time::Duration;
use wkld_reconciler::BulkResult;
use wkld_reconciler::InventoryClient;
use wkld_reconciler::Label;
use wkld_reconciler::Workload;

/// Most workloads the PCE accepts in one bulk request
pub const BULK_CHUNK_SIZE: usize = 1000;

/// Upper bound passed to list endpoints, which otherwise truncate
const MAX_RESULTS: u32 = 100_000;

/// Connection settings for one PCE
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PceConfig {
    /// Base URL, e.g. `https://pce.example.com:8443`
    pub url: String,
    pub org_id: u64,
    pub api_user: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub disable_tls_checking: bool,
}

#[derive(Serialize)]
struct NewLabel<'a> {
    key: &'a str,
    value: &'a str,
}

pub struct PceClient {
    log: Logger,
    client: reqwest::Client,
    base_url: String,
    org_id: u64,
    api_user: String,
    api_key: String,
}

impl PceClient {
    pub fn new(log: &Logger, config: &PceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .danger_accept_invalid_certs(config.disable_tls_checking)
            .build()
            .context("building HTTP client")?;
        let base_url = config.url.trim_end_matches('/').to_string();
        Ok(PceClient {
            log: log.new(o!("pce" => base_url.clone())),
            client,
            base_url,
            org_id: config.org_id,
            api_user: config.api_user.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/orgs/{}/{path}", self.base_url, self.org_id)
    }

    async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(self.log, "client request"; "method" => %method, "uri" => &url);

        let mut req = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.api_user, Some(&self.api_key))
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req
            .send()
            .await
            .with_context(|| format!("{method} {url}"))?;

        let status = response.status();
        debug!(self.log, "client response"; "uri" => &url, "status" => %status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{method} {url}: PCE returned {status}: {body}");
        }
        response
            .json()
            .await
            .with_context(|| format!("{method} {url}: parsing response"))
    }

    async fn bulk(
        &self,
        path: &str,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>> {
        let mut results = Vec::with_capacity(workloads.len());
        for chunk in workloads.chunks(BULK_CHUNK_SIZE) {
            let mut chunk_results: Vec<BulkResult> = self
                .request(Method::PUT, path, &[], Some(chunk))
                .await?;
            debug!(
                self.log,
                "bulk request done";
                "path" => path,
                "sent" => chunk.len(),
                "results" => chunk_results.len(),
            );
            results.append(&mut chunk_results);
        }
        Ok(results)
    }
}

#[async_trait]
impl InventoryClient for PceClient {
    fn target(&self) -> String {
        self.base_url.clone()
    }

    async fn list_workloads(&self) -> anyhow::Result<Vec<Workload>> {
        self.request::<(), _>(
            Method::GET,
            "workloads",
            &[("max_results", MAX_RESULTS.to_string())],
            None,
        )
        .await
        .context("listing workloads")
    }

    async fn list_labels(&self) -> anyhow::Result<Vec<Label>> {
        self.request::<(), _>(
            Method::GET,
            "labels",
            &[("max_results", MAX_RESULTS.to_string())],
            None,
        )
        .await
        .context("listing labels")
    }

    async fn create_label(
        &self,
        key: &str,
        value: &str,
    ) -> anyhow::Result<Label> {
        self.request(
            Method::POST,
            "labels",
            &[],
            Some(&NewLabel { key, value }),
        )
        .await
    }

    async fn bulk_update(
        &self,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>> {
        self.bulk("workloads/bulk_update", workloads).await
    }

    async fn bulk_create(
        &self,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>> {
        self.bulk("workloads/bulk_create", workloads).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::Expectation;
    use httptest::all_of;
    use httptest::matchers::contains;
    use httptest::matchers::eq;
    use httptest::matchers::json_decoded;
    use httptest::matchers::request;
    use httptest::matchers::url_decoded;
    use httptest::responders::json_encoded;
    use httptest::responders::status_code;
    use serde_json::json;

    fn client(server: &httptest::Server) -> PceClient {
        let log = Logger::root(slog::Discard, o!());
        let config = PceConfig {
            url: server.url_str("/"),
            org_id: 1,
            api_user: "api_1".to_string(),
            api_key: "secret".to_string(),
            disable_tls_checking: false,
        };
        PceClient::new(&log, &config).unwrap()
    }

    #[tokio::test]
    async fn test_list_workloads() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/api/v2/orgs/1/workloads"),
                request::headers(contains((
                    "authorization",
                    "Basic YXBpXzE6c2VjcmV0"
                ))),
                request::query(url_decoded(contains((
                    "max_results",
                    "100000"
                )))),
            ])
            .respond_with(json_encoded(json!([
                {
                    "href": "/orgs/1/workloads/w1",
                    "hostname": "web1",
                    "public_ip": null,
                    "labels": [{ "key": "role", "href": "/orgs/1/labels/3" }],
                    "agent": { "href": "/orgs/1/agents/9" },
                    "some_field_we_ignore": 7
                },
                { "href": "/orgs/1/workloads/w2", "name": "db" }
            ]))),
        );

        let workloads = client(&server).list_workloads().await.unwrap();
        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads[0].hostname, "web1");
        assert!(workloads[0].is_managed());
        assert_eq!(workloads[0].label_href("role"), Some("/orgs/1/labels/3"));
        assert_eq!(workloads[1].name, "db");
        assert!(!workloads[1].is_managed());
    }

    #[tokio::test]
    async fn test_create_label() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/api/v2/orgs/1/labels"),
                request::body(json_decoded(eq(
                    json!({ "key": "role", "value": "db" })
                ))),
            ])
            .respond_with(json_encoded(json!({
                "href": "/orgs/1/labels/12",
                "key": "role",
                "value": "db"
            }))),
        );

        let label = client(&server).create_label("role", "db").await.unwrap();
        assert_eq!(label.href, "/orgs/1/labels/12");
    }

    #[tokio::test]
    async fn test_bulk_update_is_chunked() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "PUT",
                "/api/v2/orgs/1/workloads/bulk_update",
            ))
            .times(2)
            .respond_with(json_encoded(json!([
                { "href": "/orgs/1/workloads/w1", "status": "updated" }
            ]))),
        );

        let workloads: Vec<_> = (0..BULK_CHUNK_SIZE + 1)
            .map(|i| Workload {
                href: Some(format!("/orgs/1/workloads/w{i}")),
                ..Default::default()
            })
            .collect();
        let results = client(&server).bulk_update(&workloads).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_success()));
    }

    #[tokio::test]
    async fn test_bulk_item_errors_are_returned() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "PUT",
                "/api/v2/orgs/1/workloads/bulk_create",
            ))
            .respond_with(json_encoded(json!([
                { "status": "validation_failure", "errors": ["bad ip"] }
            ]))),
        );

        let results = client(&server)
            .bulk_create(&[Workload::default()])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_success());
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = httptest::Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/api/v2/orgs/1/labels",
            ))
            .respond_with(status_code(401).body("bad credentials")),
        );

        let err = client(&server).list_labels().await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("listing labels"), "{message}");
        assert!(message.contains("401"), "{message}");
        assert!(message.contains("bad credentials"), "{message}");
    }
}
