//! REST/JSON client for the remote list API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use listsync_common::{Error, ExternalId, Result};

use crate::api::RemoteApi;
use crate::model::{CreateListRequest, RemoteItem, RemoteList, UpdateItemBody, UpdateListBody};
use crate::retry::{RetryConfig, RetryExecutor};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:4000";

const LISTS: &str = "todolists";
const ITEMS: &str = "todoitems";

/// HTTP client for the remote list API.
pub struct HttpRemoteClient {
    http: Client,
    base_url: Url,
    retry: RetryExecutor,
}

impl HttpRemoteClient {
    /// Create a new client.
    ///
    /// # Errors
    /// - `base_url` is not an absolute http(s) URL
    /// - The HTTP client cannot be constructed
    pub fn new(base_url: &str, timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid API base URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidInput(format!(
                "API base URL cannot carry paths: {}",
                base_url
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("listsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            retry: RetryExecutor::new(retry),
        })
    }

    /// Build an endpoint URL from path segments; segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request. Transport failures are retried for idempotent
    /// methods only; a timed-out POST or PATCH may already have been applied.
    async fn send<F>(&self, method: Method, url: &Url, what: &str, body: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        debug!("Remote call: {}", what);
        let idempotent = is_idempotent(&method);
        self.retry
            .execute_if(
                what,
                || {
                    let request = body(self.http.request(method.clone(), url.clone()));
                    async move {
                        request
                            .send()
                            .await
                            .map_err(|e| Error::Network(format!("{} failed: {}", what, e)))
                    }
                },
                |e| idempotent && e.is_transient(),
            )
            .await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let response = self.check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        error!("API error: status={} url={} body={}", status.as_u16(), url, body);
        Err(Error::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

#[async_trait]
impl RemoteApi for HttpRemoteClient {
    async fn fetch_all_lists(&self) -> Result<Vec<RemoteList>> {
        let url = self.endpoint(&[LISTS]);
        let response = self
            .send(Method::GET, &url, "GET /todolists", |req| req)
            .await?;
        self.handle_response(response).await
    }

    async fn create_list(&self, request: &CreateListRequest) -> Result<RemoteList> {
        let url = self.endpoint(&[LISTS]);
        let response = self
            .send(Method::POST, &url, "POST /todolists", |req| req.json(request))
            .await?;
        self.handle_response(response).await
    }

    async fn update_list(&self, external_id: &ExternalId, name: &str) -> Result<RemoteList> {
        let url = self.endpoint(&[LISTS, external_id.as_str()]);
        let body = UpdateListBody {
            name: name.to_string(),
        };
        let response = self
            .send(Method::PATCH, &url, "PATCH /todolists/:id", |req| req.json(&body))
            .await?;
        self.handle_response(response).await
    }

    async fn delete_list(&self, external_id: &ExternalId) -> Result<()> {
        let url = self.endpoint(&[LISTS, external_id.as_str()]);
        let response = self
            .send(Method::DELETE, &url, "DELETE /todolists/:id", |req| req)
            .await?;
        self.check_status(response).await.map(|_| ())
    }

    async fn update_item(
        &self,
        list_external_id: &ExternalId,
        item_external_id: &ExternalId,
        description: &str,
        completed: bool,
    ) -> Result<RemoteItem> {
        let url = self.endpoint(&[
            LISTS,
            list_external_id.as_str(),
            ITEMS,
            item_external_id.as_str(),
        ]);
        let body = UpdateItemBody {
            description: description.to_string(),
            completed,
        };
        let response = self
            .send(Method::PATCH, &url, "PATCH /todolists/:id/todoitems/:id", |req| {
                req.json(&body)
            })
            .await?;
        self.handle_response(response).await
    }

    async fn delete_item(
        &self,
        list_external_id: &ExternalId,
        item_external_id: &ExternalId,
    ) -> Result<()> {
        let url = self.endpoint(&[
            LISTS,
            list_external_id.as_str(),
            ITEMS,
            item_external_id.as_str(),
        ]);
        let response = self
            .send(Method::DELETE, &url, "DELETE /todolists/:id/todoitems/:id", |req| req)
            .await?;
        self.check_status(response).await.map(|_| ())
    }
}
