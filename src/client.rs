//! Resource Manager v3 REST client implementing [`HierarchyClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::Authenticator;
use crate::config::{RetryPolicy, CONNECT_TIMEOUT, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{HierarchyError, Result};
use crate::folder_id::resource_id;
use crate::hierarchy::HierarchyClient;
use crate::models::{
    ApiErrorResponse, Folder, FolderListResponse, FolderMeta, Page, Project, ProjectListResponse,
};

/// Base URL for Cloud Resource Manager API v3.
const RESOURCE_MANAGER_API_BASE: &str = "https://cloudresourcemanager.googleapis.com/v3";

/// Client for the folder and project endpoints of Cloud Resource Manager.
///
/// Transient failures (network errors, timeouts, 429, 5xx) are retried
/// according to the configured [`RetryPolicy`]; everything else is returned to
/// the caller as is. Every request is bounded by the request timeout, so a
/// stalled connection surfaces as a transient error.
pub struct ResourceManagerClient {
    auth: Authenticator,
    http: Client,
    base_url: String,
    page_size: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ResourceManagerClient {
    /// Create a new ResourceManagerClient.
    ///
    /// # Arguments
    /// * `auth` - Authenticator for obtaining access tokens
    pub fn new(auth: Authenticator) -> Result<Self> {
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            auth,
            http,
            base_url: RESOURCE_MANAGER_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Point the client at a different endpoint (emulators, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Bound each request, including reading its body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON body, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.get_json_once(path, query).await {
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&token)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &error_body));
        }

        response.json().await.map_err(|e| {
            if e.is_decode() {
                HierarchyError::MalformedResponse(e.to_string())
            } else {
                HierarchyError::HttpError(e)
            }
        })
    }

    fn list_query(&self, folder_id: &str, page_token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("parent", format!("folders/{}", folder_id)),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        query
    }
}

/// Map an unsuccessful response to a classified error.
fn error_for_status(status: u16, body: &str) -> HierarchyError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_error) => (api_error.error.message, api_error.error.status),
        Err(_) => (body.to_string(), None),
    };

    match (status, api_status.as_deref()) {
        (404, _) | (_, Some("NOT_FOUND")) => HierarchyError::NotFound(message),
        (401 | 403, _) | (_, Some("PERMISSION_DENIED" | "UNAUTHENTICATED")) => {
            HierarchyError::PermissionDenied(message)
        }
        (429 | 500..=599, _) => HierarchyError::Transient { status, message },
        _ => HierarchyError::ApiError { status, message },
    }
}

#[async_trait]
impl HierarchyClient for ResourceManagerClient {
    async fn get_folder(&self, folder_id: &str) -> Result<FolderMeta> {
        let folder: Folder = self
            .get_json(&format!("/folders/{}", folder_id), &[])
            .await?;
        let id = resource_id(&folder.name, "folders")?;

        Ok(FolderMeta {
            id: id.to_string(),
            name: folder.display_name,
        })
    }

    async fn list_child_folders(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>> {
        let response: FolderListResponse = self
            .get_json("/folders", &self.list_query(folder_id, page_token))
            .await?;

        let items = response
            .folders
            .iter()
            .map(|f| resource_id(&f.name, "folders").map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        debug!(folder_id, count = items.len(), "Listed child folders page");

        Ok(Page {
            items,
            next_page_token: response.next_page_token,
        })
    }

    async fn list_child_resources(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Project>> {
        let response: ProjectListResponse = self
            .get_json("/projects", &self.list_query(folder_id, page_token))
            .await?;
        debug!(folder_id, count = response.projects.len(), "Listed projects page");

        Ok(Page {
            items: response.projects,
            next_page_token: response.next_page_token,
        })
    }
}
