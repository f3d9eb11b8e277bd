//! Capability boundary between the tree builder and the cloud API.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FolderMeta, Page, Project};

/// Read-only access to a folder hierarchy.
///
/// Implementations are shared by every traversal task, so they must be
/// `Send + Sync`. Pagination is driven by the caller: each call returns one
/// page and the token for the next one, if any.
#[async_trait]
pub trait HierarchyClient: Send + Sync {
    /// Fetch the metadata of a single folder.
    async fn get_folder(&self, folder_id: &str) -> Result<FolderMeta>;

    /// Fetch one page of the ids of the direct sub-folders of `folder_id`.
    async fn list_child_folders(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>>;

    /// Fetch one page of the projects owned directly by `folder_id`.
    async fn list_child_resources(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Project>>;
}
