//! Data models for the Resource Manager API and the folder tree.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A folder in the result tree, fully populated before it is handed to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FolderNode>,
    #[serde(rename = "projects", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Project>,
}

impl FolderNode {
    /// Create a node with no children and no resources.
    pub fn leaf(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            children: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Number of folders in this subtree, including this one.
    pub fn folder_count(&self) -> usize {
        1 + self.children.iter().map(FolderNode::folder_count).sum::<usize>()
    }

    /// Number of projects attached anywhere in this subtree.
    pub fn project_count(&self) -> usize {
        self.resources.len()
            + self
                .children
                .iter()
                .map(FolderNode::project_count)
                .sum::<usize>()
    }

    /// Depth-first search for a folder by id.
    pub fn find(&self, id: &str) -> Option<&FolderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids of the direct children, in order.
    pub fn child_ids(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.id.as_str()).collect()
    }
}

/// Folder metadata returned by the adapter. `id` must echo the requested folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMeta {
    pub id: String,
    pub name: String,
}

/// One page of a listing call.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// A project as returned by `projects.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

impl Project {
    pub fn new(project_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            project_id: project_id.into(),
            display_name: display_name.into(),
            parent: String::new(),
            state: None,
            labels: HashMap::new(),
            create_time: None,
        }
    }
}

/// A folder as returned by `folders.get` and `folders.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Response from the folders.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListResponse {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default, deserialize_with = "deserialize_page_token")]
    pub next_page_token: Option<String>,
}

/// Response from the projects.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListResponse {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, deserialize_with = "deserialize_page_token")]
    pub next_page_token: Option<String>,
}

/// Google APIs send `""` on the last page; treat it as absent.
fn deserialize_page_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.filter(|token| !token.is_empty()))
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}
