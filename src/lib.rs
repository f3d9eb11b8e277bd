//! folder_tree - Discover a Google Cloud folder hierarchy as a JSON forest.
//!
//! This library provides functionality to:
//! - Walk folders and their sub-folders concurrently, one task per folder
//! - Attach the projects owned by every folder
//! - Assemble one tree per requested root folder, in request order
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use folder_tree::{Authenticator, ResourceManagerClient, TreeBuilder};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("service-account.json")?;
//!     let builder = TreeBuilder::new(Arc::new(ResourceManagerClient::new(auth)?));
//!
//!     let roots = vec!["123456789012".to_string()];
//!     let forest = builder.build_forest(&roots, &CancellationToken::new()).await?;
//!     println!("{}", serde_json::to_string_pretty(&forest)?);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod folder_id;
pub mod hierarchy;
pub mod models;

// Re-exports for convenience
pub use auth::Authenticator;
pub use builder::{StatsSnapshot, TreeBuilder};
pub use client::ResourceManagerClient;
pub use config::{ChildOrder, RetryPolicy, TraversalConfig};
pub use error::{ErrorKind, HierarchyError, Operation, Result};
pub use folder_id::{parse_folder_id, parse_folder_list};
pub use hierarchy::HierarchyClient;
pub use models::{FolderMeta, FolderNode, Page, Project};
