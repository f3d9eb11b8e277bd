//! Concurrent construction of folder trees.
//!
//! Every folder is expanded by its own tokio task: the task fetches the
//! folder's metadata, drains the child folder listing, spawns one task per
//! child, waits for all of them, then drains the project listing and returns
//! the finished [`FolderNode`]. A node is never visible to its parent before
//! it is complete.
//!
//! All tasks of one run share a [`CancellationToken`]. The first real failure
//! cancels it and sibling branches stop at their next adapter call. Errors
//! from branches stopped this way are `Cancelled` and never mask the first
//! failure.
//!
//! The traversal assumes the hierarchy is a finite tree. A listing that
//! reports a folder as its own descendant would recurse forever.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ChildOrder, TraversalConfig};
use crate::error::{HierarchyError, Operation, Result};
use crate::hierarchy::HierarchyClient;
use crate::models::{FolderNode, Page};

/// Counters collected across a builder's runs.
#[derive(Debug, Default)]
pub struct TraversalStats {
    folders: AtomicU64,
    projects: AtomicU64,
    api_calls: AtomicU64,
}

/// Point-in-time copy of [`TraversalStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub folders: u64,
    pub projects: u64,
    pub api_calls: u64,
}

impl StatsSnapshot {
    /// Counts accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            folders: self.folders.saturating_sub(earlier.folders),
            projects: self.projects.saturating_sub(earlier.projects),
            api_calls: self.api_calls.saturating_sub(earlier.api_calls),
        }
    }
}

impl TraversalStats {
    fn record_folder(&self, projects: usize) {
        self.folders.fetch_add(1, Ordering::Relaxed);
        self.projects.fetch_add(projects as u64, Ordering::Relaxed);
    }

    fn record_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            folders: self.folders.load(Ordering::Relaxed),
            projects: self.projects.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    client: Arc<dyn HierarchyClient>,
    limiter: Option<Semaphore>,
    order: ChildOrder,
    stats: TraversalStats,
}

/// Builds folder trees and forests from a [`HierarchyClient`].
///
/// Cloning is cheap; clones share the client, the concurrency ceiling and the
/// statistics.
#[derive(Clone)]
pub struct TreeBuilder {
    shared: Arc<Shared>,
}

impl TreeBuilder {
    /// Create a builder with an unbounded fan-out and listing order.
    pub fn new(client: Arc<dyn HierarchyClient>) -> Self {
        Self::from_parts(client, None, ChildOrder::default())
    }

    /// Create a builder from a validated configuration.
    pub fn with_config(
        client: Arc<dyn HierarchyClient>,
        config: &TraversalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(
            client,
            config.max_concurrency,
            config.child_order,
        ))
    }

    fn from_parts(
        client: Arc<dyn HierarchyClient>,
        max_concurrency: Option<usize>,
        order: ChildOrder,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                limiter: max_concurrency.map(Semaphore::new),
                order,
                stats: TraversalStats::default(),
            }),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Build the complete subtree rooted at `folder_id`.
    ///
    /// Cancelling `cancel` stops the run with [`HierarchyError::Cancelled`]. A
    /// failure inside the run cancels only the run's own child token.
    pub async fn build(&self, folder_id: &str, cancel: &CancellationToken) -> Result<FolderNode> {
        let run = cancel.child_token();
        expand(Arc::clone(&self.shared), folder_id.to_string(), run).await
    }

    /// Build one tree per root id, concurrently.
    ///
    /// The forest is aligned with `root_ids`. Any failure fails the whole
    /// forest and cancels the remaining roots.
    pub async fn build_forest(
        &self,
        root_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<FolderNode>> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }

        info!(roots = root_ids.len(), "Building folder forest");
        let before = self.stats();
        let run = cancel.child_token();
        let mut tasks = JoinSet::new();
        for (index, root_id) in root_ids.iter().enumerate() {
            let task = spawn_subtree(Arc::clone(&self.shared), root_id.clone(), run.clone());
            tasks.spawn(async move { (index, task.await) });
        }

        let forest = join_in_order(tasks, root_ids.len(), &run).await?;
        // Other runs sharing this builder may overlap and be counted too.
        let stats = self.stats().since(&before);
        info!(
            roots = forest.len(),
            folders = stats.folders,
            projects = stats.projects,
            api_calls = stats.api_calls,
            "Folder forest complete"
        );
        Ok(forest)
    }
}

/// Boxed so that `expand` can spawn itself recursively.
fn spawn_subtree(
    shared: Arc<Shared>,
    folder_id: String,
    cancel: CancellationToken,
) -> BoxFuture<'static, Result<FolderNode>> {
    expand(shared, folder_id, cancel).boxed()
}

async fn expand(
    shared: Arc<Shared>,
    folder_id: String,
    cancel: CancellationToken,
) -> Result<FolderNode> {
    let client = &shared.client;
    let id = folder_id.as_str();

    let meta = call(
        &shared,
        id,
        Operation::GetFolder,
        &cancel,
        client.get_folder(id),
    )
    .await?;
    if meta.id != folder_id {
        let err = HierarchyError::MalformedResponse(format!(
            "requested folders/{} but received folders/{}",
            folder_id, meta.id
        ))
        .in_folder(id, Operation::GetFolder);
        cancel.cancel();
        return Err(err);
    }

    let listed = drain_pages(
        &shared,
        id,
        Operation::ListFolders,
        &cancel,
        move |token| async move { client.list_child_folders(id, token.as_deref()).await },
    )
    .await?;
    let child_ids = dedup_children(id, listed);
    debug!(folder_id = id, children = child_ids.len(), "Expanding folder");

    let mut tasks = JoinSet::new();
    for (index, child_id) in child_ids.into_iter().enumerate() {
        let task = spawn_subtree(Arc::clone(&shared), child_id, cancel.clone());
        tasks.spawn(async move { (index, task.await) });
    }
    let child_count = tasks.len();
    let mut children = join_in_order(tasks, child_count, &cancel).await?;

    let mut resources = drain_pages(
        &shared,
        id,
        Operation::ListProjects,
        &cancel,
        move |token| async move { client.list_child_resources(id, token.as_deref()).await },
    )
    .await?;

    if shared.order == ChildOrder::ById {
        children.sort_by(|a, b| a.id.cmp(&b.id));
        resources.sort_by(|a, b| a.project_id.cmp(&b.project_id));
    }
    shared.stats.record_folder(resources.len());

    Ok(FolderNode {
        name: meta.name,
        id: folder_id,
        children,
        resources,
    })
}

/// Run one adapter call under the concurrency ceiling, racing cancellation.
///
/// A failure is tagged with the folder and operation and cancels the run.
async fn call<T>(
    shared: &Shared,
    folder_id: &str,
    operation: Operation,
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HierarchyError::Cancelled),
        result = limited(shared, request) => result,
    };

    result.map_err(|err| {
        let err = err.in_folder(folder_id, operation);
        if !err.is_cancelled() {
            warn!(
                folder_id,
                %operation,
                error = %err,
                "Adapter call failed, cancelling traversal"
            );
            cancel.cancel();
        }
        err
    })
}

/// Permits are held for a single call only, never across a child join.
async fn limited<T>(shared: &Shared, request: impl Future<Output = Result<T>>) -> Result<T> {
    let _permit = match &shared.limiter {
        Some(limiter) => Some(
            limiter
                .acquire()
                .await
                .map_err(|_| HierarchyError::Cancelled)?,
        ),
        None => None,
    };
    shared.stats.record_call();
    request.await
}

/// Fetch pages until the listing is exhausted.
async fn drain_pages<T, F, Fut>(
    shared: &Shared,
    folder_id: &str,
    operation: Operation,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let request = fetch(page_token.clone());
        let page = call(shared, folder_id, operation, cancel, request).await?;
        items.extend(page.items);

        match page.next_page_token {
            Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                let err = HierarchyError::MalformedResponse(format!(
                    "page token {:?} was returned twice",
                    next
                ))
                .in_folder(folder_id, operation);
                cancel.cancel();
                return Err(err);
            }
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    Ok(items)
}

/// Drop repeated child ids, keeping the first occurrence.
fn dedup_children(folder_id: &str, listed: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(listed.len());
    listed
        .into_iter()
        .filter(|child_id| {
            let first = seen.insert(child_id.clone());
            if !first {
                warn!(folder_id, child_id = %child_id, "Dropping duplicate child folder");
            }
            first
        })
        .collect()
}

/// Wait for every task and return the results ordered by their index.
///
/// The first real error cancels the run, aborts the remaining tasks and is
/// returned. `Cancelled` results are only reported once no real error shows up.
async fn join_in_order<T: 'static>(
    mut tasks: JoinSet<(usize, Result<T>)>,
    len: usize,
    cancel: &CancellationToken,
) -> Result<Vec<T>> {
    let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
    let mut cancelled = None;

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(HierarchyError::from)
            .and_then(|(index, result)| result.map(|value| (index, value)));

        match outcome {
            Ok((index, value)) => slots[index] = Some(value),
            Err(err) if err.is_cancelled() => {
                cancelled.get_or_insert(err);
            }
            Err(err) => {
                cancel.cancel();
                tasks.abort_all();
                return Err(err);
            }
        }
    }

    if let Some(err) = cancelled {
        return Err(err);
    }
    Ok(slots.into_iter().flatten().collect())
}
