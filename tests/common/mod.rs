//! In-memory hierarchy used by the builder and forest tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use folder_tree::{
    ErrorKind, FolderMeta, FolderNode, HierarchyClient, HierarchyError, Operation, Page, Project,
};

#[derive(Default)]
struct FixtureFolder {
    name: String,
    children: Vec<String>,
    projects: Vec<Project>,
}

struct Failure {
    operation: Operation,
    kind: ErrorKind,
}

/// Fake hierarchy with per-folder delays, failures and call accounting.
#[derive(Default)]
pub struct FixtureClient {
    folders: HashMap<String, FixtureFolder>,
    page_size: usize,
    delays: HashMap<String, Duration>,
    jitter_seed: Option<u64>,
    failures: HashMap<String, Failure>,
    hangs: HashSet<String>,
    stuck_pagination: HashSet<String>,
    call_counter: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(Operation, String)>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FixtureClient {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            ..Self::default()
        }
    }

    pub fn folder(mut self, id: &str, name: &str, children: &[&str]) -> Self {
        let entry = self.folders.entry(id.to_string()).or_default();
        entry.name = name.to_string();
        entry
            .children
            .extend(children.iter().map(|c| c.to_string()));
        self
    }

    pub fn project(mut self, folder_id: &str, project_id: &str) -> Self {
        let mut project = Project::new(project_id, format!("Project {}", project_id));
        project.parent = format!("folders/{}", folder_id);
        self.folders
            .entry(folder_id.to_string())
            .or_default()
            .projects
            .push(project);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn delay(mut self, folder_id: &str, delay: Duration) -> Self {
        self.delays.insert(folder_id.to_string(), delay);
        self
    }

    /// Add a pseudo-random 0-4 ms delay to every call, varying per call.
    pub fn jitter(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn fail(mut self, folder_id: &str, operation: Operation, kind: ErrorKind) -> Self {
        self.failures
            .insert(folder_id.to_string(), Failure { operation, kind });
        self
    }

    /// Every call about this folder blocks forever.
    pub fn hang(mut self, folder_id: &str) -> Self {
        self.hangs.insert(folder_id.to_string());
        self
    }

    /// Child folder listing of this folder keeps returning the same token.
    pub fn stuck_pagination(mut self, folder_id: &str) -> Self {
        self.stuck_pagination.insert(folder_id.to_string());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, folder_id: &str, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, id)| *op == operation && id == folder_id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn enter(&self, folder_id: &str, operation: Operation) -> Result<InFlight<'_>, HierarchyError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation, folder_id.to_string()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if self.hangs.contains(folder_id) {
            std::future::pending::<()>().await;
        }

        let mut delay = self.delays.get(folder_id).copied().unwrap_or_default();
        if let Some(seed) = self.jitter_seed {
            let n = self.call_counter.fetch_add(1, Ordering::SeqCst);
            let mut hasher = DefaultHasher::new();
            (seed, n, folder_id).hash(&mut hasher);
            delay += Duration::from_millis(hasher.finish() % 5);
        }
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failures.get(folder_id) {
            if failure.operation == operation {
                return Err(error_of_kind(failure.kind, folder_id));
            }
        }
        Ok(guard)
    }

    fn lookup(&self, folder_id: &str) -> Result<&FixtureFolder, HierarchyError> {
        self.folders
            .get(folder_id)
            .ok_or_else(|| HierarchyError::NotFound(format!("folders/{}", folder_id)))
    }

    fn page<T: Clone>(&self, items: &[T], page_token: Option<&str>) -> Page<T> {
        let start: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let end = (start + self.page_size).min(items.len());
        Page {
            items: items[start..end].to_vec(),
            next_page_token: (end < items.len()).then(|| end.to_string()),
        }
    }
}

fn error_of_kind(kind: ErrorKind, folder_id: &str) -> HierarchyError {
    let message = format!("folders/{}", folder_id);
    match kind {
        ErrorKind::NotFound => HierarchyError::NotFound(message),
        ErrorKind::PermissionDenied => HierarchyError::PermissionDenied(message),
        ErrorKind::Transient => HierarchyError::Transient {
            status: 503,
            message,
        },
        ErrorKind::MalformedResponse => HierarchyError::MalformedResponse(message),
        ErrorKind::Cancelled => HierarchyError::Cancelled,
        ErrorKind::Other => HierarchyError::ApiError {
            status: 400,
            message,
        },
    }
}

#[async_trait]
impl HierarchyClient for FixtureClient {
    async fn get_folder(&self, folder_id: &str) -> Result<FolderMeta, HierarchyError> {
        let _guard = self.enter(folder_id, Operation::GetFolder).await?;
        let folder = self.lookup(folder_id)?;
        Ok(FolderMeta {
            id: folder_id.to_string(),
            name: folder.name.clone(),
        })
    }

    async fn list_child_folders(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, HierarchyError> {
        let _guard = self.enter(folder_id, Operation::ListFolders).await?;
        let folder = self.lookup(folder_id)?;
        if self.stuck_pagination.contains(folder_id) {
            return Ok(Page {
                items: folder.children.clone(),
                next_page_token: Some("stuck".to_string()),
            });
        }
        Ok(self.page(&folder.children, page_token))
    }

    async fn list_child_resources(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Project>, HierarchyError> {
        let _guard = self.enter(folder_id, Operation::ListProjects).await?;
        let folder = self.lookup(folder_id)?;
        Ok(self.page(&folder.projects, page_token))
    }
}

/// A{B{D[p1]}, C}
pub fn abcd() -> FixtureClient {
    FixtureClient::new()
        .folder("a", "A", &["b", "c"])
        .folder("b", "B", &["d"])
        .folder("c", "C", &[])
        .folder("d", "D", &[])
        .project("d", "p1")
}

/// Wider and deeper hierarchy: root `r` with three levels of fan-out and
/// projects sprinkled at every level.
pub fn wide() -> FixtureClient {
    let mut client = FixtureClient::new().folder("r", "Root", &["r1", "r2", "r3", "r4"]);
    for i in 1..=4 {
        let mid = format!("r{}", i);
        let kids: Vec<String> = (1..=3).map(|j| format!("{}-{}", mid, j)).collect();
        let kid_refs: Vec<&str> = kids.iter().map(String::as_str).collect();
        client = client
            .folder(&mid, &format!("Mid {}", i), &kid_refs)
            .project(&mid, &format!("proj-{}", mid));
        for kid in &kids {
            client = client
                .folder(kid, &format!("Leaf {}", kid), &[])
                .project(kid, &format!("proj-{}-a", kid))
                .project(kid, &format!("proj-{}-b", kid));
        }
    }
    client.project("r", "proj-root")
}

/// Order-insensitive rendering of a tree: every level sorted by id.
pub fn canonical(node: &FolderNode) -> String {
    fn render(node: &FolderNode, out: &mut String) {
        out.push_str(&format!("{}:{}[", node.id, node.name));
        let mut projects: Vec<&str> = node.resources.iter().map(|p| p.project_id.as_str()).collect();
        projects.sort_unstable();
        out.push_str(&projects.join(","));
        out.push_str("]{");
        let mut children: Vec<&FolderNode> = node.children.iter().collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        for child in children {
            render(child, out);
        }
        out.push('}');
    }

    let mut out = String::new();
    render(node, &mut out);
    out
}
