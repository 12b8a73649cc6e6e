//! # Collaborator Services
//!
//! This module defines the seams between the resolution pipeline and the
//! host application. The pipeline itself never talks to a repository, the
//! network, or a template store directly; it goes through these traits:
//!
//! - **`RepositoryAccess`**: content of files inside a project at a commit.
//! - **`RemoteFetch`**: HTTP retrieval of remote includes, returning a
//!   promise-like [`RemoteResponse`] so the execution context can bound the
//!   number of in-flight requests.
//! - **`TemplateCatalog`**: bundled template lookup by name.
//! - **`FeatureFlags`** and **`Settings`**: per-project gates and
//!   instance-wide limits.
//!
//! This design allows the underlying implementations to be swapped out,
//! which is particularly useful for testing. The defaults here are a
//! `ureq`-backed HTTP fetcher and directory-backed repository/template
//! stores used by the CLI; tests replace them with in-memory mocks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{Error, Result};

/// Body text on success, a human-readable message on failure.
pub type FetchOutcome = std::result::Result<String, String>;

enum Task {
    Idle(Box<dyn FnOnce() -> FetchOutcome + Send>),
    Running(JoinHandle<FetchOutcome>),
    Done,
}

struct ResponseInner {
    url: String,
    task: Mutex<Task>,
    outcome: Mutex<Option<FetchOutcome>>,
}

/// A promise-like handle for one remote fetch.
///
/// The request does not run until [`start`](RemoteResponse::start) is called,
/// so the execution context's bounded pool can decide when to admit it.
/// [`wait`](RemoteResponse::wait) blocks until the outcome is available and
/// caches it; waiting on a never-admitted response runs the request inline.
#[derive(Clone)]
pub struct RemoteResponse {
    inner: Arc<ResponseInner>,
}

impl RemoteResponse {
    pub fn new<F>(url: impl Into<String>, fetch: F) -> Self
    where
        F: FnOnce() -> FetchOutcome + Send + 'static,
    {
        Self {
            inner: Arc::new(ResponseInner {
                url: url.into(),
                task: Mutex::new(Task::Idle(Box::new(fetch))),
                outcome: Mutex::new(None),
            }),
        }
    }

    /// A response that is already complete. Used by tests and by fetchers
    /// that fail before issuing any request.
    pub fn ready(url: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self {
            inner: Arc::new(ResponseInner {
                url: url.into(),
                task: Mutex::new(Task::Done),
                outcome: Mutex::new(Some(outcome)),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Begin executing the request on a worker thread. A no-op if the
    /// request was already started or finished.
    pub fn start(&self) -> Result<()> {
        let mut task = self.lock_task()?;
        if matches!(*task, Task::Idle(_)) {
            if let Task::Idle(fetch) = std::mem::replace(&mut *task, Task::Done) {
                *task = Task::Running(std::thread::spawn(fetch));
            }
        }
        Ok(())
    }

    /// Whether the outcome is available without blocking.
    pub fn finished(&self) -> Result<bool> {
        let task = self.lock_task()?;
        Ok(match &*task {
            Task::Idle(_) => false,
            Task::Running(handle) => handle.is_finished(),
            Task::Done => true,
        })
    }

    /// Block until the outcome is available, caching it for later callers.
    pub fn wait(&self) -> Result<FetchOutcome> {
        {
            let outcome = self.lock_outcome()?;
            if let Some(cached) = outcome.as_ref() {
                return Ok(cached.clone());
            }
        }

        let resolved = {
            let mut task = self.lock_task()?;
            match std::mem::replace(&mut *task, Task::Done) {
                Task::Idle(fetch) => fetch(),
                Task::Running(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err("remote fetch worker panicked".to_string())),
                Task::Done => {
                    // Another handle consumed the task but has not stored
                    // the outcome yet; unreachable in the single-driver model
                    Err(format!(
                        "Remote file `{}` fetch state was lost",
                        self.inner.url
                    ))
                }
            }
        };

        let mut outcome = self.lock_outcome()?;
        let stored = outcome.get_or_insert(resolved);
        Ok(stored.clone())
    }

    fn lock_task(&self) -> Result<std::sync::MutexGuard<'_, Task>> {
        self.inner.task.lock().map_err(|_| Error::LockPoisoned {
            context: "remote response task".to_string(),
        })
    }

    fn lock_outcome(&self) -> Result<std::sync::MutexGuard<'_, Option<FetchOutcome>>> {
        self.inner.outcome.lock().map_err(|_| Error::LockPoisoned {
            context: "remote response outcome".to_string(),
        })
    }
}

impl std::fmt::Debug for RemoteResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResponse")
            .field("url", &self.inner.url)
            .finish_non_exhaustive()
    }
}

/// Trait for reading project repository content - allows mocking in tests
pub trait RepositoryAccess: Send + Sync {
    /// Resolve a symbolic reference (branch, tag) to a commit sha.
    fn resolve_ref(&self, project: &str, reference: &str) -> Option<String>;

    /// Read a file's content at a commit. `None` when the file does not
    /// exist at that commit.
    fn file_content(&self, project: &str, sha: &str, path: &str) -> Option<String>;

    /// Whether the acting user may read the project at all.
    fn accessible_by(&self, project: &str, user: Option<&str>) -> bool {
        let _ = (project, user);
        true
    }
}

/// Trait for fetching remote include content over HTTP.
pub trait RemoteFetch: Send + Sync {
    /// Produce a not-yet-started response handle for `url`.
    fn fetch(&self, url: &str) -> RemoteResponse;
}

/// Trait for resolving named templates shipped with the instance.
pub trait TemplateCatalog: Send + Sync {
    fn template_content(&self, name: &str) -> Option<String>;
}

/// Features that gate optional pipeline behavior per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Interpolation of parameterized include files.
    FileInterpolation,
}

pub trait FeatureFlags: Send + Sync {
    fn enabled(&self, feature: Feature, project: Option<&str>) -> bool;
}

/// Default feature flags: everything enabled.
pub struct DefaultFeatureFlags;

impl FeatureFlags for DefaultFeatureFlags {
    fn enabled(&self, _feature: Feature, _project: Option<&str>) -> bool {
        true
    }
}

/// Instance-wide limits consumed by the execution context.
pub trait Settings: Send + Sync {
    /// Maximum number of includes in one resolution pass.
    fn max_includes(&self) -> usize;

    /// Ceiling on the combined byte size of all fetched files.
    fn max_total_yaml_size_bytes(&self) -> usize;
}

/// Plain-struct settings with the instance defaults.
#[derive(Debug, Clone)]
pub struct InstanceSettings {
    pub max_includes: usize,
    pub max_total_yaml_size_bytes: usize,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            max_includes: 50,
            max_total_yaml_size_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Settings for InstanceSettings {
    fn max_includes(&self) -> usize {
        self.max_includes
    }

    fn max_total_yaml_size_bytes(&self) -> usize {
        self.max_total_yaml_size_bytes
    }
}

/// The default `RemoteFetch` implementation, backed by `ureq`.
///
/// Each admitted request runs on its own worker thread; the bounded pool in
/// the execution context keeps at most four of them in flight.
pub struct HttpRemoteFetch {
    timeout: Duration,
}

impl HttpRemoteFetch {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpRemoteFetch {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl RemoteFetch for HttpRemoteFetch {
    fn fetch(&self, url: &str) -> RemoteResponse {
        let target = url.to_string();
        let timeout = self.timeout;
        RemoteResponse::new(url, move || {
            let config = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build();
            let agent: ureq::Agent = config.into();
            match agent.get(&target).call() {
                Ok(mut response) => response.body_mut().read_to_string().map_err(|source| {
                    format!("Remote file `{target}` could not be read: {source}")
                }),
                Err(source) => Err(format!(
                    "Remote file `{target}` could not be fetched: {source}"
                )),
            }
        })
    }
}

/// Directory-backed `RepositoryAccess` used by the CLI.
///
/// The current project maps to `root`; any other project path maps to a
/// subdirectory of `projects_root`. References pass through unresolved, as
/// directories carry no commit history.
pub struct DirRepository {
    root: PathBuf,
    projects_root: Option<PathBuf>,
}

impl DirRepository {
    /// Project name under which `root` itself is addressed.
    pub const CURRENT_PROJECT: &'static str = ".";

    pub fn new(root: impl Into<PathBuf>, projects_root: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            projects_root,
        }
    }

    fn project_dir(&self, project: &str) -> Option<PathBuf> {
        if project == Self::CURRENT_PROJECT {
            return Some(self.root.clone());
        }
        let projects_root = self.projects_root.as_ref()?;
        if !safe_relative_path(project) {
            return None;
        }
        Some(projects_root.join(project))
    }
}

impl RepositoryAccess for DirRepository {
    fn resolve_ref(&self, project: &str, reference: &str) -> Option<String> {
        self.project_dir(project)
            .filter(|dir| dir.is_dir())
            .map(|_| reference.to_string())
    }

    fn file_content(&self, project: &str, _sha: &str, path: &str) -> Option<String> {
        let dir = self.project_dir(project)?;
        let relative = path.trim_start_matches('/');
        if !safe_relative_path(relative) {
            return None;
        }
        std::fs::read_to_string(dir.join(relative)).ok()
    }

    fn accessible_by(&self, project: &str, _user: Option<&str>) -> bool {
        self.project_dir(project)
            .map(|dir| dir.is_dir())
            .unwrap_or(false)
    }
}

/// Directory-backed `TemplateCatalog` used by the CLI.
pub struct DirTemplates {
    root: PathBuf,
}

impl DirTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateCatalog for DirTemplates {
    fn template_content(&self, name: &str) -> Option<String> {
        if !safe_relative_path(name) {
            return None;
        }
        std::fs::read_to_string(self.root.join(name)).ok()
    }
}

/// An empty catalog for hosts without bundled templates.
pub struct NoTemplates;

impl TemplateCatalog for NoTemplates {
    fn template_content(&self, _name: &str) -> Option<String> {
        None
    }
}

fn safe_relative_path(path: &str) -> bool {
    !Path::new(path)
        .components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
}

/// Cache key for one repository file read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub project: String,
    pub sha: String,
    pub path: String,
}

/// In-process cache for repository file reads.
///
/// Scoped to one resolution session; nested contexts share it by reference,
/// so a file referenced from several branches of the include tree is read
/// once.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    cache: Arc<Mutex<HashMap<ContentKey, Option<String>>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached read, or perform and cache it if not present.
    pub fn get_or_fetch<F>(&self, key: ContentKey, fetch: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Option<String>,
    {
        {
            let cache = self.cache.lock().map_err(|_| Error::LockPoisoned {
                context: "content cache".to_string(),
            })?;
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let content = fetch();

        let mut cache = self.cache.lock().map_err(|_| Error::LockPoisoned {
            context: "content cache".to_string(),
        })?;
        cache.insert(key, content.clone());
        Ok(content)
    }

    pub fn len(&self) -> Result<usize> {
        let cache = self.cache.lock().map_err(|_| Error::LockPoisoned {
            context: "content cache".to_string(),
        })?;
        Ok(cache.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
