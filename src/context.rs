//! # Execution Context
//!
//! State carried across one whole resolution pass, split in two per the
//! shared-session design:
//!
//! - **`ResolutionSession`**: the state that must be *identity-shared* by
//!   every recursive branch of the include tree — the expansion set (cycle
//!   and budget guard), the monotonic deadline, the bounded pool of
//!   in-flight remote fetches, and the running fetched-byte total. One
//!   session exists per top-level resolution and is handed to derived
//!   contexts by `Arc`.
//!
//! - **`Context`**: the per-branch view — project, sha, user, variables —
//!   which is value-copied on [`Context::mutate`] while the session and the
//!   collaborator services stay shared. This is how a nested include
//!   inherits the budget and dedup state of its parent resolution.
//!
//! The duplicate/budget guard lives here because its ledger is the
//! session's expansion set: the capacity check runs *before* the membership
//! check, so the entry that lands on a full set reports "too many includes"
//! even when it is also a duplicate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::fetch::{
    ContentCache, DefaultFeatureFlags, FeatureFlags, RemoteFetch, RemoteResponse,
    RepositoryAccess, Settings, TemplateCatalog,
};
use crate::location::IncludeSpec;
use crate::variables::Variables;

/// Upper bound on overlapping remote fetches.
pub const MAX_PARALLEL_REMOTE_REQUESTS: usize = 4;

/// One entry of the expansion set: an include location scoped by the
/// context it was included from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandKey {
    pub location: String,
    pub project: Option<String>,
    pub sha: Option<String>,
}

/// Shared mutable state of one top-level resolution.
pub struct ResolutionSession {
    expandset: Mutex<HashSet<ExpandKey>>,
    deadline: Mutex<Option<Instant>>,
    in_flight: Mutex<Vec<RemoteResponse>>,
    fetched_bytes: AtomicUsize,
    max_includes: usize,
    max_total_yaml_size_bytes: usize,
}

impl ResolutionSession {
    pub fn new(settings: &dyn Settings) -> Self {
        Self {
            expandset: Mutex::new(HashSet::new()),
            deadline: Mutex::new(None),
            in_flight: Mutex::new(Vec::new()),
            fetched_bytes: AtomicUsize::new(0),
            max_includes: settings.max_includes(),
            max_total_yaml_size_bytes: settings.max_total_yaml_size_bytes(),
        }
    }

    /// Establish an absolute deadline `timeout` from now. `None` clears it.
    pub fn set_deadline(&self, timeout: Option<Duration>) -> Result<()> {
        let mut deadline = self.lock_deadline()?;
        *deadline = timeout.map(|t| Instant::now() + t);
        Ok(())
    }

    /// Fail with [`Error::Timeout`] once the deadline has elapsed. A no-op
    /// when no deadline was ever set.
    pub fn check_execution_time(&self) -> Result<()> {
        let deadline = self.lock_deadline()?;
        match *deadline {
            Some(at) if Instant::now() > at => Err(Error::Timeout),
            _ => Ok(()),
        }
    }

    /// Budget check, then membership check, then insert.
    pub fn verify_duplicates(&self, key: ExpandKey) -> Result<()> {
        let mut expandset = self.expandset.lock().map_err(|_| Error::LockPoisoned {
            context: "expansion set".to_string(),
        })?;
        if expandset.len() >= self.max_includes {
            return Err(Error::TooManyIncludes {
                max: self.max_includes,
            });
        }
        let location = key.location.clone();
        if !expandset.insert(key) {
            return Err(Error::DuplicateInclude { location });
        }
        Ok(())
    }

    /// Admit a remote request into the bounded pool.
    ///
    /// Completed requests are pruned first; when the pool is still at
    /// capacity the oldest in-flight request is awaited before the new one
    /// is started. A FIFO-ish throttle, not a precise scheduler.
    pub fn execute_remote_parallel_request(&self, response: RemoteResponse) -> Result<()> {
        let mut pool = self.lock_pool()?;

        let mut pending = Vec::with_capacity(pool.len());
        for request in pool.drain(..) {
            if !request.finished()? {
                pending.push(request);
            }
        }
        *pool = pending;

        if pool.len() >= MAX_PARALLEL_REMOTE_REQUESTS {
            let oldest = pool.remove(0);
            log::debug!("remote fetch pool saturated, waiting on `{}`", oldest.url());
            // The fetch outcome itself belongs to the file that issued the
            // request; only lock failures propagate from here.
            let _ = oldest.wait()?;
        }

        response.start()?;
        pool.push(response);
        Ok(())
    }

    /// Record fetched content size against the total-size budget.
    pub fn add_fetched_bytes(&self, bytes: usize) -> Result<()> {
        let total = self.fetched_bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if total > self.max_total_yaml_size_bytes {
            return Err(Error::TotalSizeExceeded {
                max_bytes: self.max_total_yaml_size_bytes,
            });
        }
        Ok(())
    }

    pub fn fetched_bytes(&self) -> usize {
        self.fetched_bytes.load(Ordering::SeqCst)
    }

    pub fn includes_count(&self) -> Result<usize> {
        let expandset = self.expandset.lock().map_err(|_| Error::LockPoisoned {
            context: "expansion set".to_string(),
        })?;
        Ok(expandset.len())
    }

    pub fn in_flight_len(&self) -> Result<usize> {
        Ok(self.lock_pool()?.len())
    }

    fn lock_deadline(&self) -> Result<std::sync::MutexGuard<'_, Option<Instant>>> {
        self.deadline.lock().map_err(|_| Error::LockPoisoned {
            context: "execution deadline".to_string(),
        })
    }

    fn lock_pool(&self) -> Result<std::sync::MutexGuard<'_, Vec<RemoteResponse>>> {
        self.in_flight.lock().map_err(|_| Error::LockPoisoned {
            context: "remote request pool".to_string(),
        })
    }
}

/// The collaborator services a resolution runs against.
#[derive(Clone)]
pub struct Services {
    pub repository: Arc<dyn RepositoryAccess>,
    pub remote: Arc<dyn RemoteFetch>,
    pub templates: Arc<dyn TemplateCatalog>,
    pub features: Arc<dyn FeatureFlags>,
    pub content_cache: ContentCache,
}

impl Services {
    pub fn new(
        repository: Arc<dyn RepositoryAccess>,
        remote: Arc<dyn RemoteFetch>,
        templates: Arc<dyn TemplateCatalog>,
    ) -> Self {
        Self {
            repository,
            remote,
            templates,
            features: Arc::new(DefaultFeatureFlags),
            content_cache: ContentCache::new(),
        }
    }

    pub fn with_features(mut self, features: Arc<dyn FeatureFlags>) -> Self {
        self.features = features;
        self
    }
}

/// Replacement view attributes for a derived context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandAttrs {
    pub project: Option<String>,
    pub sha: Option<String>,
}

/// The per-branch view of one resolution pass.
#[derive(Clone)]
pub struct Context {
    pub project: Option<String>,
    pub sha: Option<String>,
    pub user: Option<String>,
    pub variables: Variables,
    pub parent_pipeline: Option<u64>,
    session: Arc<ResolutionSession>,
    services: Services,
}

impl Context {
    pub fn new(services: Services, settings: &dyn Settings) -> Self {
        Self {
            project: None,
            sha: None,
            user: None,
            variables: Variables::new(),
            parent_pipeline: None,
            session: Arc::new(ResolutionSession::new(settings)),
            services,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>, sha: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self.sha = Some(sha.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_parent_pipeline(mut self, pipeline: u64) -> Self {
        self.parent_pipeline = Some(pipeline);
        self
    }

    /// Derive a sibling context with a different project/sha view.
    ///
    /// The session (expansion set, deadline, remote pool, byte budget), the
    /// services, the user, and the variables stay shared.
    pub fn mutate(&self, attrs: ExpandAttrs) -> Context {
        Context {
            project: attrs.project,
            sha: attrs.sha,
            ..self.clone()
        }
    }

    /// Guard one include against the session's duplicate and budget limits.
    pub fn verify_duplicates(&self, spec: &IncludeSpec) -> Result<()> {
        self.session.verify_duplicates(ExpandKey {
            location: spec.expand_key_string(),
            project: self.project.clone(),
            sha: self.sha.clone(),
        })
    }

    pub fn set_deadline(&self, timeout: Option<Duration>) -> Result<()> {
        self.session.set_deadline(timeout)
    }

    pub fn check_execution_time(&self) -> Result<()> {
        self.session.check_execution_time()
    }

    pub fn execute_remote_parallel_request(&self, response: RemoteResponse) -> Result<()> {
        self.session.execute_remote_parallel_request(response)
    }

    pub fn add_fetched_bytes(&self, bytes: usize) -> Result<()> {
        self.session.add_fetched_bytes(bytes)
    }

    pub fn session(&self) -> &Arc<ResolutionSession> {
        &self.session
    }

    pub fn repository(&self) -> &dyn RepositoryAccess {
        self.services.repository.as_ref()
    }

    pub fn remote(&self) -> &dyn RemoteFetch {
        self.services.remote.as_ref()
    }

    pub fn templates(&self) -> &dyn TemplateCatalog {
        self.services.templates.as_ref()
    }

    pub fn features(&self) -> &dyn FeatureFlags {
        self.services.features.as_ref()
    }

    pub fn content_cache(&self) -> &ContentCache {
        &self.services.content_cache
    }
}
