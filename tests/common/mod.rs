//! Shared in-memory collaborators for the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use ci_compose::context::{Context, Services};
use ci_compose::fetch::{
    Feature, FeatureFlags, InstanceSettings, RemoteFetch, RemoteResponse, RepositoryAccess,
    TemplateCatalog,
};
use ci_compose::processor::Processor;
use serde_yaml::Mapping;

/// Repository content addressed by (project, path); refs resolve through an
/// explicit table and fall back to the symbolic name itself.
#[derive(Default)]
pub struct InMemoryRepository {
    files: HashMap<(String, String), String>,
    refs: HashMap<(String, String), String>,
    restricted: Vec<String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, project: &str, path: &str, content: &str) {
        self.files
            .insert((project.to_string(), path.to_string()), content.to_string());
    }

    pub fn add_ref(&mut self, project: &str, reference: &str, sha: &str) {
        self.refs
            .insert((project.to_string(), reference.to_string()), sha.to_string());
    }

    /// Deny access to a project regardless of its content.
    pub fn restrict(&mut self, project: &str) {
        self.restricted.push(project.to_string());
    }
}

impl RepositoryAccess for InMemoryRepository {
    fn resolve_ref(&self, project: &str, reference: &str) -> Option<String> {
        if let Some(sha) = self.refs.get(&(project.to_string(), reference.to_string())) {
            return Some(sha.clone());
        }
        Some(reference.to_string())
    }

    fn file_content(&self, project: &str, _sha: &str, path: &str) -> Option<String> {
        self.files
            .get(&(project.to_string(), path.to_string()))
            .cloned()
    }

    fn accessible_by(&self, project: &str, _user: Option<&str>) -> bool {
        !self.restricted.iter().any(|p| p == project)
    }
}

/// Remote fetches answered from a prepared response table.
#[derive(Default)]
pub struct InMemoryRemote {
    responses: HashMap<String, Result<String, String>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&mut self, url: &str, body: &str) {
        self.responses
            .insert(url.to_string(), Ok(body.to_string()));
    }

    pub fn add_failure(&mut self, url: &str, message: &str) {
        self.responses
            .insert(url.to_string(), Err(message.to_string()));
    }
}

impl RemoteFetch for InMemoryRemote {
    fn fetch(&self, url: &str) -> RemoteResponse {
        let outcome = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(format!("Remote file `{url}` could not be fetched")));
        RemoteResponse::ready(url, outcome)
    }
}

/// Template catalog answered from a prepared table.
#[derive(Default)]
pub struct InMemoryTemplates {
    templates: HashMap<String, String>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&mut self, name: &str, content: &str) {
        self.templates
            .insert(name.to_string(), content.to_string());
    }
}

impl TemplateCatalog for InMemoryTemplates {
    fn template_content(&self, name: &str) -> Option<String> {
        self.templates.get(name).cloned()
    }
}

/// Feature flags with interpolation switched off.
pub struct InterpolationDisabled;

impl FeatureFlags for InterpolationDisabled {
    fn enabled(&self, feature: Feature, _project: Option<&str>) -> bool {
        !matches!(feature, Feature::FileInterpolation)
    }
}

/// Assemble the standard test context: project `group/app` at `deadbeef`,
/// acting user `dev`.
pub fn build_context(
    repository: InMemoryRepository,
    remote: InMemoryRemote,
    templates: InMemoryTemplates,
    settings: &InstanceSettings,
) -> Context {
    let services = Services::new(Arc::new(repository), Arc::new(remote), Arc::new(templates));
    Context::new(services, settings)
        .with_project("group/app", "deadbeef")
        .with_user("dev")
}

pub fn default_context(repository: InMemoryRepository) -> Context {
    build_context(
        repository,
        InMemoryRemote::new(),
        InMemoryTemplates::new(),
        &InstanceSettings::default(),
    )
}

pub fn mapping(yaml: &str) -> Mapping {
    serde_yaml::from_str(yaml).expect("test fixture should be valid YAML")
}

/// Run one resolution pass over inline values given as YAML.
pub fn compose(yaml: &str, context: Context) -> ci_compose::error::Result<Mapping> {
    Processor::new(mapping(yaml), context).perform()
}
