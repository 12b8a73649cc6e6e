//! # File Resolution
//!
//! Turns a normalized [`IncludeSpec`] into a [`ResolvedFile`] with fetched
//! content. The location kind is decided once, by [`classify`], into a
//! closed [`Location`] enum — exactly one of the spec's location fields
//! must be populated — and a single match then dispatches to the right
//! accessor:
//!
//! - **Local**: the current project's repository at the current sha.
//! - **Project**: another project's repository at a resolved ref.
//! - **Template**: the instance's template catalog.
//! - **Remote**: an HTTP fetch admitted through the context's bounded
//!   parallel-request pool; the content is collected later by
//!   [`ResolvedFile::fetch_content`].
//!
//! Availability problems (missing file, bad ref, failed fetch) are recorded
//! on the file and surfaced by the processor as a file error; only
//! structural problems fail resolution outright.

use serde_yaml::Mapping;
use url::Url;

use crate::context::{Context, ExpandAttrs};
use crate::error::{Error, Result};
use crate::fetch::{ContentKey, Feature, RemoteResponse};
use crate::interpolation::Interpolator;
use crate::location::IncludeSpec;

/// A fully classified include location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote {
        url: String,
    },
    Local {
        path: String,
    },
    Template {
        name: String,
    },
    Project {
        project: String,
        file: String,
        reference: Option<String>,
    },
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Remote { url } => write!(f, "{url}"),
            Location::Local { path } => write!(f, "{path}"),
            Location::Template { name } => write!(f, "{name}"),
            Location::Project { project, file, .. } => write!(f, "{file} in {project}"),
        }
    }
}

/// Decide the single location kind of a spec.
pub fn classify(spec: &IncludeSpec) -> Result<Location> {
    let populated = [
        spec.remote.is_some(),
        spec.local.is_some(),
        spec.template.is_some(),
        spec.project.is_some(),
    ]
    .iter()
    .filter(|&&p| p)
    .count();

    if populated != 1 {
        return Err(Error::AmbiguousSpecification {
            location: spec.to_string(),
        });
    }

    if let Some(url) = &spec.remote {
        return Ok(Location::Remote { url: url.clone() });
    }
    if let Some(path) = &spec.local {
        return Ok(Location::Local { path: path.clone() });
    }
    if let Some(name) = &spec.template {
        return Ok(Location::Template { name: name.clone() });
    }
    // Only the project field remains populated here
    let project = spec.project.clone().unwrap_or_default();
    match &spec.file {
        Some(file) => Ok(Location::Project {
            project,
            file: file.clone(),
            reference: spec.r#ref.clone(),
        }),
        None => Err(Error::File {
            message: format!("Project include `{project}` must specify the file attribute"),
        }),
    }
}

/// The result of resolving one include location.
#[derive(Debug)]
pub struct ResolvedFile {
    location: Location,
    spec: IncludeSpec,
    content: Option<String>,
    pending: Option<RemoteResponse>,
    error: Option<String>,
    expand_attrs: ExpandAttrs,
}

impl ResolvedFile {
    /// Classify and fetch one include.
    ///
    /// Remote fetches are only *issued* here (through the bounded pool);
    /// their content is collected by [`fetch_content`](Self::fetch_content).
    pub fn resolve(spec: IncludeSpec, context: &Context) -> Result<Self> {
        let location = classify(&spec)?;
        let mut content = None;
        let mut pending = None;
        let mut error = None;
        let mut expand_attrs = ExpandAttrs {
            project: context.project.clone(),
            sha: context.sha.clone(),
        };

        match &location {
            Location::Local { path } => match (&context.project, &context.sha) {
                (Some(project), Some(sha)) => {
                    let cache_key = ContentKey {
                        project: project.clone(),
                        sha: sha.clone(),
                        path: path.clone(),
                    };
                    content = context.content_cache().get_or_fetch(cache_key, || {
                        context.repository().file_content(project, sha, path)
                    })?;
                    if content.is_none() {
                        error = Some(format!("Local file `{path}` does not exist"));
                    }
                }
                _ => {
                    error = Some(format!(
                        "Local file `{path}` could not be resolved outside of a project context"
                    ));
                }
            },
            Location::Template { name } => {
                content = context.templates().template_content(name);
                if content.is_none() {
                    error = Some(format!("Template file `{name}` is not a valid template name"));
                }
            }
            Location::Project {
                project,
                file,
                reference,
            } => {
                expand_attrs = ExpandAttrs::default();
                let reference = reference.as_deref().unwrap_or("HEAD");
                if !context
                    .repository()
                    .accessible_by(project, context.user.as_deref())
                {
                    error = Some(format!("Project `{project}` not found or access denied"));
                } else {
                    match context.repository().resolve_ref(project, reference) {
                        None => {
                            error = Some(format!(
                                "Project `{project}` reference `{reference}` could not be found"
                            ));
                        }
                        Some(sha) => {
                            let cache_key = ContentKey {
                                project: project.clone(),
                                sha: sha.clone(),
                                path: file.clone(),
                            };
                            content = context.content_cache().get_or_fetch(cache_key, || {
                                context.repository().file_content(project, &sha, file)
                            })?;
                            if content.is_none() {
                                error = Some(format!(
                                    "File `{file}` could not be found in project `{project}` at `{reference}`"
                                ));
                            }
                            expand_attrs = ExpandAttrs {
                                project: Some(project.clone()),
                                sha: Some(sha),
                            };
                        }
                    }
                }
            }
            Location::Remote { url } => {
                expand_attrs = ExpandAttrs::default();
                if !is_fetchable_url(url) {
                    error = Some(format!("Remote file `{url}` does not have a valid address"));
                } else {
                    let response = context.remote().fetch(url);
                    context.execute_remote_parallel_request(response.clone())?;
                    pending = Some(response);
                }
            }
        }

        if let Some(body) = &content {
            context.add_fetched_bytes(body.len())?;
        }

        log::debug!("resolved include `{location}`");

        Ok(Self {
            location,
            spec,
            content,
            pending,
            error,
            expand_attrs,
        })
    }

    /// Collect deferred remote content and run final validity checks.
    pub fn fetch_content(&mut self, context: &Context) -> Result<()> {
        if let Some(response) = self.pending.take() {
            match response.wait()? {
                Ok(body) => {
                    context.add_fetched_bytes(body.len())?;
                    self.content = Some(body);
                }
                Err(message) => self.error = Some(message),
            }
        }

        if self.error.is_none() {
            let blank = self
                .content
                .as_deref()
                .map(|body| body.trim().is_empty())
                .unwrap_or(true);
            if blank {
                self.error = Some(format!("Included file `{}` is empty", self.location));
            }
        }
        Ok(())
    }

    pub fn valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("Included file `{}` could not be resolved", self.location))
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Context view the file's own nested includes resolve under.
    pub fn expand_attrs(&self) -> ExpandAttrs {
        self.expand_attrs.clone()
    }

    /// Interpolate (when parameterized) and parse the content into a
    /// configuration mapping.
    pub fn load(&self, context: &Context) -> Result<Mapping> {
        let raw = match &self.content {
            Some(raw) => raw,
            None => {
                return Err(Error::File {
                    message: self.error_message(),
                })
            }
        };

        let enabled = context
            .features()
            .enabled(Feature::FileInterpolation, context.project.as_deref());
        let mut interpolator = Interpolator::new(
            raw,
            self.spec.inputs.clone(),
            enabled,
            context.user.as_deref(),
        );
        let value = interpolator.perform()?;

        match value {
            serde_yaml::Value::Mapping(mapping) => Ok(mapping),
            _ => Err(Error::File {
                message: format!(
                    "Included file `{}` does not have valid YAML syntax",
                    self.location
                ),
            }),
        }
    }
}

fn is_fetchable_url(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(yaml: &str) -> IncludeSpec {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        crate::location::normalize(&value, &crate::variables::Variables::new())
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_classify_each_kind() {
        assert!(matches!(
            classify(&spec("remote: https://example.com/a.yml")).unwrap(),
            Location::Remote { .. }
        ));
        assert!(matches!(
            classify(&spec("local: a.yml")).unwrap(),
            Location::Local { .. }
        ));
        assert!(matches!(
            classify(&spec("template: Auto-DevOps.yml")).unwrap(),
            Location::Template { .. }
        ));
        assert!(matches!(
            classify(&spec("project: group/app\nfile: a.yml")).unwrap(),
            Location::Project { .. }
        ));
    }

    #[test]
    fn test_classify_rejects_multiple_kinds() {
        let error = classify(&spec("local: a.yml\nremote: https://example.com/a.yml")).unwrap_err();
        assert!(matches!(error, Error::AmbiguousSpecification { .. }));
    }

    #[test]
    fn test_classify_rejects_empty_spec() {
        let error = classify(&IncludeSpec::default()).unwrap_err();
        assert!(matches!(error, Error::AmbiguousSpecification { .. }));
    }

    #[test]
    fn test_classify_project_without_file() {
        let error = classify(&spec("project: group/app")).unwrap_err();
        assert!(matches!(error, Error::File { .. }));
    }
}
