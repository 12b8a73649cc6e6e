//! # Resolution Entry Point
//!
//! The [`Processor`] drives one resolution pass: map the `include`
//! declaration to resolved files, then fold every file's (interpolated)
//! content into a single aggregate mapping. Merge order determines
//! override semantics — files merge in declaration order, and the inline
//! values merge last so local keys always win. The `include` key itself is
//! stripped from the final result.
//!
//! A file whose own content declares `include` recurses through a mutated
//! context that shares the parent session, so nested includes draw from
//! the same expansion set, deadline, remote pool, and byte budget.

use serde_yaml::{Mapping, Value};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::mapper;
use crate::merge::deep_merge;

/// One resolution pass over a configuration's `include` declaration.
pub struct Processor {
    values: Mapping,
    context: Context,
}

impl Processor {
    pub fn new(values: Mapping, context: Context) -> Self {
        Self { values, context }
    }

    /// Resolve every include and produce the aggregate configuration.
    ///
    /// A configuration without an `include` key passes through unchanged.
    pub fn perform(self) -> Result<Mapping> {
        let include_value = match self.values.get(&include_key()) {
            Some(value) => value.clone(),
            None => return Ok(self.values),
        };

        let files = mapper::process(&include_value, &self.context)?;
        log::debug!("resolved {} include file(s)", files.len());

        let mut merged = Mapping::new();
        for mut file in files {
            self.context.check_execution_time()?;
            file.fetch_content(&self.context)?;
            if !file.valid() {
                return Err(Error::File {
                    message: file.error_message(),
                });
            }

            let content = file.load(&self.context)?;
            let expanded = if content.contains_key(&include_key()) {
                let nested = self.context.mutate(file.expand_attrs());
                Processor::new(content, nested).perform()?
            } else {
                content
            };

            deep_merge(&mut merged, &expanded);
        }

        // Inline values always override included ones
        deep_merge(&mut merged, &self.values);
        merged.remove(&include_key());
        Ok(merged)
    }
}

fn include_key() -> Value {
    Value::String("include".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Services;
    use crate::fetch::{
        InstanceSettings, NoTemplates, RemoteFetch, RemoteResponse, RepositoryAccess,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapRepository {
        files: HashMap<String, String>,
    }

    impl RepositoryAccess for MapRepository {
        fn resolve_ref(&self, _project: &str, reference: &str) -> Option<String> {
            Some(reference.to_string())
        }

        fn file_content(&self, _project: &str, _sha: &str, path: &str) -> Option<String> {
            self.files.get(path).cloned()
        }
    }

    struct StubRemote;

    impl RemoteFetch for StubRemote {
        fn fetch(&self, url: &str) -> RemoteResponse {
            RemoteResponse::ready(url, Err(format!("Remote file `{url}` could not be fetched")))
        }
    }

    fn context_with(files: &[(&str, &str)]) -> Context {
        let repository = MapRepository {
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        };
        let services = Services::new(
            Arc::new(repository),
            Arc::new(StubRemote),
            Arc::new(NoTemplates),
        );
        Context::new(services, &InstanceSettings::default())
            .with_project("group/app", "deadbeef")
    }

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_passthrough_without_include() {
        let values = mapping("job:\n  script: echo\n");
        let result = Processor::new(values.clone(), context_with(&[]))
            .perform()
            .unwrap();

        assert_eq!(result, values);
    }

    #[test]
    fn test_single_local_include_merges() {
        let context = context_with(&[("shared.yml", "build:\n  stage: build\n")]);
        let values = mapping("include: shared.yml\njob:\n  script: echo\n");

        let result = Processor::new(values, context).perform().unwrap();

        assert_eq!(result, mapping("build:\n  stage: build\njob:\n  script: echo\n"));
    }

    #[test]
    fn test_inline_values_override_included() {
        let context = context_with(&[("shared.yml", "job:\n  stage: test\n  image: alpine\n")]);
        let values = mapping("include: shared.yml\njob:\n  stage: deploy\n");

        let result = Processor::new(values, context).perform().unwrap();

        assert_eq!(result, mapping("job:\n  stage: deploy\n  image: alpine\n"));
    }

    #[test]
    fn test_invalid_file_is_terminal() {
        let context = context_with(&[]);
        let values = mapping("include: missing.yml\n");

        let error = Processor::new(values, context).perform().unwrap_err();

        assert!(matches!(error, Error::File { .. }));
        assert!(error.to_string().contains("missing.yml"));
    }

    #[test]
    fn test_nested_include_is_expanded() {
        let context = context_with(&[
            ("outer.yml", "include: inner.yml\nouter:\n  stage: test\n"),
            ("inner.yml", "inner:\n  stage: build\n"),
        ]);
        let values = mapping("include: outer.yml\n");

        let result = Processor::new(values, context).perform().unwrap();

        assert_eq!(result, mapping("inner:\n  stage: build\nouter:\n  stage: test\n"));
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let context = context_with(&[
            ("a.yml", "include: b.yml\na: 1\n"),
            ("b.yml", "include: a.yml\nb: 2\n"),
        ]);
        let values = mapping("include: a.yml\n");

        let error = Processor::new(values, context).perform().unwrap_err();

        assert!(matches!(error, Error::DuplicateInclude { .. }));
    }
}
