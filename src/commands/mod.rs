//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `ci-compose` command-line tool. Each subcommand is defined in its own
//! file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and
//!   options, derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Both commands share [`CompositionArgs`], the inputs of one resolution:
//! the configuration file, the directories standing in for cross-project
//! checkouts and the template catalog, the CI variables, and the optional
//! wall-clock budget.

pub mod check;
pub mod resolve;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use serde_yaml::Mapping;

use ci_compose::context::{Context, Services};
use ci_compose::fetch::{
    DirRepository, DirTemplates, HttpRemoteFetch, InstanceSettings, NoTemplates, TemplateCatalog,
};
use ci_compose::processor::Processor;
use ci_compose::variables::Variables;

/// Inputs shared by every composition command.
#[derive(clap::Args, Debug)]
pub struct CompositionArgs {
    /// Path to the configuration file to compose
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Directory containing checkouts of cross-project includes, one
    /// subdirectory per project path
    #[arg(long, value_name = "DIR")]
    pub projects_dir: Option<PathBuf>,

    /// Directory containing named template files
    #[arg(long, value_name = "DIR")]
    pub templates_dir: Option<PathBuf>,

    /// CI variable available to include locations and rules
    #[arg(long = "variable", value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    /// Wall-clock budget for the whole resolution, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

/// Run one resolution pass over the configuration file.
pub(crate) fn compose(args: &CompositionArgs) -> Result<Mapping> {
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("could not read {}", args.config.display()))?;
    let values: Mapping = serde_yaml::from_str(&raw)
        .with_context(|| format!("{} is not a YAML mapping", args.config.display()))?;

    let root = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let templates: Arc<dyn TemplateCatalog> = match &args.templates_dir {
        Some(dir) => Arc::new(DirTemplates::new(dir.clone())),
        None => Arc::new(NoTemplates),
    };
    let services = Services::new(
        Arc::new(DirRepository::new(root, args.projects_dir.clone())),
        Arc::new(HttpRemoteFetch::default()),
        templates,
    );

    let context = Context::new(services, &InstanceSettings::default())
        .with_project(DirRepository::CURRENT_PROJECT, "HEAD")
        .with_variables(parse_variables(&args.variables)?);
    context.set_deadline(args.timeout.map(Duration::from_secs))?;

    Ok(Processor::new(values, context).perform()?)
}

fn parse_variables(raw: &[String]) -> Result<Variables> {
    let mut variables = Variables::new();
    for entry in raw {
        match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => variables.push(key, value),
            _ => bail!("invalid --variable `{entry}`, expected KEY=VALUE"),
        }
    }
    Ok(variables)
}
