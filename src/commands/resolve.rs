//! `resolve` command: print the merged configuration.

use anyhow::Result;

use super::{compose, CompositionArgs};

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub composition: CompositionArgs,

    /// Print the merged configuration as JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ResolveArgs) -> Result<()> {
    let merged = compose(&args.composition)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&merged)?);
    } else {
        print!("{}", serde_yaml::to_string(&merged)?);
    }
    Ok(())
}
