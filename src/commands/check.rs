//! `check` command: resolve and report validity.

use anyhow::Result;

use super::{compose, CompositionArgs};

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub composition: CompositionArgs,
}

pub fn execute(args: CheckArgs) -> Result<()> {
    compose(&args.composition)?;
    println!("Configuration is valid");
    Ok(())
}
