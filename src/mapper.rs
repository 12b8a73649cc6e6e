//! Mapping of raw `include` values to resolved files.
//!
//! One pass over the declaration: normalize every entry, drop entries whose
//! `rules` do not match, guard each survivor against the session's
//! duplicate/budget limits, then classify and fetch it. The deadline is
//! checked once up front; long-running fetch work is checked again by the
//! processor per file.

use serde_yaml::Value;

use crate::context::Context;
use crate::error::Result;
use crate::location;
use crate::resolver::ResolvedFile;

/// Resolve a raw `include` value into files, in declaration order.
pub fn process(include_value: &Value, context: &Context) -> Result<Vec<ResolvedFile>> {
    context.check_execution_time()?;

    let specs = location::normalize(include_value, &context.variables)?;
    let mut files = Vec::with_capacity(specs.len());

    for spec in specs {
        if !spec.included(&context.variables) {
            log::debug!("include `{spec}` dropped by rules");
            continue;
        }
        context.verify_duplicates(&spec)?;
        files.push(ResolvedFile::resolve(spec, context)?);
    }

    Ok(files)
}
