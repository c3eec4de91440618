//! Device parameter handlers: read quotas, set permanent watts.

use std::fmt::Write as _;

use serde_json::{Map, Value};

use ecoflow_core::{CmdSetResponse, Controller};

use crate::cli::{GlobalOpts, ParamsArgs, SetWattsArgs};
use crate::error::CliError;
use crate::output;

fn detail(params: &Map<String, Value>) -> String {
    let width = params.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in params {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{key:<width$}  {rendered}");
    }
    out.trim_end().to_owned()
}

pub async fn handle(
    controller: &Controller,
    args: &ParamsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let params = controller
        .device_parameters(&args.serial, &args.selector)
        .await?;
    let out = output::render_single(&global.output, &params, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set_watts(
    controller: &Controller,
    args: &SetWattsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !args.watts.is_finite() || args.watts < 0.0 {
        return Err(CliError::Validation {
            field: "watts".into(),
            reason: format!("expected a non-negative number, got {}", args.watts),
        });
    }

    let response = controller
        .set_permanent_watts(&args.serial, args.watts)
        .await?;
    let out = output::render_single(&global.output, &response, |r: &CmdSetResponse| {
        format!("{}: permanent output set to {} W ({})", args.serial, args.watts, r.message)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
