//! Config subcommand handlers.

use std::fmt::Write;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// Format config for display, masking secrets.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "refresh_interval = {}", cfg.defaults.refresh_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref url) = p.api_url {
            let _ = writeln!(out, "api_url = \"{url}\"");
        }
        if let Some(ref key) = p.access_key {
            let _ = writeln!(out, "access_key = \"{key}\"");
        }
        if p.secret_key.is_some() {
            let _ = writeln!(out, "secret_key = \"****\"");
        }
        if let Some(ref env) = p.secret_key_env {
            let _ = writeln!(out, "secret_key_env = \"{env}\"");
        }
        if let Some(ref email) = p.email {
            let _ = writeln!(out, "email = \"{email}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(refresh) = p.refresh_interval {
            let _ = writeln!(out, "refresh_interval = {refresh}");
        }
        if let Some(max) = p.max_reconnect_interval {
            let _ = writeln!(out, "max_reconnect_interval = {max}");
        }
    }

    out
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = ecoflow_config::load_config()?;
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }
    }
}
