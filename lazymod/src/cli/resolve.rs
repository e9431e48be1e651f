use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use lazymod_common::error::Result;
use lazymod_common::OptionsUpdate;
use lazymod_core::{LocalScheduler, Modules};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cli::stat::print_modules;
use crate::manifest::Manifest;

#[derive(Args, Debug)]
pub struct Resolve {
    /// Path to the JSON graph manifest
    pub manifest: PathBuf,

    /// Modules to require
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Fail as soon as a dependency cycle is entered
    #[arg(long)]
    pub strict_cycles: bool,

    /// Reject dependencies that override their target's dependencies
    #[arg(long)]
    pub no_overrides: bool,

    /// Reject modules that are defined more than once
    #[arg(long)]
    pub no_redefinitions: bool,
}

impl Resolve {
    pub async fn run(&self) -> Result<()> {
        let manifest = Manifest::load(&self.manifest)?;

        // Environment, then manifest, then flags.
        let modules: Modules<Value> = Modules::from_env(LocalScheduler)?;
        modules.set_options(manifest.options);
        modules.set_options(self.option_flags());
        manifest.install(&modules);
        // The first failure fails the command; later ones are only logged.
        modules.on_unhandled_error(|err| warn!("Additional resolution failure: {}", err));

        debug!("Requiring {:?} with {:?}", self.targets, modules.options());
        let deps = modules.require_async(&self.targets).await?;
        let values = deps.to_map()?;

        println!("{}", serde_json::to_string_pretty(&values)?);
        println!();
        println!(
            "{}{}",
            "==> ".bold().blue(),
            format!("Resolved {} module(s)", values.len()).bold()
        );
        print_modules(&modules, &manifest.module_names());
        Ok(())
    }

    fn option_flags(&self) -> OptionsUpdate {
        OptionsUpdate {
            strict_circular_dependencies: self.strict_cycles.then_some(true),
            allow_dependencies_override: self.no_overrides.then_some(false),
            allow_multiple_declarations: self.no_redefinitions.then_some(false),
            ..OptionsUpdate::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_leave_options_alone() {
        let resolve = Resolve {
            manifest: PathBuf::from("graph.json"),
            targets: vec!["A".into()],
            strict_cycles: false,
            no_overrides: true,
            no_redefinitions: false,
        };
        let update = resolve.option_flags();

        assert_eq!(update.allow_dependencies_override, Some(false));
        assert_eq!(update.strict_circular_dependencies, None);
        assert_eq!(update.allow_multiple_declarations, None);
    }
}
