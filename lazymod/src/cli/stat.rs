use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use lazymod_common::error::Result;
use lazymod_core::{LocalScheduler, ModuleInfo, ModuleState, Modules};
use prettytable::{format, Cell, Row, Table};
use serde_json::Value;

use crate::manifest::Manifest;

#[derive(Args, Debug)]
pub struct Stat {
    /// Path to the JSON graph manifest
    pub manifest: PathBuf,

    /// Print module details as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl Stat {
    pub async fn run(&self) -> Result<()> {
        let manifest = Manifest::load(&self.manifest)?;
        let modules: Modules<Value> = Modules::from_env(LocalScheduler)?;
        modules.set_options(manifest.options);
        manifest.install(&modules);

        let names = manifest.module_names();
        if names.is_empty() {
            println!("{}", "0 modules declared".yellow());
            return Ok(());
        }
        if self.json {
            let infos: Vec<ModuleInfo> = names
                .iter()
                .filter_map(|name| modules.describe(name))
                .collect();
            println!("{}", serde_json::to_string_pretty(&infos)?);
            return Ok(());
        }
        print_modules(&modules, &names);
        Ok(())
    }
}

fn state_cell(state: ModuleState) -> Cell {
    let style = match state {
        ModuleState::Resolved => "Fg",
        ModuleState::InResolving => "Fy",
        ModuleState::NotResolved => "Fr",
        ModuleState::NotDefined => "Fd",
    };
    Cell::new(&state.to_string()).style_spec(style)
}

/// Prints one row per module in `names`, in that order.
pub fn print_modules(modules: &Modules<Value>, names: &[&str]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(vec![
        Cell::new("Module").style_spec("b"),
        Cell::new("State").style_spec("b"),
        Cell::new("Declarations").style_spec("b"),
        Cell::new("Variants").style_spec("b"),
        Cell::new("Dependencies").style_spec("b"),
    ]));

    for info in names.iter().filter_map(|name| modules.describe(name)) {
        let dependencies = info
            .dependencies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(Row::new(vec![
            Cell::new(&info.name).style_spec("Fb"),
            state_cell(info.state),
            Cell::new(&info.declarations.to_string()),
            Cell::new(&info.variants.to_string()),
            Cell::new(if dependencies.is_empty() { "-" } else { dependencies.as_str() }),
        ]));
    }
    table.printstd();

    let summary = modules
        .stat()
        .iter()
        .map(|(state, names)| {
            let label = state.as_str().to_lowercase().replace('_', " ");
            format!("{} {}", names.len(), label)
        })
        .collect::<Vec<_>>()
        .join(", ");
    println!("{}", summary.bold());
}
