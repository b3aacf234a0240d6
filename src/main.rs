//! Thin command-line driver over the engine.
//!
//! The library is the product; this binary only wires subcommands to the
//! public API for loading trees and reading, writing, and diffing
//! `.config` files.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use kconfig_eval::{Item, Model, SymbolKind, Tristate};

/// Kconfig parsing and .config manipulation.
#[derive(Parser)]
#[command(name = "kconfig-eval", version, about)]
struct Cli {
    /// Top-level Kconfig file.
    #[arg(long, default_value = "Kconfig", global = true)]
    kconfig: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved item tree with current values.
    Dump,
    /// Write a .config with every symbol at its default value.
    Alldefconfig(OutputArgs),
    /// Load a .config and re-emit it normalized to tree order.
    Write(WriteArgs),
    /// Compare the effect of two .config files on the same tree.
    Diff(DiffArgs),
}

#[derive(Parser)]
struct OutputArgs {
    /// Output path.
    #[arg(short, long, default_value = ".config")]
    output: PathBuf,
}

#[derive(Parser)]
struct WriteArgs {
    /// The .config to load.
    config: PathBuf,

    /// Output path; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a C header alongside.
    #[arg(long)]
    autoconf: Option<PathBuf>,
}

#[derive(Parser)]
struct DiffArgs {
    old: PathBuf,
    new: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut model = Model::load(&cli.kconfig)
        .with_context(|| format!("failed to load {}", cli.kconfig.display()))?;

    match cli.command {
        Command::Dump => cmd_dump(&model),
        Command::Alldefconfig(args) => cmd_alldefconfig(&model, &args),
        Command::Write(args) => cmd_write(&mut model, &args),
        Command::Diff(args) => cmd_diff(&mut model, &args),
    }
}

fn cmd_dump(model: &Model) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for node_id in model.iter_items() {
        let node = model.node(node_id);
        let mut depth: usize = 0;
        let mut cur = node.parent();
        while let Some(p) = cur {
            depth += 1;
            cur = model.node(p).parent();
        }
        let indent = "  ".repeat(depth.saturating_sub(1));

        match node.item() {
            Item::Symbol(sym_id) => {
                let sym = model.sym(sym_id);
                writeln!(
                    out,
                    "{}{} {} = {}  [vis {}]",
                    indent,
                    sym.kind().as_str(),
                    sym.name(),
                    model.string_value(sym_id),
                    model.visibility(sym_id),
                )?;
            }
            Item::Choice(choice_id) => {
                let selection = model
                    .choice_selection(choice_id)
                    .map(|s| model.sym(s).name().to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                writeln!(
                    out,
                    "{}choice \"{}\" mode {} selected {}",
                    indent,
                    node.prompt().unwrap_or(""),
                    model.choice_mode(choice_id),
                    selection,
                )?;
            }
            Item::Menu => {
                writeln!(out, "{}menu \"{}\"", indent, node.prompt().unwrap_or(""))?;
            }
            Item::Comment => {
                writeln!(out, "{}comment \"{}\"", indent, node.prompt().unwrap_or(""))?;
            }
            Item::Root => {}
        }
    }
    Ok(())
}

fn cmd_alldefconfig(model: &Model, args: &OutputArgs) -> Result<()> {
    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    model.write_config(file)?;
    log::info!("wrote {}", args.output.display());
    Ok(())
}

fn cmd_write(model: &mut Model, args: &WriteArgs) -> Result<()> {
    model
        .load_config_file(&args.config, true)
        .with_context(|| format!("failed to read {}", args.config.display()))?;

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            model.write_config(file)?;
        }
        None => model.write_config(std::io::stdout().lock())?,
    }

    if let Some(path) = &args.autoconf {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        model.write_autoconf(file)?;
    }

    for warning in model.warnings() {
        eprintln!("{}", warning);
    }
    Ok(())
}

fn cmd_diff(model: &mut Model, args: &DiffArgs) -> Result<()> {
    model
        .load_config_file(&args.old, true)
        .with_context(|| format!("failed to read {}", args.old.display()))?;
    let old: Vec<(String, String)> = model
        .all_symbols()
        .map(|id| (model.sym(id).name().to_string(), model.string_value(id)))
        .collect();

    model
        .load_config_file(&args.new, true)
        .with_context(|| format!("failed to read {}", args.new.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let ids: Vec<_> = model.all_symbols().collect();
    for (id, (name, old_val)) in ids.into_iter().zip(&old) {
        let new_val = model.string_value(id);
        if *old_val != new_val {
            writeln!(
                out,
                "{} {} -> {}",
                name,
                display_val(model, id, old_val),
                display_val(model, id, &new_val)
            )?;
        }
    }
    Ok(())
}

fn display_val(model: &Model, id: kconfig_eval::SymbolId, val: &str) -> String {
    match model.sym(id).kind() {
        SymbolKind::String => format!("\"{}\"", val),
        _ if val.is_empty() => Tristate::No.as_str().to_string(),
        _ => val.to_string(),
    }
}
