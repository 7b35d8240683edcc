use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use nest_cli::report::{BootReport, ClassReport, IndexReport};
use nest_config::NestConfig;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "nest", version, about = "Resolve classes and resources inside nested jars")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index an archive and print its nested structure
    Index(IndexArgs),
    /// Resolve a class name against a set of archives
    Resolve(ResolveArgs),
    /// List every location of a resource path, in lookup order
    Resources(ResourcesArgs),
    /// Write the bytes behind an address to stdout
    Cat(CatArgs),
    /// Resolve the `Boot-Class` of a jar using its `Compact-Class-Path`
    Boot(BootArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Archive address, e.g. `app.jar` or `archive://app.jar!/lib/dep.jar`
    address: String,
    /// Do not descend into nested archives
    #[arg(long)]
    no_recursive: bool,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResolveArgs {
    /// Binary class name, e.g. `com.example.Main`
    name: String,
    /// Archive to search; repeat for more, searched in the given order
    #[arg(long = "archive", required = true)]
    archives: Vec<String>,
    /// Archive consulted before all others
    #[arg(long = "host")]
    hosts: Vec<String>,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResourcesArgs {
    /// Entry path, e.g. `META-INF/services/x`
    path: String,
    #[arg(long = "archive", required = true)]
    archives: Vec<String>,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CatArgs {
    address: String,
}

#[derive(Args)]
struct BootArgs {
    jar: PathBuf,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            nest_cli::exit_code(&err)
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = NestConfig::load(cli.config.as_deref())?;
    nest_config::init_tracing(&config.logging);

    match cli.command {
        Command::Index(args) => {
            let report = nest_cli::index(&args.address, !args.no_recursive, &config)?;
            print_output(&report, args.json)?;
        }
        Command::Resolve(args) => {
            let report = nest_cli::resolve(&args.name, &args.archives, &args.hosts, &config)?;
            print_output(&report, args.json)?;
        }
        Command::Resources(args) => {
            let found = nest_cli::resources(&args.path, &args.archives, &config)?;
            print_output(&found, args.json)?;
        }
        Command::Cat(args) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            nest_cli::cat(&args.address, &mut out)?;
        }
        Command::Boot(args) => {
            let report = nest_cli::boot(&args.jar, &config)?;
            print_output(&report, args.json)?;
        }
    }
    Ok(0)
}

fn print_output<T: Serialize + 'static>(value: &T, json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(value)?;
        writeln!(out, "{text}")?;
        return Ok(());
    }

    // Human output for the report types; anything else falls back to JSON.
    let any = value as &dyn std::any::Any;
    if let Some(report) = any.downcast_ref::<IndexReport>() {
        writeln!(out, "archives: {}", report.archives())?;
        print_index(&mut out, report, 0)?;
    } else if let Some(report) = any.downcast_ref::<ClassReport>() {
        print_class(&mut out, report)?;
    } else if let Some(report) = any.downcast_ref::<BootReport>() {
        writeln!(out, "boot: {}", report.jar)?;
        for archive in &report.archives {
            writeln!(out, "  archive: {archive}")?;
        }
        print_class(&mut out, &report.boot)?;
    } else if let Some(found) = any.downcast_ref::<Vec<String>>() {
        for address in found {
            writeln!(out, "{address}")?;
        }
    } else {
        let text = serde_json::to_string_pretty(value)?;
        writeln!(out, "{text}")?;
    }
    Ok(())
}

fn print_index(out: &mut dyn Write, report: &IndexReport, depth: usize) -> Result<()> {
    writeln!(
        out,
        "{:indent$}{} ({} inline, {} ordinal)",
        "",
        report.origin,
        report.inline_entries,
        report.ordinal_entries,
        indent = depth * 2
    )?;
    for child in &report.children {
        print_index(out, child, depth + 1)?;
    }
    Ok(())
}

fn print_class(out: &mut dyn Write, report: &ClassReport) -> Result<()> {
    writeln!(out, "class: {}", report.name)?;
    writeln!(out, "  defined_by: {}", report.defined_by)?;
    writeln!(out, "  location: {}", report.location)?;
    writeln!(out, "  major_version: {}", report.major_version)?;
    if let Some(super_class) = &report.super_class {
        writeln!(out, "  super: {super_class}")?;
    }
    for interface in &report.interfaces {
        writeln!(out, "  implements: {interface}")?;
    }
    writeln!(out, "  bytes: {}", report.bytes)?;
    Ok(())
}
