//! Coerce CLI - shape-driven value conversion

mod config;
mod json;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use config::Config;
use rhi_coerce_core::convert::{builtin_loader, render};
use rhi_coerce_core::ops::{self, CloneOptions};
use rhi_coerce_core::{Comparator, DynamicTypes, Registry, Shape, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }

    /// Command output, printed even when quiet.
    fn result(self, msg: &str) {
        println!("{msg}");
    }
}

#[derive(Parser)]
#[command(name = "coerce")]
#[command(about = "Convert values between shapes")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/coerce/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON value to a shape
    Convert {
        /// JSON input (use "-" for stdin)
        input: String,
        /// Target shape, e.g. "int", "list<long>", "map<string, any>"
        #[arg(short, long)]
        shape: String,
        /// JSON value used when the input is null
        #[arg(long)]
        default: Option<String>,
        /// JSON value the result is written into
        #[arg(long = "override")]
        overriding: Option<String>,
        /// TOML file declaring dynamic types the shape may name
        #[arg(long)]
        types: Option<PathBuf>,
        /// Print the string rendering instead of JSON
        #[arg(long)]
        render: bool,
    },

    /// Compare two JSON values structurally
    Equals {
        a: String,
        b: String,
        /// Cast across types before comparing
        #[arg(long)]
        loose: bool,
    },

    /// Sort a JSON array.
    ///
    /// Without --by, elements are sorted by natural order, descending.
    Sort {
        /// JSON array (use "-" for stdin)
        input: String,
        /// Sort key: field name with optional ":asc" or ":desc"
        #[arg(long = "by")]
        by: Vec<String>,
    },

    /// Deep-clone a JSON value and print the copy
    Clone {
        /// JSON input (use "-" for stdin)
        input: String,
    },

    /// List registered converters in dispatch order
    Converters,

    /// Load extension manifests and report problems
    Check {
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || config.defaults.quiet;
    let verbosity = Verbosity::from_flags(verbose, quiet);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| verbosity.filter().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (registry, errors) = Registry::with_config(&config.engine);
    for error in &errors {
        tracing::warn!(%error, "manifest error");
    }

    match cli.command {
        Commands::Convert {
            input,
            shape,
            default,
            overriding,
            types,
            render,
        } => cmd_convert(
            &registry,
            &config,
            &input,
            &shape,
            default.as_deref(),
            overriding.as_deref(),
            types.as_deref(),
            render,
            verbosity,
        ),
        Commands::Equals { a, b, loose } => {
            let (a, b) = (read_value(&a)?, read_value(&b)?);
            verbosity.result(&ops::equals(&registry, &a, &b, loose).to_string());
            Ok(())
        }
        Commands::Sort { input, by } => cmd_sort(&input, &by, verbosity),
        Commands::Clone { input } => {
            let value = read_value(&input)?;
            let options = CloneOptions::from(&config.engine.clone);
            let copy = ops::deep_clone_with(&registry, &value, options)?;
            print_json(&copy, verbosity)
        }
        Commands::Converters => cmd_converters(&registry, verbosity),
        Commands::Check { manifests } => cmd_check(&config, &manifests, verbosity),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "coerce", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Reads a JSON argument; "-" reads stdin.
fn read_value(arg: &str) -> Result<Value> {
    let text = if arg == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        text
    } else {
        arg.to_string()
    };
    let parsed: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON: {text}"))?;
    Ok(json::to_value(&parsed))
}

fn print_json(value: &Value, v: Verbosity) -> Result<()> {
    let text = serde_json::to_string_pretty(&json::from_value(value))?;
    v.result(&text);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_convert(
    registry: &Registry,
    config: &Config,
    input: &str,
    shape: &str,
    default: Option<&str>,
    overriding: Option<&str>,
    types: Option<&Path>,
    render_output: bool,
    v: Verbosity,
) -> Result<()> {
    let mut dynamic_types = DynamicTypes::new();
    if let Some(path) = types {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read types {}", path.display()))?;
        let count = dynamic_types
            .load_toml(&text)
            .with_context(|| format!("Invalid types {}", path.display()))?;
        tracing::debug!(count, path = %path.display(), "dynamic types loaded");
    }
    let shape = Shape::parse_with(shape, |name| dynamic_types.resolve(name))
        .with_context(|| format!("Invalid shape '{shape}'"))?;

    let value = read_value(input)?;
    let default = default.map(read_value).transpose()?;
    let overriding = overriding.map(read_value).transpose()?;

    let converted = registry
        .convert(&value, &shape, default.as_ref(), overriding.as_ref())
        .with_context(|| format!("Cannot convert to {shape}"))?;

    if render_output {
        v.result(&render(&converted, config.engine.render.pretty));
        Ok(())
    } else {
        print_json(&converted, v)
    }
}

/// Splits "field:desc" into the field and its reverse flag.
fn parse_sort_key(key: &str) -> Result<(&str, bool)> {
    match key.rsplit_once(':') {
        Some((field, "desc")) => Ok((field, true)),
        Some((field, "asc")) => Ok((field, false)),
        Some((_, order)) => bail!("Unknown sort order '{order}' in '{key}'. Use asc or desc"),
        None => Ok((key, false)),
    }
}

fn cmd_sort(input: &str, by: &[String], v: Verbosity) -> Result<()> {
    let value = read_value(input)?;
    let keys = by
        .iter()
        .map(|key| parse_sort_key(key))
        .collect::<Result<Vec<_>>>()?;
    let fields: Vec<&str> = keys.iter().map(|(field, _)| *field).collect();
    let reverse: Vec<bool> = keys.iter().map(|(_, reverse)| *reverse).collect();
    let comparators: Vec<Option<Comparator>> = vec![None; keys.len()];

    rhi_coerce_core::sort(&value, &fields, &comparators, &reverse)?;
    print_json(&value, v)
}

fn cmd_converters(registry: &Registry, v: Verbosity) -> Result<()> {
    v.info("Converters in dispatch order:\n");

    for decl in registry.declarations() {
        v.result(&format!("  {}", decl.id));
        if !decl.description.is_empty() {
            v.info(&format!("    {}", decl.description));
        }
        for (key, value) in &decl.metadata {
            v.info(&format!("    {key} = {value}"));
        }
    }

    v.info(&format!("\nTotal: {} converters", registry.len()));
    Ok(())
}

fn cmd_check(config: &Config, manifests: &[PathBuf], v: Verbosity) -> Result<()> {
    let mut loader = builtin_loader(&config.engine);
    for path in manifests {
        loader.load_file(path);
    }

    for extension in loader.extensions() {
        let status = if extension.instance.is_some() {
            "ok"
        } else {
            "unavailable"
        };
        v.info(&format!("  {:>5}  {}  ({status})", extension.index, extension.name));
    }

    let errors = loader.errors();
    for error in errors {
        eprintln!("error: {error}");
    }
    if !errors.is_empty() {
        bail!("{} manifest error(s)", errors.len());
    }
    v.info(&format!("\n{} extensions loaded", loader.extensions().len()));
    Ok(())
}
