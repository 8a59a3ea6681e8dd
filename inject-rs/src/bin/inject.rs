//! CLI for inject-rs: module scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum CliError {
    #[error("invalid binding `{0}`, expected Interface=Implementation")]
    InvalidBinding(String),
    #[error("{0} already exists")]
    Exists(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn snake_case(s: &str) -> String {
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Parser)]
#[command(name = "inject")]
#[command(about = "Inject Rust CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a module skeleton with its bindings.
    NewModule {
        /// Module name in PascalCase (e.g. GreetingModule)
        name: String,
        /// Binding to declare, as Interface=Implementation (repeatable)
        #[arg(long = "bind", value_name = "INTERFACE=IMPL")]
        bindings: Vec<String>,
        /// Output directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

const MODULE_RS: &str = r#"//! Module MODULE: bindings and providers.
use inject_rs::{Bindings, InjectError};

#[derive(Default)]
pub struct MODULE;

#[inject_rs::module]
impl MODULE {
    fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError> {
BINDINGS        Ok(())
    }
}

inject_rs::register_module!(MODULE);
"#;

/// One `Interface=Implementation` pair. A bare type name binds as `dyn Name`.
fn parse_binding(raw: &str) -> Result<(String, String), CliError> {
    let (interface, implementation) = raw
        .split_once('=')
        .map(|(i, t)| (i.trim(), t.trim()))
        .filter(|(i, t)| !i.is_empty() && !t.is_empty())
        .ok_or_else(|| CliError::InvalidBinding(raw.to_string()))?;
    let interface = if interface.starts_with("dyn ") || interface == implementation {
        interface.to_string()
    } else {
        format!("dyn {interface}")
    };
    Ok((interface, implementation.to_string()))
}

fn render_module(name: &str, bindings: &[(String, String)]) -> String {
    let lines: String = bindings
        .iter()
        .map(|(interface, implementation)| {
            format!("        bindings.bind::<{interface}>().to_type::<{implementation}>();\n")
        })
        .collect();
    MODULE_RS.replace("MODULE", name).replace("BINDINGS", &lines)
}

fn run_new_module(name: &str, raw_bindings: &[String], dir: &Path) -> Result<(), CliError> {
    let bindings = raw_bindings
        .iter()
        .map(|raw| parse_binding(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let path = dir.join(format!("{}.rs", snake_case(name)));
    if path.exists() {
        return Err(CliError::Exists(path));
    }
    fs::create_dir_all(dir)?;
    fs::write(&path, render_module(name, &bindings))?;
    debug!(path = %path.display(), bindings = bindings.len(), "module written");

    println!("Generated {}", path.display());
    println!(
        "Add to your crate: mod {}; (the module registers itself with inject_rs::global)",
        snake_case(name)
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::NewModule {
            name,
            bindings,
            dir,
        } => run_new_module(&name, &bindings, &dir)?,
    }
    Ok(())
}
