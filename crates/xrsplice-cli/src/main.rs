//! # xrsplice CLI
//!
//! Installs and inspects the xrsplice OpenXR API layer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xrsplice_config::path::{config_search_paths, library_path_for_manifest};
use xrsplice_config::Config;
use xrsplice_layer::dispatch::INTERCEPT_TABLE;
use xrsplice_layer::resolve::REQUIRED_FUNCTIONS;

mod manifest;

use manifest::{LayerManifest, ManifestOptions, DEFAULT_DISABLE_ENV};

/// xrsplice - OpenXR API layer tooling
#[derive(Parser)]
#[command(name = "xrsplice")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the loader manifest for the layer library
    Manifest {
        /// Path to the built layer library
        #[arg(long, value_name = "PATH")]
        library_path: PathBuf,

        /// Write the manifest here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Store the library path relative to the manifest when possible
        #[arg(long, requires = "output")]
        relative: bool,

        /// Generate an implicit layer manifest
        #[arg(long)]
        implicit: bool,

        /// Environment variable that disables an implicit layer
        #[arg(long, value_name = "VAR", default_value = DEFAULT_DISABLE_ENV)]
        disable_env: String,

        /// Environment variable required to enable an implicit layer
        #[arg(long, value_name = "VAR")]
        enable_env: Option<String>,
    },

    /// List intercepted and required downstream functions
    Functions,

    /// Show the effective configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("XRSPLICE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest {
            library_path,
            output,
            relative,
            implicit,
            disable_env,
            enable_env,
        } => cmd_manifest(
            library_path,
            output,
            relative,
            implicit,
            disable_env,
            enable_env,
        ),
        Commands::Functions => cmd_functions(),
        Commands::Config { default } => cmd_config(default),
    }
}

fn cmd_manifest(
    library_path: PathBuf,
    output: Option<PathBuf>,
    relative: bool,
    implicit: bool,
    disable_env: String,
    enable_env: Option<String>,
) -> Result<()> {
    if !library_path.exists() {
        tracing::warn!(
            path = %library_path.display(),
            "Layer library does not exist yet"
        );
    }

    let library_path = match &output {
        Some(output) => library_path_for_manifest(&library_path, output, relative)?,
        None => library_path_for_manifest(&library_path, &library_path, false)?,
    };

    let manifest = LayerManifest::new(&ManifestOptions {
        library_path,
        implicit,
        disable_env: Some(disable_env),
        enable_env,
    });

    match output {
        Some(output) => {
            manifest.write(&output)?;
            println!("Manifest written: {}", output.display());
        }
        None => print!("{}", manifest.to_json()?),
    }
    Ok(())
}

fn cmd_functions() -> Result<()> {
    println!("Intercepted:");
    for entry in INTERCEPT_TABLE {
        println!("  {:<28} {}", entry.name, entry.kind.as_str());
    }
    println!();
    println!("Required downstream:");
    for name in REQUIRED_FUNCTIONS {
        println!("  {}", name);
    }
    Ok(())
}

fn cmd_config(default: bool) -> Result<()> {
    if default {
        print!("{}", Config::default_toml()?);
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;
    print!("{}", config.to_toml()?);

    println!();
    println!("# Search paths:");
    for path in config_search_paths() {
        let state = if path.exists() { "found" } else { "missing" };
        println!("#   {} ({})", path.display(), state);
    }
    Ok(())
}
