// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! campipe CLI
//!
//! Inspect product configurations and drive them against virtual hardware.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use campipe::core::config::PipelineSettings;

mod commands;

#[derive(Parser)]
#[command(name = "campipe")]
#[command(author, version, about = "Camera pipeline graph simulator", long_about = None)]
struct Cli {
    /// Runtime settings file (TOML)
    #[arg(long, global = true, default_value = PipelineSettings::FILE_NAME)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a product configuration and print its contents
    Inspect {
        /// Product configuration file (YAML)
        #[arg(value_name = "PRODUCT_FILE")]
        product: PathBuf,

        /// Print the node trees of each config
        #[arg(long)]
        tree: bool,
    },

    /// Build a config on virtual hardware and push frames through it
    Simulate {
        /// Product configuration file (YAML)
        #[arg(value_name = "PRODUCT_FILE")]
        product: PathBuf,

        /// Config index to activate
        #[arg(short, long, default_value = "0")]
        config: u32,

        /// Stream indices to open (default: every stream of the config)
        #[arg(long = "stream", value_name = "INDEX")]
        streams: Vec<u32>,

        /// Sensor frames to emit
        #[arg(short = 'n', long, default_value = "30")]
        frames: u32,

        /// Frames each client may hold at once
        #[arg(long, default_value = "2")]
        buffer_count: u32,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_settings(path: &Path) -> Result<PipelineSettings> {
    let settings = PipelineSettings::load_or_default(path);
    campipe::core::logging::init_logging(&settings.logging)
        .context("Failed to initialize logging")?;
    Ok(settings)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.settings)?;

    match cli.command {
        Some(Commands::Inspect { product, tree }) => {
            commands::inspect::run(&product, tree)?;
        }
        Some(Commands::Simulate {
            product,
            config,
            streams,
            frames,
            buffer_count,
            json,
        }) => {
            let options = commands::simulate::SimulateOptions {
                config_index: config,
                streams,
                frames,
                buffer_count,
            };
            let report = commands::simulate::run(&product, settings, &options)?;
            commands::simulate::print_report(&report, json)?;
        }
        None => {
            // No subcommand: show help
            Cli::parse_from(["campipe", "--help"]);
        }
    }

    Ok(())
}
