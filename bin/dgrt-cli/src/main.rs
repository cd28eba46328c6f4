// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dgrt
//!
//! Command-line interface for the dgraph-rt runtime.
//!
//! ## Usage
//! ```bash
//! # Write the built-in two-segment model
//! dgrt demo ./sample.vgf
//!
//! # Print the container tables (raw or wrapped)
//! dgrt inspect ./sample.vgf
//!
//! # Resolve shapes for concrete inputs
//! dgrt bind ./sample.vgf --shape 1x4
//!
//! # Pipeline 100 inferences on the headless device
//! dgrt run ./sample.vgf --shape 8x4 --iterations 100 --json
//!
//! # Prefix a raw container with the model-data tag and version
//! dgrt wrap ./sample.vgf ./sample.model
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dgrt",
    about = "Data-graph model runtime: inspect, bind and run model containers",
    version,
    author
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a container and print its tables.
    Inspect {
        /// Container or wrapped model data.
        file: PathBuf,
    },

    /// Build the shaped model for concrete input shapes.
    Bind {
        file: PathBuf,

        /// One shape per model input, e.g. "1x4". Repeat in input order.
        #[arg(short, long = "shape", required = true)]
        shapes: Vec<String>,
    },

    /// Bind, then enqueue and execute inferences on the headless device.
    Run {
        file: PathBuf,

        #[arg(short, long = "shape", required = true)]
        shapes: Vec<String>,

        /// Number of inferences to enqueue.
        #[arg(short = 'n', long, default_value_t = 16)]
        iterations: usize,

        /// Print metrics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a raw container and write it as model data.
    Wrap {
        input: PathBuf,
        output: PathBuf,
    },

    /// Write the built-in two-segment sample container.
    Demo {
        output: PathBuf,

        /// Write wrapped model data instead of a raw container.
        #[arg(long)]
        wrap: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Inspect { file } => commands::inspect::execute(file).await,
        Commands::Bind { file, shapes } => commands::bind::execute(file, shapes, cli.config).await,
        Commands::Run {
            file,
            shapes,
            iterations,
            json,
        } => commands::run::execute(file, shapes, iterations, json, cli.config).await,
        Commands::Wrap { input, output } => commands::wrap::execute(input, output).await,
        Commands::Demo { output, wrap } => commands::demo::execute(output, wrap).await,
    }
}
