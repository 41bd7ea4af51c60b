//! reloc - split rendered template output into sections and relocate them
//!
//! Usage:
//!   reloc [OPTIONS] <COMMAND>
//!
//! Commands:
//!   render   Relocate sections and print the final document
//!   split    Print the main buffer and every section separately
//!   section  Print a single section
//!   check    Parse only and report what was found
//!   emit     Print marker text for use in templates

mod config;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser as ClapParser, Subcommand};
use log::{debug, info};
use relocation_core::{
    begin_section, end_section, inject_here, MemoryStore, NameError, ParseError, PipelineError,
    Relocated, SectionStore,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Loader, PipelineConfigError, RelocConfig};

#[derive(Debug, ClapParser)]
#[command(name = "reloc", version, about = "Relocate sections in rendered template output")]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Accept section blocks that are never closed
    #[arg(long, global = true)]
    allow_unclosed: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Relocate sections and print the final document
    Render {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print the main buffer and every section separately
    Split {
        #[command(flatten)]
        input: InputArgs,
        /// Output JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Print a single section
    Section {
        #[command(flatten)]
        input: InputArgs,
        /// Section name
        name: String,
    },
    /// Parse only and report markers and sections
    Check {
        /// Input file, `-` for stdin
        file: String,
        /// Output JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Print marker text for use in templates
    Emit {
        #[command(subcommand)]
        marker: EmitCommand,
    },
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Input file, `-` for stdin
    file: String,
    /// Document id handed to processors (defaults to the file name)
    #[arg(short, long)]
    document: Option<String>,
    /// Skip the configured processors
    #[arg(long)]
    no_pipeline: bool,
}

#[derive(Debug, Subcommand)]
enum EmitCommand {
    /// Marker opening a capture block
    Start { name: String },
    /// Marker closing the innermost capture block
    End,
    /// Marker injecting a section
    Inject { name: String },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Process(#[from] PipelineError),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("no section named {0:?}")]
    MissingSection(String),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    debug!("configuration: {:?}", config);

    match cli.command {
        Command::Render { input } => cmd_render(&config, &input),
        Command::Split { input, json } => cmd_split(&config, &input, json),
        Command::Section { input, name } => cmd_section(&config, &input, &name),
        Command::Check { file, json } => cmd_check(&config, &file, json),
        Command::Emit { marker } => cmd_emit(marker),
    }
}

fn load_config(cli: &Cli) -> Result<RelocConfig, CliError> {
    let mut loader = Loader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    if cli.allow_unclosed {
        loader = loader.set_override("parser.allow_unclosed_sections", true)?;
    }
    Ok(loader.build()?)
}

fn read_input(file: &str) -> Result<String, CliError> {
    let read = if file == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        fs::read_to_string(file)
    };
    read.map_err(|source| CliError::Read {
        path: file.to_string(),
        source,
    })
}

fn document_id(input: &InputArgs) -> String {
    if let Some(id) = &input.document {
        return id.clone();
    }
    Path::new(&input.file)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string())
}

/// Parse the input and, unless disabled, run the configured processors.
fn process<'a>(
    config: &RelocConfig,
    input: &InputArgs,
    text: &'a str,
    store: &Arc<MemoryStore>,
) -> Result<Relocated<'a>, CliError> {
    if input.no_pipeline {
        return Ok(config.parser().parse(text)?);
    }
    let pipeline = config.pipeline(store)?;
    let document = document_id(input);
    info!(
        "running {} processor(s) on {:?}: {:?}",
        pipeline.len(),
        document,
        pipeline.names()
    );
    Ok(pipeline.run(&document, text)?)
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_render(config: &RelocConfig, input: &InputArgs) -> Result<(), CliError> {
    let text = read_input(&input.file)?;
    let store = Arc::new(MemoryStore::new());
    let relocated = process(config, input, &text, &store)?;
    print!("{}", relocated.render());
    Ok(())
}

#[derive(Serialize)]
struct SplitOutput<'a> {
    main: String,
    sections: BTreeMap<&'a str, String>,
    stored: Vec<StoredOutput>,
}

#[derive(Serialize)]
struct StoredOutput {
    key: String,
    mimetype: String,
    content: String,
}

fn cmd_split(config: &RelocConfig, input: &InputArgs, json: bool) -> Result<(), CliError> {
    let text = read_input(&input.file)?;
    let store = Arc::new(MemoryStore::new());
    let relocated = process(config, input, &text, &store)?;

    if json {
        let mut stored = Vec::new();
        for key in store.keys() {
            if let Ok(Some(section)) = store.get(&key) {
                stored.push(StoredOutput {
                    key: key.to_string(),
                    mimetype: section.mimetype,
                    content: section.content,
                });
            }
        }
        let output = SplitOutput {
            main: relocated.render(),
            sections: relocated
                .sections()
                .map(|(name, section)| (name, section.flatten()))
                .collect(),
            stored,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("=== main ===");
    println!("{}", relocated.main());
    for (name, section) in relocated.sections() {
        println!("=== {} ===", name);
        println!("{}", section);
    }
    Ok(())
}

fn cmd_section(config: &RelocConfig, input: &InputArgs, name: &str) -> Result<(), CliError> {
    let text = read_input(&input.file)?;
    let store = Arc::new(MemoryStore::new());
    let relocated = process(config, input, &text, &store)?;
    let section = relocated
        .section(name)
        .ok_or_else(|| CliError::MissingSection(name.to_string()))?;
    print!("{}", section);
    Ok(())
}

fn cmd_check(config: &RelocConfig, file: &str, json: bool) -> Result<(), CliError> {
    let text = read_input(file)?;
    match config.parser().parse(&text) {
        Ok(relocated) => {
            let names: Vec<&str> = relocated.sections().map(|(name, _)| name).collect();
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "markers": relocated.markers(),
                        "sections": names,
                    })
                );
            } else {
                println!(
                    "Valid: {} marker(s), {} section(s)",
                    relocated.markers(),
                    names.len()
                );
                for name in names {
                    println!("  - {}", name);
                }
            }
            Ok(())
        }
        Err(err) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "error": {
                            "kind": err.kind().as_str(),
                            "message": err.to_string(),
                            "span": err.span().map(|s| serde_json::json!({"start": s.start, "end": s.end})),
                        }
                    })
                );
            }
            Err(err.into())
        }
    }
}

fn cmd_emit(marker: EmitCommand) -> Result<(), CliError> {
    let text = match marker {
        EmitCommand::Start { name } => begin_section(&name)?,
        EmitCommand::End => end_section(),
        EmitCommand::Inject { name } => inject_here(&name)?,
    };
    print!("{}", text);
    Ok(())
}
