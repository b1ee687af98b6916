//! Stack Assembler CLI
//!
//! Usage:
//!   stack-assembler [OPTIONS] <STACK>
//!
//! Options:
//!   -c, --config <FILE>  Stack configuration file (TOML format)
//!   -o, --output <FILE>  Write the template to a file instead of stdout
//!   --compact            Single-line JSON
//!   --strict             Fail on unused parameters and conditions
//!   -l, --list           List the built-in stacks
//!   -h, --help           Print help

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use stack_assembler::{assemble_with_advisories, StackConfig, StackKind};

#[derive(Parser)]
#[command(name = "stack-assembler")]
#[command(about = "Assemble provisioning templates from typed stack definitions")]
struct Cli {
    /// Stack to build (see --list)
    #[arg(required_unless_present = "list")]
    stack: Option<String>,

    /// Stack configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file, truncated if it exists (stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write single-line JSON
    #[arg(long)]
    compact: bool,

    /// Fail on unused parameters and conditions
    #[arg(long)]
    strict: bool,

    /// List the built-in stacks
    #[arg(short, long)]
    list: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.list {
        print_stacks();
        return;
    }

    let name = cli.stack.unwrap_or_default();
    let kind: StackKind = match name.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => match StackConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => StackConfig::default(),
    };
    if cli.compact {
        config = config.with_pretty(false);
    }
    if cli.strict {
        config = config.with_strict_lint();
    }

    let document = match kind.build(&config) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error building stack '{}': {}", kind, e);
            std::process::exit(1);
        }
    };

    let json = match assemble_with_advisories(&document, &config.assemble) {
        Ok((json, advisories)) => {
            if !advisories.is_empty() {
                info!(count = advisories.len(), stack = %kind, "assembled with advisories");
            }
            json
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = fs::write(path, format!("{}\n", json)) {
                eprintln!("Error writing file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
            println!("Template written to: {}", path.display());
        }
        None => println!("{}", json),
    }
}

fn print_stacks() {
    for kind in StackKind::ALL {
        println!("{:<8} {}  ({})", kind.name(), kind.description(), kind.file_name());
    }
}
