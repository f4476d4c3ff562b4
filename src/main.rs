use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;
use textpatch::ops::{handle, Request};

#[derive(Parser)]
#[command(name = "textpatch")]
#[command(about = "Safe line-oriented file editing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a sed-style substitution expression to a file
    PatternSubstitute {
        file: PathBuf,

        /// Substitution expression, e.g. 's/old/new/g'
        pattern: String,

        /// Skip the pre-edit backup
        #[arg(long)]
        no_backup: bool,

        /// Show the diff without modifying the file
        #[arg(short = 'n', long)]
        preview: bool,

        /// Match across line boundaries (whole-file mode)
        #[arg(long)]
        slurp: bool,
    },

    /// Apply one substitution across files matching a glob
    PatternSubstituteMulti {
        /// Substitution expression, e.g. 's/old/new/g'
        pattern: String,

        /// File name glob, e.g. '*.txt'
        file_pattern: String,

        /// Directory to scan (one level, no recursion)
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Skip the pre-edit backups
        #[arg(long)]
        no_backup: bool,
    },

    /// Replace literal text, no pattern language involved
    LiteralReplace {
        file: PathBuf,
        find: String,
        replace: String,

        /// Replace only the first occurrence
        #[arg(long)]
        first: bool,

        /// Skip the pre-edit backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Line-addressed edit: substitute, delete, insert_before, insert_after
    LineEdit {
        file: PathBuf,

        /// One of: substitute, delete, insert_before, insert_after
        action: String,

        /// Single target line (1-based)
        #[arg(short, long)]
        line: Option<usize>,

        /// Target range, e.g. '3,9' or '3,$'
        #[arg(short, long)]
        range: Option<String>,

        /// Content for substitute/insert actions
        #[arg(short, long)]
        content: Option<String>,

        /// Skip the pre-edit backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Run an awk program over a file
    ColumnProcess {
        file: PathBuf,

        /// awk program, e.g. '{ print $2 }'
        script: String,

        /// Write awk output here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore a file from its .bak backup
    Restore {
        file: PathBuf,

        /// Delete the consumed backup after a successful restore
        #[arg(long)]
        delete_backup: bool,
    },

    /// List backup files in a directory
    ListBackups {
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// File name glob for backups
        #[arg(short, long, default_value = "*.bak")]
        pattern: String,
    },

    /// Print a file, an addressed range, or search hits with context
    Read {
        file: PathBuf,

        /// Range to print, e.g. '3,9' or '3,$'
        #[arg(short, long)]
        lines: Option<String>,

        /// Pattern to search for instead of printing lines
        #[arg(short, long)]
        search: Option<String>,

        /// Context lines around each search hit
        #[arg(short, long, default_value_t = 3)]
        context: usize,
    },

    /// Search a file, one context block per matching line
    Search {
        file: PathBuf,
        pattern: String,

        /// Context lines around each hit
        #[arg(short, long, default_value_t = 3)]
        context: usize,

        /// Case-insensitive matching
        #[arg(short = 'i', long)]
        ignore_case: bool,
    },

    /// Show a context window around one line
    ShowContext {
        file: PathBuf,

        /// Center line (1-based)
        line_number: usize,

        /// Context lines on each side
        #[arg(short, long, default_value_t = 5)]
        context: usize,
    },

    /// Handle a JSON request from stdin or a file (automated clients)
    Request {
        /// Path to a JSON request; reads stdin when omitted
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let request = build_request(cli.command)?;

    match handle(&request) {
        Ok(payload) => {
            println!("{}", payload.trim_end_matches('\n'));
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

/// Translate a CLI invocation into the same request an automated client
/// would send.
fn build_request(command: Commands) -> Result<Request> {
    Ok(match command {
        Commands::PatternSubstitute {
            file,
            pattern,
            no_backup,
            preview,
            slurp,
        } => Request::PatternSubstitute {
            file,
            pattern,
            backup: !no_backup,
            preview,
            slurp,
        },
        Commands::PatternSubstituteMulti {
            pattern,
            file_pattern,
            directory,
            no_backup,
        } => Request::PatternSubstituteMulti {
            pattern,
            file_pattern,
            directory,
            backup: !no_backup,
        },
        Commands::LiteralReplace {
            file,
            find,
            replace,
            first,
            no_backup,
        } => Request::LiteralReplace {
            file,
            find,
            replace,
            all: !first,
            backup: !no_backup,
        },
        Commands::LineEdit {
            file,
            action,
            line,
            range,
            content,
            no_backup,
        } => Request::LineEdit {
            file,
            action,
            line_number: line,
            line_range: range,
            content,
            backup: !no_backup,
        },
        Commands::ColumnProcess {
            file,
            script,
            output,
        } => Request::ColumnProcess {
            file,
            script,
            output_file: output,
        },
        Commands::Restore {
            file,
            delete_backup,
        } => Request::Restore {
            file,
            keep_backup: !delete_backup,
        },
        Commands::ListBackups { directory, pattern } => {
            Request::ListBackups { directory, pattern }
        }
        Commands::Read {
            file,
            lines,
            search,
            context,
        } => Request::Read {
            file,
            lines,
            search,
            context,
        },
        Commands::Search {
            file,
            pattern,
            context,
            ignore_case,
        } => Request::Search {
            file,
            pattern,
            context,
            case_insensitive: ignore_case,
        },
        Commands::ShowContext {
            file,
            line_number,
            context,
        } => Request::ShowContext {
            file,
            line_number,
            context,
        },
        Commands::Request { input } => {
            let text = match input {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read request from {}", path.display()))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("failed to read request from stdin")?;
                    buffer
                }
            };
            serde_json::from_str(&text).context("failed to parse JSON request")?
        }
    })
}
