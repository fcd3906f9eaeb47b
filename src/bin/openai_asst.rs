use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use assistant_gateway_openai::OpenAiGateway;
use clap::{Parser, Subcommand};
use openai_cli::config::{AppConfig, DOTENV_FILE};
use openai_cli::provision::{self, CreateAssistant, DEFAULT_MODEL};
use openai_cli::logging;
use session_store::{SessionStore, DEFAULT_STORE_FILE};

#[derive(Parser)]
#[command(name = "openai-asst")]
#[command(about = "Create and manage OpenAI assistants along with files from command line", long_about = None)]
#[command(version)]
struct Cli {
    /// Session store that receives the created assistant id
    #[arg(long, global = true, env = "OPENAI_CLI_STORE", default_value = DEFAULT_STORE_FILE)]
    store: PathBuf,

    /// Log request details to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an assistant in OpenAI platform
    Create {
        name: String,
        #[arg(short, long, default_value = DEFAULT_MODEL)]
        model: String,
        /// Local file to upload and attach (at most 2)
        #[arg(short, long = "files")]
        files: Vec<PathBuf>,
        /// Comma separated ids of files already uploaded
        #[arg(long = "file-ids", alias = "file_ids")]
        file_ids: Option<String>,
    },
    /// Create files in OpenAI platform to use with assistants
    File {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
    /// Get detailed information about a particular assistant
    Info { id: Option<String> },
    /// List assistants linked with OpenAI platform account
    List,
    /// Check file paths and their size
    Checkfile {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config =
        AppConfig::load(&cli.store, Path::new(DOTENV_FILE)).context("loading configuration")?;
    logging::init(cli.debug || config.debug);

    let mut stdout = io::stdout().lock();
    if let Command::Checkfile { files } = &cli.command {
        return provision::check_files(files, &mut stdout);
    }

    let gateway = OpenAiGateway::new(config.api_config()?)?;
    let store = SessionStore::open(&cli.store);
    match cli.command {
        Command::Create {
            name,
            model,
            files,
            file_ids,
        } => {
            let request = CreateAssistant {
                name,
                model,
                files,
                file_ids: file_ids
                    .as_deref()
                    .map(provision::parse_file_ids)
                    .unwrap_or_default(),
            };
            provision::create_assistant(&gateway, &config, &store, request, &mut stdout)?;
        }
        Command::File { files } => {
            provision::upload_files(&gateway, &files, &mut stdout)?;
        }
        Command::Info { id } => {
            provision::assistant_info(&gateway, &store, &config, id.as_deref(), &mut stdout)?;
        }
        Command::List => {
            provision::list_assistants(&gateway, &mut stdout)?;
        }
        Command::Checkfile { .. } => {}
    }
    Ok(())
}
