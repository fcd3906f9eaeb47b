use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use openai_cli::config::{AppConfig, DOTENV_FILE};
use openai_cli::{chat, logging};
use session_store::DEFAULT_STORE_FILE;

#[derive(Parser)]
#[command(name = "openai-cli")]
#[command(about = "Make conversation with OpenAI models directly from command line", long_about = None)]
#[command(version)]
struct Cli {
    /// Session store remembering the active thread and assistant
    #[arg(long, global = true, env = "OPENAI_CLI_STORE", default_value = DEFAULT_STORE_FILE)]
    store: PathBuf,

    /// Log request and poll details to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List messages in current or given thread
    List {
        /// Thread to list instead of the active one
        thread_id: Option<String>,
    },
    /// Make conversations using OpenAI
    Chat {
        /// Message to send
        message: String,
        /// Start a new conversation thread
        #[arg(long)]
        new: bool,
        /// Assistant id for this message
        #[arg(long)]
        asst: Option<String>,
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

    let manager = chat::session_manager(&config, &cli.store)?;
    let mut stdout = io::stdout().lock();
    match cli.command {
        Command::List { thread_id } => {
            chat::list(&manager, thread_id.as_deref(), &mut stdout)?;
        }
        Command::Chat { message, new, asst } => {
            let manager = manager.with_cancel_signal(chat::install_interrupt_flag()?);
            chat::chat(&manager, &message, new, asst.as_deref(), &mut stdout)?;
        }
    }
    Ok(())
}
