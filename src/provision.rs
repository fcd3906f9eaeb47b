//! `openai-asst` commands: create assistants, upload files, inspect accounts.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use assistant_gateway_openai::OpenAiGateway;
use assistants_api::{AssistantObject, AssistantTool, CreateAssistantRequest, ListParams};
use session_store::{SessionStore, ASSISTANT_KEY};

use crate::config::{AppConfig, ASSISTANT_VAR, INSTRUCTION_VAR};
use crate::format::{human_size, local_timestamp};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const MAX_CREATE_FILES: usize = 2;
pub const MAX_UPLOAD_FILES: usize = 20;
pub const LIST_LIMIT: u32 = 20;
const FILE_PURPOSE: &str = "assistants";
const SEPARATOR: &str = "------------------------------------------------------------";

/// Parameters of `openai-asst create`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateAssistant {
    pub name: String,
    pub model: String,
    pub files: Vec<PathBuf>,
    pub file_ids: Vec<String>,
}

/// Tools enabled through configuration.
pub fn configured_tools(config: &AppConfig) -> Vec<AssistantTool> {
    let mut tools = Vec::new();
    if config.code_interpreter {
        tools.push(AssistantTool::CodeInterpreter);
    }
    if config.retrieval {
        tools.push(AssistantTool::FileSearch);
    }
    tools
}

/// Splits a comma separated id list, dropping blanks.
pub fn parse_file_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates the request, uploads local files, creates the assistant and
/// remembers it as the default in the session store.
pub fn create_assistant<W: Write>(
    gateway: &OpenAiGateway,
    config: &AppConfig,
    store: &SessionStore,
    request: CreateAssistant,
    out: &mut W,
) -> anyhow::Result<AssistantObject> {
    let Some(instructions) = config.assistant_instruction.as_deref() else {
        bail!("assistant instructions are missing; set {INSTRUCTION_VAR} in .env");
    };
    if request.files.len() > MAX_CREATE_FILES {
        bail!("at most {MAX_CREATE_FILES} files can be attached when creating an assistant");
    }

    let mut file_ids = request.file_ids;
    file_ids.extend(upload_files(gateway, &request.files, out)?);
    tracing::debug!(?file_ids, "creating assistant");

    let create = CreateAssistantRequest::new(request.name, request.model, instructions)
        .with_tools(configured_tools(config))
        .with_file_ids(file_ids);
    let assistant = gateway
        .block_on(gateway.client().create_assistant(&create))
        .context("creating assistant")?;

    write_assistant(out, &assistant)?;
    store.set(ASSISTANT_KEY, &assistant.id)?;
    tracing::info!(assistant_id = %assistant.id, "assistant recorded as default");
    Ok(assistant)
}

/// Uploads each file for use by assistants and returns the new file ids.
///
/// A file that cannot be read is reported and skipped; API failures abort.
pub fn upload_files<W: Write>(
    gateway: &OpenAiGateway,
    paths: &[PathBuf],
    out: &mut W,
) -> anyhow::Result<Vec<String>> {
    if paths.len() > MAX_UPLOAD_FILES {
        bail!("at most {MAX_UPLOAD_FILES} files can be uploaded at once");
    }

    let mut ids = Vec::with_capacity(paths.len());
    for path in paths {
        match gateway.block_on(gateway.client().upload_file(path, FILE_PURPOSE)) {
            Ok(file) => {
                writeln!(
                    out,
                    "File: {} was created of {}",
                    file.id,
                    human_size(file.bytes)
                )?;
                ids.push(file.id);
            }
            Err(error @ assistants_api::AssistantsApiError::File { .. }) => {
                tracing::error!(%error, "skipping file");
            }
            Err(error) => {
                return Err(error).with_context(|| format!("uploading {}", path.display()));
            }
        }
    }
    Ok(ids)
}

pub fn assistant_info<W: Write>(
    gateway: &OpenAiGateway,
    store: &SessionStore,
    config: &AppConfig,
    assistant_id: Option<&str>,
    out: &mut W,
) -> anyhow::Result<AssistantObject> {
    let assistant_id = match assistant_id {
        Some(id) => id.to_string(),
        None => store
            .get(ASSISTANT_KEY)?
            .filter(|id| !id.trim().is_empty())
            .or_else(|| config.assistant_id.clone())
            .with_context(|| {
                format!("an assistant id must be given as argument or as {ASSISTANT_VAR}")
            })?,
    };

    let assistant = gateway
        .block_on(gateway.client().retrieve_assistant(&assistant_id))
        .with_context(|| format!("retrieving assistant {assistant_id}"))?;
    write_assistant(out, &assistant)?;
    Ok(assistant)
}

/// Prints the most recent assistants of the account, newest first.
pub fn list_assistants<W: Write>(
    gateway: &OpenAiGateway,
    out: &mut W,
) -> anyhow::Result<Vec<AssistantObject>> {
    let params = ListParams {
        order: Some("desc".to_string()),
        after: None,
        limit: Some(LIST_LIMIT),
    };
    let page = gateway
        .block_on(gateway.client().list_assistants(&params))
        .context("listing assistants")?;
    for assistant in &page.data {
        write_assistant(out, assistant)?;
        writeln!(out, "{SEPARATOR}")?;
    }
    Ok(page.data)
}

/// Prints the size of each local file.
pub fn check_files<W: Write>(paths: &[PathBuf], out: &mut W) -> anyhow::Result<()> {
    for path in paths {
        let size = file_size(path)?;
        writeln!(out, "Size of {} is {}", path.display(), human_size(size))?;
    }
    Ok(())
}

fn file_size(path: &Path) -> anyhow::Result<u64> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(metadata.len())
}

pub fn write_assistant<W: Write>(out: &mut W, assistant: &AssistantObject) -> std::io::Result<()> {
    writeln!(
        out,
        "  AsstId: {} | Created: {}",
        assistant.id,
        local_timestamp(assistant.created_at)
    )?;
    writeln!(
        out,
        "  Name: {} \t\t\t| Model: {}",
        assistant.name.as_deref().unwrap_or("-"),
        assistant.model
    )?;
    writeln!(out, "  Files: [{}]", assistant.file_ids().join(", "))?;
    writeln!(out, "  Tools: [{}]", assistant.tool_names().join(", "))?;
    writeln!(
        out,
        "  Instructions: {}",
        assistant.instructions.as_deref().unwrap_or("")
    )
}
