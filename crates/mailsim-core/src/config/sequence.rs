//! Sequence document loading.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::validation::{ValidationError, Validator};
use crate::operation::Count;

/// Mail store backend named by the sequence document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// In-process mailbox.
    #[default]
    Memory,
    /// Desktop client object model.
    Oom,
    /// REST API over HTTP.
    Http,
    /// REST API through a vendor SDK.
    Sdk,
}

impl ProviderKind {
    /// Parse a provider name, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "oom" => Some(Self::Oom),
            "http" => Some(Self::Http),
            "sdk" => Some(Self::Sdk),
            _ => None,
        }
    }

    /// Name as written in sequence documents.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Memory => "Memory",
            Self::Oom => "OOM",
            Self::Http => "HTTP",
            Self::Sdk => "SDK",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A reference from a group to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    /// Operation name to run.
    pub name: String,
    /// Repetitions of the whole operation; random draws from `[1, 100]`.
    pub iterations: Count,
    /// Seconds to sleep after each repetition.
    pub sleep: Option<u64>,
}

/// Tasks sharing one operation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationGroup {
    /// Group name.
    pub name: String,
    /// Operation file, resolved against the sequence file's directory.
    pub operation_file: PathBuf,
    /// Passes over the task list, at least one.
    pub iterations: u32,
    /// Seconds to sleep after each pass.
    pub sleep: Option<u64>,
    /// Tasks in execution order.
    pub tasks: Vec<TaskRef>,
}

/// A parsed sequence document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceConfig {
    /// Ask the desktop client not to show security prompts.
    pub disable_outlook_prompt: bool,
    /// Directory for the structured log file.
    pub log_file_location: Option<PathBuf>,
    /// Mail store backend.
    pub provider: ProviderKind,
    /// Mailbox to open, provider specific.
    pub mailbox: Option<String>,
    /// Groups in execution order.
    pub groups: Vec<OperationGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "MailSimSequence")]
struct SequenceXml {
    #[serde(rename = "@DisableOutlookPrompt")]
    disable_outlook_prompt: Option<String>,
    #[serde(rename = "@LogFileLocation")]
    log_file_location: Option<String>,
    #[serde(rename = "@Provider")]
    provider: Option<String>,
    #[serde(rename = "@Mailbox")]
    mailbox: Option<String>,
    #[serde(rename = "OperationGroup", default)]
    groups: Vec<GroupXml>,
}

#[derive(Debug, Deserialize)]
struct GroupXml {
    #[serde(rename = "@Name")]
    name: Option<String>,
    #[serde(rename = "@OperationFile")]
    operation_file: Option<String>,
    #[serde(rename = "@Iterations")]
    iterations: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "Task", default)]
    tasks: Vec<TaskXml>,
}

#[derive(Debug, Deserialize)]
struct TaskXml {
    #[serde(rename = "@Name")]
    name: Option<String>,
    #[serde(rename = "@Iterations")]
    iterations: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
}

/// Load and validate a sequence file.
///
/// Relative operation file paths are resolved against the directory holding
/// the sequence file.
///
/// # Errors
///
/// Returns an error if the file is missing, is not an `.xml` file, does not
/// parse, or fails structural validation.
pub fn load_sequence(path: &Path) -> crate::Result<SequenceConfig> {
    super::ensure_xml_file(path, "sequence")?;
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let config = parse_sequence(&content, base_dir)?;
    debug!(
        file = %path.display(),
        groups = config.groups.len(),
        provider = %config.provider,
        "Loaded sequence file"
    );
    Ok(config)
}

/// Parse and validate sequence XML.
///
/// # Errors
///
/// Returns an error if the XML does not parse or fails structural validation.
pub fn parse_sequence(xml: &str, base_dir: &Path) -> crate::Result<SequenceConfig> {
    let raw: SequenceXml = quick_xml::de::from_str(xml)?;
    let mut v = Validator::default();

    let disable_outlook_prompt = v.flag(
        "MailSimSequence",
        "DisableOutlookPrompt",
        raw.disable_outlook_prompt.as_deref(),
    );
    let provider = match raw.provider.as_deref().map(str::trim) {
        None | Some("") => ProviderKind::default(),
        Some(name) => ProviderKind::parse(name).unwrap_or_else(|| {
            v.push(ValidationError::UnknownProvider(name.to_string()));
            ProviderKind::default()
        }),
    };

    let groups = raw
        .groups
        .into_iter()
        .map(|group| convert_group(&mut v, group, base_dir))
        .collect();

    v.finish(SequenceConfig {
        disable_outlook_prompt,
        log_file_location: non_blank(raw.log_file_location).map(PathBuf::from),
        provider,
        mailbox: non_blank(raw.mailbox),
        groups,
    })
}

fn convert_group(v: &mut Validator, raw: GroupXml, base_dir: &Path) -> OperationGroup {
    let name = v.required("OperationGroup", "Name", raw.name.as_deref());
    let file = v.required(&name, "OperationFile", raw.operation_file.as_deref());
    let iterations = v
        .number(&name, "Iterations", raw.iterations.as_deref())
        .unwrap_or(1);
    if iterations == 0 {
        v.push(ValidationError::ZeroIterations {
            group: name.clone(),
        });
    }
    let sleep = v.number(&name, "Sleep", raw.sleep.as_deref());
    let tasks = raw
        .tasks
        .into_iter()
        .map(|task| convert_task(v, task))
        .collect();

    OperationGroup {
        operation_file: base_dir.join(file),
        name,
        iterations,
        sleep,
        tasks,
    }
}

fn convert_task(v: &mut Validator, raw: TaskXml) -> TaskRef {
    let name = v.required("Task", "Name", raw.name.as_deref());
    let iterations = Count::parse(raw.iterations.as_deref()).unwrap_or_else(|| {
        v.push(ValidationError::InvalidNumber {
            owner: name.clone(),
            field: "Iterations",
            value: raw.iterations.clone().unwrap_or_default(),
        });
        Count::default()
    });
    let sleep = v.number(&name, "Sleep", raw.sleep.as_deref());
    TaskRef {
        name,
        iterations,
        sleep,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
