use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{HarnessError, InvocationError, Result};

pub const PROMPT_SET_ENV: &str = "SPECBENCH_PROMPT_SET";

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
}

/// What a single invocation returned. `status == false` means the model
/// reported a conflict instead of producing a specification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Invocation {
    pub status: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub usage: Option<Usage>,
}

pub trait ModelBackend {
    fn process(&mut self, input: &str) -> std::result::Result<Invocation, InvocationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSet {
    ConflictDetection,
    Combined,
}

impl PromptSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptSet::ConflictDetection => "conflict_detection",
            PromptSet::Combined => "combined",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "type")]
    pub backend_type: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    models: BTreeMap<String, ModelConfig>,
}

impl ModelCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let catalog: ModelCatalog = serde_yaml::from_str(raw)?;
        for (name, cfg) in &catalog.models {
            if cfg.command.is_empty() {
                return Err(HarnessError::Configuration(format!(
                    "model `{}` has an empty command",
                    name
                )));
            }
        }
        Ok(catalog)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<&ModelConfig> {
        self.models.get(name).ok_or_else(|| {
            HarnessError::Configuration(format!(
                "unknown model `{}` (configured: {})",
                name,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandBackend {
    command: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandBackend {
    pub fn new(config: &ModelConfig, prompt_set: PromptSet) -> Self {
        let mut env = config.env.clone();
        env.insert(PROMPT_SET_ENV.to_string(), prompt_set.as_str().to_string());
        Self {
            command: config.command.clone(),
            env,
        }
    }
}

impl ModelBackend for CommandBackend {
    fn process(&mut self, input: &str) -> std::result::Result<Invocation, InvocationError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| InvocationError::Model("empty model command".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| InvocationError::Model(format!("failed to start {}: {}", program, e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading is judged by its exit status.
            let _ = stdin.write_all(input.as_bytes());
        }
        let output = child
            .wait_with_output()
            .map_err(|e| InvocationError::Model(e.to_string()))?;

        if !output.status.success() {
            let stderr_tail = String::from_utf8_lossy(&output.stderr)
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("model command exited without output")
                .to_string();
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(InvocationError::Model(format!(
                "exit {}: {}",
                code, stderr_tail
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("");
        serde_json::from_str::<Invocation>(line.trim()).map_err(|e| InvocationError::Format {
            message: e.to_string(),
            raw: stdout.trim().to_string(),
        })
    }
}
