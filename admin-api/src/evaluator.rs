//! Template evaluation with an explicit capability set.
//!
//! The render service exists to be exploitable: with the default
//! capabilities a template can inspect process state through the `runtime`
//! object and call host functions that read the filesystem and environment.
//! Turning a capability off removes the corresponding surface entirely.

use minijinja::value::{Enumerator, Object};
use minijinja::{context, Environment, Error, ErrorKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// What a submitted template is allowed to reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorCapabilities {
    /// Expose the `runtime` host object and its attributes
    pub allow_attribute_access: bool,
    /// Register `read_file`, `list_dir` and `getenv`
    pub allow_callables: bool,
}

impl EvaluatorCapabilities {
    pub const UNRESTRICTED: Self = Self {
        allow_attribute_access: true,
        allow_callables: true,
    };

    pub const RESTRICTED: Self = Self {
        allow_attribute_access: false,
        allow_callables: false,
    };
}

/// The shipped service runs unrestricted.
impl Default for EvaluatorCapabilities {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}

/// Fixed values every template is rendered against
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub username: String,
    pub image_url: String,
    pub server_time: String,
    pub notice: String,
}

pub const DEFAULT_IMAGE_URL: &str = "https://example.org/sample.jpg";

impl RenderContext {
    pub fn new(image_url: Option<String>) -> Self {
        Self {
            username: "guest_user".to_string(),
            image_url: image_url.unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            server_time: chrono::Utc::now()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
            notice: "This is an intentionally vulnerable sandbox for CTF use.".to_string(),
        }
    }
}

pub struct TemplateEvaluator {
    env: Environment<'static>,
    capabilities: EvaluatorCapabilities,
    flag_path: PathBuf,
}

impl TemplateEvaluator {
    pub fn new(capabilities: EvaluatorCapabilities, flag_path: impl Into<PathBuf>) -> Self {
        let mut env = Environment::new();

        if capabilities.allow_callables {
            env.add_function("read_file", read_file);
            env.add_function("list_dir", list_dir);
            env.add_function("getenv", getenv);
        }

        Self {
            env,
            capabilities,
            flag_path: flag_path.into(),
        }
    }

    pub fn capabilities(&self) -> EvaluatorCapabilities {
        self.capabilities
    }

    /// Compile `source` and evaluate it against `ctx`
    pub fn render(&self, source: &str, ctx: &RenderContext) -> Result<String, Error> {
        let runtime = if self.capabilities.allow_attribute_access {
            Value::from_object(RuntimeObject {
                flag_path: self.flag_path.clone(),
            })
        } else {
            Value::UNDEFINED
        };

        self.env.render_str(
            source,
            context! {
                username => &ctx.username,
                image_url => &ctx.image_url,
                server_time => &ctx.server_time,
                notice => &ctx.notice,
                runtime => runtime,
            },
        )
    }
}

impl std::fmt::Debug for TemplateEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEvaluator")
            .field("capabilities", &self.capabilities)
            .field("flag_path", &self.flag_path)
            .finish()
    }
}

/// Process introspection exposed to templates as `runtime`
#[derive(Debug)]
struct RuntimeObject {
    flag_path: PathBuf,
}

impl Object for RuntimeObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "env" => {
                let vars: BTreeMap<String, String> = std::env::vars().collect();
                Some(Value::from_serialize(&vars))
            }
            "cwd" => std::env::current_dir()
                .ok()
                .map(|dir| Value::from(dir.display().to_string())),
            "pid" => Some(Value::from(std::process::id())),
            "user" => std::env::var("USER").ok().map(Value::from),
            "flag_path" => Some(Value::from(self.flag_path.display().to_string())),
            _ => None,
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["env", "cwd", "pid", "user", "flag_path"])
    }
}

fn read_file(path: String) -> Result<String, Error> {
    std::fs::read_to_string(&path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("read_file({}): {}", path, e),
        )
    })
}

fn list_dir(path: String) -> Result<Vec<String>, Error> {
    let entries = std::fs::read_dir(&path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("list_dir({}): {}", path, e),
        )
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

fn getenv(name: String) -> Value {
    std::env::var(name).map(Value::from).unwrap_or(Value::UNDEFINED)
}
