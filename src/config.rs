use crate::error::{MvxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROJECT_CONFIG_DIR: &str = ".mvx";
pub const PROJECT_CONFIG_FILE: &str = "config.json";
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Project-level configuration, read from `.mvx/config.json`. The file is
/// JSON with `//` line comments tolerated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    pub tools: BTreeMap<String, ToolConfig>,
    pub environment: BTreeMap<String, String>,
    pub commands: BTreeMap<String, CommandConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Raw version spec: `21`, `3.9`, `3.9.6`, or `latest`.
    pub version: String,

    /// Vendor variant; meaningful for the JDK only.
    pub distribution: Option<String>,

    /// Commands this tool is required for. Absent means required everywhere.
    pub required_for: Option<Vec<String>>,

    /// Free-form adapter options.
    pub options: Option<BTreeMap<String, String>>,

    pub checksum: Option<ChecksumConfig>,
}

impl ToolConfig {
    pub fn with_version(version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn required_for_command(&self, command: &str) -> bool {
        match &self.required_for {
            Some(commands) => commands.iter().any(|c| c == command),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    #[serde(rename = "type")]
    pub algorithm: String,

    /// Literal hex digest. Takes precedence over `url`.
    pub value: Option<String>,

    /// Location of a checksum file to fetch when `value` is absent.
    pub url: Option<String>,

    /// Line selector for multi-file checksum documents.
    pub filename: Option<String>,

    pub required: bool,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            algorithm: "sha256".to_string(),
            value: None,
            url: None,
            filename: None,
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptSpec {
    /// Portable one-liner, presumed cross-platform.
    Single(String),

    /// Scripts keyed by `windows`/`linux`/`darwin`/`unix`/`default`.
    PerPlatform(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpreterKind {
    #[serde(rename = "native")]
    Native,
    #[serde(rename = "mvx-shell")]
    MvxShell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub description: String,
    pub script: ScriptSpec,
    pub interpreter: Option<InterpreterKind>,
    pub environment: BTreeMap<String, String>,

    /// Working directory relative to the project root.
    pub working_dir: Option<String>,

    pub pre: Option<String>,
    pub post: Option<String>,

    /// When the command name collides with a CLI built-in, replace the
    /// built-in behaviour entirely instead of wrapping it.
    #[serde(rename = "override")]
    pub override_builtin: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            script: ScriptSpec::Single(String::new()),
            interpreter: None,
            environment: BTreeMap::new(),
            working_dir: None,
            pre: None,
            post: None,
            override_builtin: false,
        }
    }
}

impl ProjectConfig {
    /// Load the project configuration from `<root>/.mvx/config.json`.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Err(MvxError::Config(format!(
                "no project configuration at {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(&path)?;
        let stripped = strip_line_comments(&raw);
        let config: ProjectConfig = serde_json::from_str(&stripped)?;
        Ok(config)
    }

    /// Tools required for the given command, in deterministic name order.
    pub fn tools_for_command(&self, command: &str) -> Vec<(&String, &ToolConfig)> {
        self.tools
            .iter()
            .filter(|(_, cfg)| cfg.required_for_command(command))
            .collect()
    }
}

/// Remove `//` line comments from JSON, leaving string contents untouched.
fn strip_line_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Global user settings, read from `$MVX_HOME/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub url_replacements: Vec<crate::urlrewrite::RewriteRuleConfig>,
    pub default_jdk_distribution: Option<String>,
}

impl GlobalSettings {
    pub fn load(mvx_home: &Path) -> Result<Self> {
        let path = mvx_home.join(GLOBAL_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let settings: GlobalSettings = toml::from_str(&raw)?;
        Ok(settings)
    }
}

/// Per-user cache root: `$MVX_HOME` when set, `~/.mvx` otherwise.
pub fn mvx_home() -> PathBuf {
    if let Ok(dir) = std::env::var("MVX_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(shellexpand::tilde(&dir).to_string());
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".mvx"))
        .unwrap_or_else(|| PathBuf::from(shellexpand::tilde("~/.mvx").to_string()))
}

/// `MVX_USE_SYSTEM_<TOOL>=true` directs the manager to skip a tool and rely
/// on whatever the ambient PATH provides.
pub fn is_tool_bypassed(tool: &str) -> bool {
    let key = format!("MVX_USE_SYSTEM_{}", tool.to_uppercase().replace('-', "_"));
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Per-install deadline, overridable via `MVX_INSTALL_TIMEOUT` (`600`,
/// `600s`, or `10m`).
pub fn install_timeout() -> Duration {
    match std::env::var("MVX_INSTALL_TIMEOUT") {
        Ok(raw) => parse_duration(raw.trim()).unwrap_or(DEFAULT_INSTALL_TIMEOUT),
        Err(_) => DEFAULT_INSTALL_TIMEOUT,
    }
}

fn parse_duration(raw: &str) -> Option<Duration> {
    if raw.is_empty() {
        return None;
    }
    if let Some(mins) = raw.strip_suffix('m') {
        return mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60));
    }
    let secs = raw.strip_suffix('s').unwrap_or(raw);
    secs.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
    {
      // project metadata
      "project": { "name": "demo", "description": "demo project" },
      "tools": {
        "java": { "version": "21", "distribution": "temurin" },
        "maven": { "version": "3.9.6", "required_for": ["build"] }
      },
      "environment": { "CI": "false" },
      "commands": {
        "build": { "script": "mvn clean install" },
        "hello": {
          "script": { "windows": "echo W", "unix": "echo U" },
          "interpreter": "native"
        }
      }
    }
    "#;

    fn write_project(dir: &TempDir) {
        let mvx_dir = dir.path().join(PROJECT_CONFIG_DIR);
        std::fs::create_dir_all(&mvx_dir).unwrap();
        std::fs::write(mvx_dir.join(PROJECT_CONFIG_FILE), SAMPLE).unwrap();
    }

    #[test]
    fn loads_commented_json() {
        let dir = TempDir::new().unwrap();
        write_project(&dir);

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.tools["java"].distribution.as_deref(), Some("temurin"));
        assert_eq!(
            config.commands["build"].script,
            ScriptSpec::Single("mvn clean install".to_string())
        );
        assert_eq!(
            config.commands["hello"].interpreter,
            Some(InterpreterKind::Native)
        );
    }

    #[test]
    fn comment_stripping_preserves_urls_in_strings() {
        let stripped = strip_line_comments(r#"{"url": "https://example.com"} // trailing"#);
        assert!(stripped.contains("https://example.com"));
        assert!(!stripped.contains("trailing"));
    }

    #[test]
    fn required_for_scopes_tools_to_commands() {
        let dir = TempDir::new().unwrap();
        write_project(&dir);
        let config = ProjectConfig::load(dir.path()).unwrap();

        let build_tools: Vec<&str> = config
            .tools_for_command("build")
            .into_iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(build_tools, vec!["java", "maven"]);

        let test_tools: Vec<&str> = config
            .tools_for_command("test")
            .into_iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(test_tools, vec!["java"]);
    }

    #[test]
    fn missing_config_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, MvxError::Config(_)));
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("600"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("abc"), None);
    }
}
