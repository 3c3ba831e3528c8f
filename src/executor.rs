use crate::config::{CommandConfig, InterpreterKind, ProjectConfig, ScriptSpec};
use crate::error::{MvxError, Result};
use crate::interpreter::Interpreter;
use crate::manager::ToolManager;
use crate::platform::Platform;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info};

/// Runs configured project commands: resolves the platform script variant,
/// ensures the required tools, composes the effective environment and
/// dispatches to the portable interpreter or the native shell.
pub struct CommandExecutor {
    config: ProjectConfig,
    manager: ToolManager,
    project_root: PathBuf,
    platform: Platform,
}

impl CommandExecutor {
    pub fn new(config: ProjectConfig, manager: ToolManager, project_root: PathBuf) -> Result<Self> {
        // Spawned processes must never see a relative working directory.
        let project_root = project_root.canonicalize()?;
        Ok(Self {
            config,
            manager,
            project_root,
            platform: Platform::current()?,
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Execute a configured command with extra user arguments appended.
    pub async fn execute_command(&self, name: &str, args: &[String]) -> Result<()> {
        let command = self
            .config
            .commands
            .get(name)
            .ok_or_else(|| MvxError::UnknownCommand(name.to_string()))?;

        let script = self.resolve_script(name, command)?;
        let script = append_args(&script, args);
        let interpreter = choose_interpreter(command);
        let (env, workdir) = self.command_env(name).await.map(|(mut env, workdir)| {
            for (key, value) in &command.environment {
                env.insert(key.clone(), value.clone());
            }
            (env, workdir)
        })?;

        let workdir = match &command.working_dir {
            Some(dir) => self.project_root.join(dir).canonicalize()?,
            None => workdir,
        };

        if let Some(pre) = &command.pre {
            debug!("running pre hook for {}", name);
            self.dispatch(pre, interpreter, &env, &workdir).await?;
        }

        info!("running command {}", name);
        self.dispatch(&script, interpreter, &env, &workdir).await?;

        if let Some(post) = &command.post {
            debug!("running post hook for {}", name);
            self.dispatch(post, interpreter, &env, &workdir).await?;
        }

        Ok(())
    }

    /// Wrap a CLI built-in: an `override` command replaces it entirely,
    /// a plain command config sandwiches it between `pre` and `post`.
    pub async fn around_builtin<F>(&self, name: &str, default: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match self.config.commands.get(name) {
            Some(command) if command.override_builtin => self.execute_command(name, &[]).await,
            Some(command) => {
                let interpreter = choose_interpreter(command);
                let (mut env, workdir) = self.command_env(name).await?;
                for (key, value) in &command.environment {
                    env.insert(key.clone(), value.clone());
                }

                if let Some(pre) = &command.pre {
                    self.dispatch(pre, interpreter, &env, &workdir).await?;
                }
                default.await?;
                if let Some(post) = &command.post {
                    self.dispatch(post, interpreter, &env, &workdir).await?;
                }
                Ok(())
            }
            None => default.await,
        }
    }

    /// Pick the script variant for this platform. Match order: exact OS key,
    /// `unix` on non-Windows, then `default`.
    fn resolve_script(&self, name: &str, command: &CommandConfig) -> Result<String> {
        match &command.script {
            ScriptSpec::Single(script) => Ok(script.clone()),
            ScriptSpec::PerPlatform(map) => {
                if let Some(script) = map.get(self.platform.script_key()) {
                    return Ok(script.clone());
                }
                if !self.platform.is_windows() {
                    if let Some(script) = map.get("unix") {
                        return Ok(script.clone());
                    }
                }
                if let Some(script) = map.get("default") {
                    return Ok(script.clone());
                }
                Err(MvxError::NoPlatformScript {
                    command: name.to_string(),
                    os: self.platform.script_key().to_string(),
                })
            }
        }
    }

    /// Effective environment for a command: process env, overlaid with the
    /// config's globals, each required tool's contribution, and finally the
    /// tool bin directories prepended to PATH in configured order.
    pub async fn command_env(&self, name: &str) -> Result<(HashMap<String, String>, PathBuf)> {
        let mut env: HashMap<String, String> = std::env::vars().collect();

        for (key, value) in &self.config.environment {
            env.insert(key.clone(), value.clone());
        }

        let mut bin_dirs: Vec<PathBuf> = Vec::new();
        for (tool, tool_cfg) in self.config.tools_for_command(name) {
            let Some(ensured) = self.manager.ensure_tool(tool, tool_cfg).await? else {
                continue;
            };
            let adapter = self.manager.registry().get(tool)?;
            for (key, value) in adapter.env_contribution(tool_cfg, &ensured.install_dir) {
                env.insert(key, value);
            }
            bin_dirs.push(ensured.bin_dir);
        }

        if !bin_dirs.is_empty() {
            let separator = self.platform.path_separator();
            let mut path = bin_dirs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(&separator.to_string());
            if let Some(existing) = env.get("PATH") {
                if !existing.is_empty() {
                    path.push(separator);
                    path.push_str(existing);
                }
            }
            env.insert("PATH".to_string(), path);
        }

        Ok((env, self.project_root.clone()))
    }

    async fn dispatch(
        &self,
        script: &str,
        interpreter: InterpreterKind,
        env: &HashMap<String, String>,
        workdir: &PathBuf,
    ) -> Result<()> {
        match interpreter {
            InterpreterKind::MvxShell => {
                let mut interp = Interpreter::new(workdir.clone(), env.clone());
                interp.execute(script).await
            }
            InterpreterKind::Native => self.run_native(script, env, workdir).await,
        }
    }

    async fn run_native(
        &self,
        script: &str,
        env: &HashMap<String, String>,
        workdir: &PathBuf,
    ) -> Result<()> {
        let mut command = if self.platform.is_windows() {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/c").arg(script);
            c
        } else {
            let mut c = tokio::process::Command::new("/bin/bash");
            c.arg("-c").arg(script);
            c
        };

        let status = command
            .env_clear()
            .envs(env)
            .current_dir(workdir)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(MvxError::CommandFailed(status.code().unwrap_or(-1)))
        }
    }
}

/// Concatenate user arguments onto the script with single spaces.
fn append_args(script: &str, args: &[String]) -> String {
    if args.is_empty() {
        script.to_string()
    } else {
        format!("{} {}", script, args.join(" "))
    }
}

/// Explicit interpreter wins; otherwise a portable one-liner is presumed
/// cross-platform and an OS-keyed map is presumed OS-specific.
fn choose_interpreter(command: &CommandConfig) -> InterpreterKind {
    if let Some(explicit) = command.interpreter {
        return explicit;
    }
    match command.script {
        ScriptSpec::Single(_) => InterpreterKind::MvxShell,
        ScriptSpec::PerPlatform(_) => InterpreterKind::Native,
    }
}
