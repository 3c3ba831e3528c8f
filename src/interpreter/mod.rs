//! The portable command interpreter (`mvx-shell`): a deliberately tiny
//! cross-platform runner for configured project commands. It is not a shell;
//! scripts that need one should use the native interpreter.

mod builtins;
mod tokenizer;

pub use tokenizer::{ChainSpec, Operator};

use crate::error::{MvxError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// One parsed command invocation: name, arguments, and the environment
/// overrides collected from leading `NAME=VALUE` words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

pub struct Interpreter {
    cwd: PathBuf,
    env: HashMap<String, String>,
}

impl Interpreter {
    /// The working directory must be absolute; each execute call starts
    /// fresh from it, and `cd` only lives for that call.
    pub fn new(cwd: PathBuf, env: HashMap<String, String>) -> Self {
        Self { cwd, env }
    }

    pub async fn execute(&mut self, script: &str) -> Result<()> {
        let chains = tokenizer::parse(script)?;
        let mut last_error: Option<MvxError> = None;

        for chain in chains {
            if let Err(err) = self.run_chain(&chain).await {
                last_error = Some(err);
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_chain(&mut self, chain: &ChainSpec) -> Result<()> {
        let mut outcome: Result<()> = Ok(());

        for (index, slab) in chain.slabs.iter().enumerate() {
            if index > 0 {
                // A skipped command leaves the outcome untouched, so a later
                // operator still sees the result that caused the skip.
                let runs = match chain.operators[index - 1] {
                    // `|` runs sequentially with `&&` skip-on-failure
                    // semantics; real piping is a future extension.
                    Operator::And | Operator::Pipe => outcome.is_ok(),
                    Operator::Or => outcome.is_err(),
                };
                if !runs {
                    continue;
                }
            }

            let command = self.prepare(slab)?;
            outcome = self.run_command(&command).await;
        }

        outcome
    }

    fn prepare(&self, slab: &str) -> Result<Command> {
        let mut command = parse_command(slab)?;
        command.name = expand(&command.name, &command.env, &self.env);
        command.args = command
            .args
            .iter()
            .map(|arg| expand(arg, &command.env, &self.env))
            .collect();
        Ok(command)
    }

    async fn run_command(&mut self, command: &Command) -> Result<()> {
        debug!("running {} {:?}", command.name, command.args);
        if builtins::is_builtin(&command.name) {
            return builtins::run(&command.name, &command.args, &mut self.cwd);
        }
        self.run_external(command).await
    }

    async fn run_external(&self, command: &Command) -> Result<()> {
        let status = tokio::process::Command::new(&command.name)
            .args(&command.args)
            .current_dir(&self.cwd)
            .env_clear()
            .envs(&self.env)
            .envs(&command.env)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(MvxError::CommandFailed(status.code().unwrap_or(-1)))
        }
    }
}

/// Split a slab into a command on ASCII whitespace, peeling leading
/// `NAME=VALUE` assignments into the per-invocation environment. Quotes are
/// not interpreted at this level.
fn parse_command(slab: &str) -> Result<Command> {
    let words: Vec<&str> = slab.split_ascii_whitespace().collect();
    let mut env = HashMap::new();
    let mut rest = words.as_slice();

    while let Some((first, tail)) = rest.split_first() {
        match split_assignment(first) {
            Some((name, value)) => {
                env.insert(name.to_string(), value.to_string());
                rest = tail;
            }
            None => break,
        }
    }

    let (name, args) = rest
        .split_first()
        .ok_or_else(|| MvxError::Parse(format!("missing command name in {:?}", slab)))?;

    Ok(Command {
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        env,
    })
}

fn split_assignment(word: &str) -> Option<(&str, &str)> {
    if word.starts_with('-') {
        return None;
    }
    let (name, value) = word.split_once('=')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, value))
}

/// Textual variable expansion: `${VAR}` spans first, then bare `$VAR` with
/// the longest identifier match. Command env shadows shell env; unset
/// variables expand to empty. No word-splitting afterwards.
fn expand(
    input: &str,
    command_env: &HashMap<String, String>,
    shell_env: &HashMap<String, String>,
) -> String {
    let lookup = |name: &str| -> String {
        command_env
            .get(name)
            .or_else(|| shell_env.get(name))
            .cloned()
            .unwrap_or_default()
    };

    // Pass 1: ${VAR} spans.
    let mut braced = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        braced.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                braced.push_str(&lookup(name));
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                // Unterminated span stays literal.
                braced.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    braced.push_str(rest);

    // Pass 2: bare $VAR, longest identifier wins.
    let chars: Vec<char> = braced.chars().collect();
    let mut out = String::with_capacity(braced.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' {
            let mut end = i + 1;
            if end < chars.len() && (chars[end].is_ascii_alphabetic() || chars[end] == '_') {
                end += 1;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[i + 1..end].iter().collect();
                out.push_str(&lookup(&name));
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}
