use crate::cache::Cache;
use crate::config::{mvx_home, GlobalSettings, ProjectConfig, ToolConfig};
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::interpreter::Interpreter;
use crate::manager::ToolManager;
use crate::platform::{Architecture, Platform};
use crate::tools::ToolRegistry;
use crate::urlrewrite::UrlRewriter;
use clap::{Parser, Subcommand};
use colored::*;

#[derive(Parser)]
#[command(name = "mvx")]
#[command(about = "Project-local build-environment bootstrap", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install every tool the project requires
    Setup {
        /// Install tools one at a time (CI determinism)
        #[arg(long)]
        sequential: bool,

        /// Restrict installation to these tools
        tools: Vec<String>,
    },

    /// Run a configured project command
    Run {
        /// Command name from the project configuration
        command: String,

        /// Extra arguments appended to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Inspect the managed tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Run a script line through the portable interpreter
    Shell {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        script: Vec<String>,
    },

    /// Print the composed project environment
    Env,
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List the registered tools
    List,

    /// List versions of a tool, optionally filtered by prefix
    Search {
        tool: String,
        filter: Option<String>,
    },

    /// Show details for one tool
    Info { tool: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let platform = Platform::current()?;
        let arch = Architecture::current()?;
        let home = mvx_home();
        let settings = GlobalSettings::load(&home)?;

        let registry = ToolRegistry::with_builtins(platform, arch);
        let rewriter = UrlRewriter::new(&settings.url_replacements)?;
        let manager = ToolManager::new(registry, Cache::new(home), rewriter);

        match self.command {
            Commands::Setup { sequential, tools } => {
                let project_root = std::env::current_dir()?;
                let config = ProjectConfig::load(&project_root)?;
                let executor =
                    CommandExecutor::new(config.clone(), manager.clone(), project_root)?;

                executor
                    .around_builtin("setup", async {
                        if tools.is_empty() {
                            manager.install_tools(&config, sequential).await
                        } else {
                            manager
                                .install_specific_tools(&config, &tools, sequential)
                                .await
                        }
                    })
                    .await?;

                println!("{} project tools ready", "✓".green().bold());
                Ok(())
            }

            Commands::Run { command, args } => {
                let project_root = std::env::current_dir()?;
                let config = ProjectConfig::load(&project_root)?;
                let executor = CommandExecutor::new(config, manager, project_root)?;
                executor.execute_command(&command, &args).await
            }

            Commands::Tools { command } => match command {
                ToolsCommands::List => {
                    for adapter in manager.registry().all() {
                        println!(
                            "{:<8} {}",
                            adapter.name().cyan(),
                            adapter.description().dimmed()
                        );
                    }
                    Ok(())
                }
                ToolsCommands::Search { tool, filter } => {
                    let versions = manager
                        .registry()
                        .search_versions(&tool, &ToolConfig::default(), filter.as_deref())
                        .await?;
                    for version in versions {
                        println!("{}", version);
                    }
                    Ok(())
                }
                ToolsCommands::Info { tool } => {
                    let info = manager.registry().info(&tool)?;
                    println!("{} - {}", info.name.cyan().bold(), info.description);
                    if !info.distributions.is_empty() {
                        println!("distributions:");
                        for dist in info.distributions {
                            println!("  {:<10} {}", dist.name, dist.description.dimmed());
                        }
                    }
                    if !info.dependencies.is_empty() {
                        println!("depends on: {}", info.dependencies.join(", "));
                    }
                    Ok(())
                }
            },

            Commands::Shell { script } => {
                let cwd = std::env::current_dir()?.canonicalize()?;
                let env = std::env::vars().collect();
                let mut interpreter = Interpreter::new(cwd, env);
                interpreter.execute(&script.join(" ")).await
            }

            Commands::Env => {
                let project_root = std::env::current_dir()?;
                let config = ProjectConfig::load(&project_root)?;
                let env = manager.setup_environment(&config).await?;
                for (key, value) in env {
                    println!("{}={}", key, value);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_passthrough_args() {
        let cli = Cli::parse_from(["mvx", "run", "build", "--", "-DskipTests"]);
        match cli.command {
            Commands::Run { command, args } => {
                assert_eq!(command, "build");
                assert!(args.contains(&"-DskipTests".to_string()));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn cli_parses_setup_flags() {
        let cli = Cli::parse_from(["mvx", "setup", "--sequential", "java", "maven"]);
        match cli.command {
            Commands::Setup { sequential, tools } => {
                assert!(sequential);
                assert_eq!(tools, vec!["java", "maven"]);
            }
            _ => panic!("expected setup subcommand"),
        }
    }
}
