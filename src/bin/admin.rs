//! Processing Service Admin CLI
//!
//! Operator tool for inspecting and maintaining Workflows, Rules, Actions and
//! ActionTypes stored in the remote classification service. Every command
//! prints JSON on stdout; logs go to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use processing_service::{
    HttpClassificationClient, InMemoryClassificationStore, PageRequest, ProcessingConfig,
    ProcessingEngine, RemoteStore, Rule, Workflow,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "processing-admin")]
#[command(about = "Processing Service Admin CLI - Manage processing rules over the policy API")]
#[command(version = "1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project the objects belong to
    #[arg(long, env = "CAF_PROCESSING_SERVICE_PROJECT_ID")]
    project_id: String,

    /// Policy API base URL; overrides the host/port/entry path configuration
    #[arg(long, env = "CAF_PROCESSING_SERVICE_POLICY_API_URL")]
    policy_api_url: Option<String>,

    /// Optional configuration file layered under the environment
    #[arg(long)]
    config: Option<String>,

    /// Run against an empty in-process store instead of the policy API
    #[arg(long)]
    in_memory: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Workflow management
    Workflows {
        #[command(subcommand)]
        action: WorkflowCommands,
    },

    /// Rule management
    Rules {
        #[command(subcommand)]
        action: RuleCommands,
    },

    /// Action management
    Actions {
        #[command(subcommand)]
        action: ActionCommands,
    },

    /// ActionType management
    ActionTypes {
        #[command(subcommand)]
        action: ActionTypeCommands,
    },
}

#[derive(Args)]
struct PageArgs {
    /// 1-based page number
    #[arg(long)]
    page: Option<u32>,

    /// Items per page
    #[arg(long)]
    size: Option<u32>,
}

impl From<PageArgs> for PageRequest {
    fn from(args: PageArgs) -> Self {
        PageRequest {
            page: args.page,
            size: args.size,
        }
    }
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// List workflows
    List {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Show one workflow
    Get { workflow_id: i64 },

    /// Create a workflow
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a workflow that has no rules
    Delete {
        workflow_id: i64,

        /// Confirm the deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// List the rules of a workflow in priority order
    List {
        workflow_id: i64,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Show one rule
    Get { workflow_id: i64, rule_id: i64 },

    /// Create a rule on a workflow
    Create {
        workflow_id: i64,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Position on the workflow; appended when absent
        #[arg(long)]
        priority: Option<i64>,

        /// Create the rule with evaluation disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Delete a rule together with its actions and conditions
    Delete {
        workflow_id: i64,
        rule_id: i64,

        /// Confirm the deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum ActionCommands {
    /// List the actions of a rule in order
    List {
        workflow_id: i64,
        rule_id: i64,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Delete an action
    Delete {
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,

        /// Confirm the deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum ActionTypeCommands {
    /// List action types
    List {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let engine = build_engine(&cli)?;
    let project = cli.project_id.as_str();

    match cli.command {
        Commands::Workflows { action } => match action {
            WorkflowCommands::List { page } => {
                print_json(&engine.get_workflows(project, page.into()).await?)?
            }
            WorkflowCommands::Get { workflow_id } => {
                print_json(&engine.get_workflow(project, workflow_id).await?)?
            }
            WorkflowCommands::Create {
                name,
                description,
                notes,
            } => {
                let workflow = Workflow {
                    description,
                    notes,
                    ..Workflow::new(&name)
                };
                print_json(&engine.create_workflow(project, workflow).await?)?
            }
            WorkflowCommands::Delete {
                workflow_id,
                confirm,
            } => {
                require_confirm(confirm)?;
                engine.delete_workflow(project, workflow_id).await?;
                print_json(&serde_json::json!({ "deleted": workflow_id }))?
            }
        },

        Commands::Rules { action } => match action {
            RuleCommands::List { workflow_id, page } => {
                print_json(&engine.get_rules(project, workflow_id, page.into()).await?)?
            }
            RuleCommands::Get {
                workflow_id,
                rule_id,
            } => print_json(&engine.get_rule(project, workflow_id, rule_id).await?)?,
            RuleCommands::Create {
                workflow_id,
                name,
                description,
                priority,
                disabled,
            } => {
                let rule = Rule {
                    description,
                    priority,
                    enabled: !disabled,
                    ..Rule::new(&name)
                };
                print_json(&engine.create_rule(project, workflow_id, rule).await?)?
            }
            RuleCommands::Delete {
                workflow_id,
                rule_id,
                confirm,
            } => {
                require_confirm(confirm)?;
                engine.delete_rule(project, workflow_id, rule_id).await?;
                print_json(&serde_json::json!({ "deleted": rule_id }))?
            }
        },

        Commands::Actions { action } => match action {
            ActionCommands::List {
                workflow_id,
                rule_id,
                page,
            } => print_json(
                &engine
                    .get_actions(project, workflow_id, rule_id, page.into())
                    .await?,
            )?,
            ActionCommands::Delete {
                workflow_id,
                rule_id,
                action_id,
                confirm,
            } => {
                require_confirm(confirm)?;
                engine
                    .delete_action(project, workflow_id, rule_id, action_id)
                    .await?;
                print_json(&serde_json::json!({ "deleted": action_id }))?
            }
        },

        Commands::ActionTypes { action } => match action {
            ActionTypeCommands::List { page } => {
                print_json(&engine.get_action_types(project, page.into()).await?)?
            }
        },
    }

    Ok(())
}

fn build_engine(cli: &Cli) -> Result<ProcessingEngine> {
    if cli.in_memory {
        info!("using in-memory store; nothing will be persisted");
        return Ok(ProcessingEngine::new(Arc::new(
            InMemoryClassificationStore::new(),
        )));
    }

    let config = ProcessingConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let engine = match &cli.policy_api_url {
        Some(url) => {
            let client = HttpClassificationClient::new(url)
                .with_context(|| format!("invalid policy API URL {}", url))?;
            ProcessingEngine::with_store(RemoteStore::with_cache_seconds(
                Arc::new(client),
                config.cache.duration_seconds,
            ))
            .with_default_page_size(config.paging.default_page_size)
        }
        None => ProcessingEngine::from_config(&config)?,
    };
    debug!(?config, "engine configured");
    Ok(engine)
}

fn require_confirm(confirm: bool) -> Result<()> {
    if !confirm {
        anyhow::bail!("delete operations require the --confirm flag");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
