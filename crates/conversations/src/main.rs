//! conversations - GitHub issues and pull requests as agent/human threads.
//!
//! # Environment Variables
//!
//! - `GITHUB_TOKEN` - GitHub token (required for every GitHub call)
//! - `GITHUB_API_URL` - API base URL (default `https://api.github.com`)
//! - `TRACKED_REPOS` - comma separated `owner/repo` list seeded into the store
//! - `REPO_STORE` / `REPO_STORE_PATH` - tracked-repository store selection
//! - `BIND_ADDR` - listen address for `serve`
//!
//! # Examples
//!
//! ```bash
//! # Run the HTTP API
//! conversations serve --repos acme/widgets,acme/gadgets
//!
//! # Triage list across tracked repositories
//! conversations --repos acme/widgets conversations
//!
//! # One thread with agent attribution
//! conversations messages --repo acme/widgets --number 42
//!
//! # Move a thread into planning
//! conversations labels --repo acme/widgets --number 42 --add planning
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::{ColoredString, Colorize};
use conversations::display::{relative_time, truncate};
use conversations::server::{run_server, AppState};
use conversations::{
    build_store, AttentionLevel, Config, ConfigArgs, ConversationAssembler, ConversationKind,
    GitHubClient, GitHubProvider, Message, RepoRef,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Column width for titles in the conversation table.
const TITLE_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "conversations")]
#[command(about = "GitHub issues and pull requests as agent/human conversations")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Enable debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,
    },

    /// List conversations across tracked repositories
    Conversations,

    /// Show the messages of one issue or pull request
    Messages {
        /// Repository in owner/repo format
        #[arg(short, long)]
        repo: String,

        /// Issue or pull request number
        #[arg(short, long)]
        number: u64,
    },

    /// Show, add or remove labels
    Labels {
        /// Repository in owner/repo format
        #[arg(short, long)]
        repo: String,

        /// Issue or pull request number
        #[arg(short, long)]
        number: u64,

        /// Label to add
        #[arg(long, conflicts_with = "remove")]
        add: Option<String>,

        /// Label to remove
        #[arg(long)]
        remove: Option<String>,
    },

    /// Post a comment
    Comment {
        /// Repository in owner/repo format
        #[arg(short, long)]
        repo: String,

        /// Issue or pull request number
        #[arg(short, long)]
        number: u64,

        /// Comment body (markdown supported)
        body: String,
    },

    /// Close an issue or pull request
    Close {
        /// Repository in owner/repo format
        #[arg(short, long)]
        repo: String,

        /// Issue or pull request number
        #[arg(short, long)]
        number: u64,
    },

    /// List repositories owned by the authenticated user
    Repos,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("info,conversations=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn provider(config: &Config) -> Result<Arc<dyn GitHubProvider>> {
    let client = GitHubClient::from_config(config)
        .context("GitHub client unavailable (set GITHUB_TOKEN or pass --github-token)")?;
    Ok(Arc::new(client))
}

fn parse_repo(repo: &str) -> Result<RepoRef> {
    repo.parse()
        .with_context(|| format!("Invalid repository '{repo}'"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn paint_attention(level: AttentionLevel) -> ColoredString {
    let text = format!("{:<8}", level.as_str());
    match level {
        AttentionLevel::Urgent => text.red().bold(),
        AttentionLevel::Review => text.yellow(),
        AttentionLevel::Working => text.blue(),
        AttentionLevel::None => text.dimmed(),
    }
}

fn message_header(message: &Message, now: DateTime<Utc>) -> String {
    let mut header = format!(
        "{} {}",
        message.author.login.bold(),
        relative_time(message.created_at, now).dimmed()
    );
    if message.author.is_bot {
        let _ = write!(header, " {}", "[bot]".cyan());
    }
    if let Some(agent) = message.agent_type {
        let _ = write!(header, " {}", format!("({agent})").magenta());
    }
    header
}

fn print_message(message: &Message) {
    println!("{}", message_header(message, Utc::now()));
    for line in message.body.lines() {
        println!("    {line}");
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = cli
        .config
        .into_config()
        .context("Invalid configuration")?;
    let format = cli.format;

    match cli.command {
        Commands::Serve { bind } => {
            let store = build_store(&config)
                .await
                .context("Failed to open tracked-repository store")?;
            let state = Arc::new(AppState::new(provider(&config)?, store));
            info!(api_url = %config.api_url, "Starting conversations API");
            run_server(state, &bind)
                .await
                .with_context(|| format!("Server failed on {bind}"))?;
        }

        Commands::Conversations => {
            let store = build_store(&config)
                .await
                .context("Failed to open tracked-repository store")?;
            let repos = store.tracked_repos().await?;
            if repos.is_empty() {
                anyhow::bail!("No tracked repositories. Pass --repos owner/repo or set TRACKED_REPOS");
            }

            let assembler = ConversationAssembler::new(provider(&config)?);
            let conversations = assembler.list_conversations(&repos).await?;

            match format {
                OutputFormat::Json => print_json(&conversations)?,
                OutputFormat::Text => {
                    if conversations.is_empty() {
                        println!("No conversations in {} tracked repositories", repos.len());
                    }
                    let now = Utc::now();
                    for conversation in &conversations {
                        let kind = match conversation.kind {
                            ConversationKind::Issue => "issue",
                            ConversationKind::PullRequest => "PR",
                        };
                        println!(
                            "{} {:<6} {:<5} {}#{:<5} {:<width$} {}",
                            paint_attention(conversation.attention_level),
                            conversation.state.as_str(),
                            kind,
                            conversation.repo,
                            conversation.number,
                            truncate(&conversation.title, TITLE_WIDTH),
                            relative_time(conversation.updated_at, now).dimmed(),
                            width = TITLE_WIDTH + 3,
                        );
                    }
                }
            }
        }

        Commands::Messages { repo, number } => {
            let repo = parse_repo(&repo)?;
            let assembler = ConversationAssembler::new(provider(&config)?);
            let detail = assembler.conversation_detail(&repo, number).await?;

            match format {
                OutputFormat::Json => print_json(&detail)?,
                OutputFormat::Text => {
                    let conversation = &detail.conversation;
                    println!(
                        "{} {}#{} {} ({})\n",
                        paint_attention(conversation.attention_level),
                        conversation.repo,
                        conversation.number,
                        conversation.title.bold(),
                        conversation.state.as_str()
                    );
                    for message in &detail.messages {
                        print_message(message);
                    }
                }
            }
        }

        Commands::Labels {
            repo,
            number,
            add,
            remove,
        } => {
            let repo = parse_repo(&repo)?;
            let provider = provider(&config)?;

            if let Some(label) = add {
                provider.add_labels(&repo, number, &[label.clone()]).await?;
                info!(label = %label, "Added label");
            }
            if let Some(label) = remove {
                provider.remove_label(&repo, number, &label).await?;
                info!(label = %label, "Removed label");
            }

            let labels = provider.list_labels(&repo, number).await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "labels": labels }))?,
                OutputFormat::Text => {
                    if labels.is_empty() {
                        println!("No labels on {repo}#{number}");
                    } else {
                        println!("Labels on {repo}#{number}: {}", labels.join(", "));
                    }
                }
            }
        }

        Commands::Comment { repo, number, body } => {
            let repo = parse_repo(&repo)?;
            let comment = provider(&config)?
                .create_comment(&repo, number, &body)
                .await?;
            match format {
                OutputFormat::Json => print_json(&comment)?,
                OutputFormat::Text => println!("Posted comment {} on {repo}#{number}", comment.id),
            }
        }

        Commands::Close { repo, number } => {
            let repo = parse_repo(&repo)?;
            provider(&config)?.close_issue(&repo, number).await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "ok": true }))?,
                OutputFormat::Text => println!("Closed {repo}#{number}"),
            }
        }

        Commands::Repos => {
            let repos = provider(&config)?.list_user_repos().await?;
            match format {
                OutputFormat::Json => print_json(&repos)?,
                OutputFormat::Text => {
                    for repo in &repos {
                        let visibility = if repo.private { "private" } else { "public" };
                        println!(
                            "{:<40} {:>4} open  {}",
                            repo.full_name,
                            repo.open_issue_count,
                            visibility.dimmed()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
