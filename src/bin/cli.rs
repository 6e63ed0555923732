use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use taskboard::board::{Selection, TaskEdit};
use taskboard::client::{self, CreateTaskRequest};
use taskboard::config::Config;
use taskboard::context::AppContext;
use taskboard::store::TaskStore;
use taskboard::tables::{Priority, Status, Task, TaskFilter};
use taskboard::tree;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File holding local preferences (theme)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// The address to bind to
        #[arg(short, long)]
        addr: Option<SocketAddr>,
    },
    /// Client commands
    Client {
        /// The base URL of the API
        #[arg(long)]
        url: Option<String>,
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Show or toggle the theme preference
    Theme {
        #[arg(long)]
        toggle: bool,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Display the task tree
    List {
        /// all, completed or incomplete
        #[arg(long, default_value = "all")]
        filter: TaskFilter,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Print the raw forest as JSON
        #[arg(long, conflicts_with = "yaml")]
        json: bool,
        /// Print the raw forest as YAML
        #[arg(long)]
        yaml: bool,
    },
    /// List distinct categories
    Categories,
    /// Show one or more tasks with their subtasks
    Get {
        #[arg(required = true)]
        ids: Vec<i32>,
    },
    /// Create a task or subtask
    Create {
        title: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<Status>,
        /// Create as a subtask of this task
        #[arg(long)]
        parent: Option<i32>,
    },
    /// Edit fields of a task
    Update {
        id: i32,
        #[arg(long)]
        title: Option<String>,
        /// An empty string clears the category
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<Status>,
    },
    /// Toggle the completion flag of a task
    Toggle { id: i32 },
    /// Delete a task and all of its subtasks
    Delete {
        id: i32,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Check that the API is up
    Health,
    /// Print the category set whenever it changes
    Watch {
        /// Polling interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(state_file) = cli.state_file {
        config.state_file = state_file;
    }

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or(config.addr);
            taskboard::api::serve(addr, TaskStore::new())
                .await
                .with_context(|| format!("failed to serve on {}", addr))?;
        }
        Commands::Theme { toggle } => {
            let mut context = AppContext::from_config(&config)?;
            if toggle {
                context.toggle_theme()?;
            }
            println!("{}", context.theme());
        }
        Commands::Client { url, command } => {
            if let Some(url) = url {
                config.api_url = url.trim_end_matches('/').to_string();
            }
            let context = AppContext::from_config(&config)?;
            run_client(&context, &config, command).await?;
        }
    }
    Ok(())
}

async fn run_client(
    context: &AppContext,
    config: &Config,
    command: ClientCommands,
) -> anyhow::Result<()> {
    let url = context.api_url();
    let mut board = context.board();

    match command {
        ClientCommands::List {
            filter,
            category,
            priority,
            json,
            yaml,
        } => {
            let mut board = board.with_selection(Selection {
                filter,
                category,
                priority,
            });
            board.load().await;
            if json {
                println!("{}", serde_json::to_string_pretty(board.tasks())?);
            } else if yaml {
                print!("{}", serde_yaml::to_string(board.tasks())?);
            } else {
                println!("Tasks ({} incomplete)", board.incomplete_count());
                print_tree(board.tasks());
            }
        }
        ClientCommands::Categories => {
            for category in client::fetch_categories(url).await? {
                println!("{}", category);
            }
        }
        ClientCommands::Get { ids } => {
            let results = join_all(ids.iter().map(|id| client::fetch_task(url, *id))).await;
            let mut failed = false;
            for result in results {
                match result {
                    Ok(task) => println!("{}", serde_json::to_string_pretty(&task)?),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        failed = true;
                    }
                }
            }
            if failed {
                bail!("some tasks could not be fetched");
            }
        }
        ClientCommands::Create {
            title,
            category,
            priority,
            status,
            parent,
        } => {
            let task = board
                .create(CreateTaskRequest {
                    title,
                    category,
                    priority,
                    status,
                    parent_id: parent,
                })
                .await
                .map_err(|e| anyhow::anyhow!(e.alert()))?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        ClientCommands::Update {
            id,
            title,
            category,
            priority,
            status,
        } => {
            let current = client::fetch_task(url, id).await?;
            let mut edit = TaskEdit::begin(&current);
            if let Some(title) = title {
                edit.title = title;
            }
            if let Some(category) = category {
                edit.category = category;
            }
            if let Some(priority) = priority {
                edit.priority = priority;
            }
            if let Some(status) = status {
                edit.status = status;
            }
            let task = board
                .save(edit)
                .await
                .map_err(|e| anyhow::anyhow!(e.alert()))?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        ClientCommands::Toggle { id } => {
            let task = board
                .toggle(id)
                .await
                .map_err(|e| anyhow::anyhow!(e.alert()))?;
            let state = if task.is_completed { "completed" } else { "not completed" };
            println!("Task {} is now {}", task.id, state);
        }
        ClientCommands::Delete { id, yes } => {
            // The prompt depends on whether the task has subtasks.
            board.load().await;
            let deleted = board
                .delete(id, |prompt| yes || confirm(prompt))
                .await
                .map_err(|e| anyhow::anyhow!(e.alert()))?;
            if deleted {
                println!("Task {} deleted successfully", id);
            } else {
                println!("Cancelled");
            }
        }
        ClientCommands::Health => {
            let health = client::health_check(url).await?;
            println!("{} ({})", health.status, health.service);
        }
        ClientCommands::Watch { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.poll_interval);
            let mut watcher = context.watch_categories(interval);
            loop {
                tokio::select! {
                    changed = watcher.changed() => match changed {
                        Some(categories) => println!("{}", categories.join(", ")),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or_else(|e| {
            warn!(error = %e, "could not read confirmation");
            false
        })
}

fn print_tree(forest: &[Task]) {
    if forest.is_empty() {
        println!("No tasks");
        return;
    }
    for (task, depth) in tree::flatten_with_depth(forest) {
        let mark = if task.is_completed { "[x]" } else { "[ ]" };
        let category = task
            .category
            .as_deref()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default();
        println!(
            "{}{} #{} {}{} [{}, {}]",
            "  ".repeat(depth),
            mark,
            task.id,
            task.title,
            category,
            task.priority,
            task.status
        );
    }
}
