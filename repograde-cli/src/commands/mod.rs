use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use repograde_core::analyzer::{RepoAnalyzer, SonarGateway};
use repograde_core::llm::{create_chat_model, Enricher};
use repograde_core::notify::create_notifier;
use repograde_core::report;
use repograde_core::selection;
use repograde_core::types::{RepoId, Repository, UserId};
use repograde_core::{AnalysisPipeline, AnalysisStore, RepogradeConfig, SqliteStore};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a user's repository snapshot from a JSON file
    Import {
        #[arg(long)]
        user: i64,
        /// JSON array of repository objects
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },

    /// Save a new repository combination
    Select {
        #[arg(long)]
        user: i64,
        /// Comma-separated repository ids, e.g. 101,205,318
        #[arg(long)]
        repos: String,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },

    /// List saved combinations with their analysis status
    Combos {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },

    /// Run the analysis pipeline for a combination
    Analyze {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        selection: String,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },

    /// Show the status and latest result of a combination
    Status {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        selection: String,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },

    /// Delete a combination and its results
    Delete {
        #[arg(long)]
        selection: String,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },

    /// Register a push notification device token for a user
    RegisterDevice {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        token: String,
        #[arg(long, default_value = "repograde.toml")]
        config: PathBuf,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Import { user, file, config } => import(user, &file, &config).await,
        Command::Select {
            user,
            repos,
            config,
        } => select(user, &repos, &config).await,
        Command::Combos { user, config } => combos(user, &config).await,
        Command::Analyze {
            user,
            selection,
            config,
        } => analyze(user, &selection, &config).await,
        Command::Status {
            user,
            selection,
            config,
        } => status(user, &selection, &config).await,
        Command::Delete { selection, config } => delete(&selection, &config).await,
        Command::RegisterDevice {
            user,
            token,
            config,
        } => register_device(user, &token, &config).await,
    }
}

fn load_config(path: &Path) -> anyhow::Result<RepogradeConfig> {
    if path.exists() {
        Ok(RepogradeConfig::load(path)?)
    } else {
        // No file means defaults; useful for store-only commands.
        let config = RepogradeConfig::default();
        config.validate()?;
        Ok(config)
    }
}

fn open_store(config: &RepogradeConfig) -> anyhow::Result<SqliteStore> {
    Ok(SqliteStore::open(&config.store.path)?)
}

fn parse_repo_ids(repos: &str) -> anyhow::Result<Vec<RepoId>> {
    repos
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map(RepoId)
                .with_context(|| format!("invalid repository id: {part}"))
        })
        .collect()
}

async fn import(user: i64, file: &Path, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(&config)?;

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let repositories: Vec<Repository> =
        serde_json::from_str(&text).context("snapshot file is not a repository array")?;

    store
        .put_repositories(UserId(user), &repositories)
        .await?;
    println!(
        "Imported {} repositories for user {user}",
        repositories.len()
    );
    Ok(())
}

async fn select(user: i64, repos: &str, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(&config)?;
    let repo_ids = parse_repo_ids(repos)?;

    let selection = selection::create_selection(&store, UserId(user), &repo_ids).await?;
    println!("Saved combination {}", selection.id);
    for repo in &selection.repositories {
        println!("  {}", repo.full_name);
    }
    Ok(())
}

async fn combos(user: i64, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(&config)?;

    let listed = selection::list_selections(&store, UserId(user)).await?;
    if listed.is_empty() {
        println!("No combinations saved for user {user}");
        return Ok(());
    }

    for (sel, status) in listed {
        let state = status
            .map(|s| s.state.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let names: Vec<&str> = sel
            .repositories
            .iter()
            .map(|r| r.full_name.as_str())
            .collect();
        let mut line = format!("{}  [{}]  {}", sel.id, state, names.join(", "));
        if let Some(result) = store.latest_result(&sel.id).await? {
            line.push_str(&format!(
                "  {}/100 ({})",
                result.overall_score,
                report::grade_letter(result.overall_score)
            ));
        }
        println!("{line}");
    }
    Ok(())
}

async fn analyze(user: i64, selection_id: &str, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = Arc::new(open_store(&config)?);

    let gateway = SonarGateway::new(config.scanner.clone());
    let analyzer = RepoAnalyzer::new(gateway, config.scanner.clone());
    let enricher = if config.llm.api_key.is_empty() {
        None
    } else {
        Some(Enricher::new(create_chat_model(&config.llm)?))
    };
    let notifier = create_notifier(&config.notify);

    let pipeline = AnalysisPipeline::new(
        store.clone() as Arc<dyn AnalysisStore>,
        analyzer,
        enricher,
        notifier,
    );

    let result = pipeline.trigger(UserId(user), selection_id).await?;
    print!("{}", report::render_result(&result));
    Ok(())
}

async fn status(user: i64, selection_id: &str, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(&config)?;

    match store.get_status(UserId(user), selection_id).await? {
        Some(status) => println!(
            "{} — {} (as of {})",
            status.state,
            report::state_message(status.state),
            status.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("No analysis status for combination {selection_id}"),
    }

    if let Some(result) = store.latest_result(selection_id).await? {
        print!("{}", report::render_result(&result));
    }
    Ok(())
}

async fn delete(selection_id: &str, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(&config)?;
    selection::delete_selection(&store, selection_id).await?;
    println!("Deleted combination {selection_id}");
    Ok(())
}

async fn register_device(user: i64, token: &str, config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(&config)?;
    store.set_device_token(UserId(user), token).await?;
    println!("Registered device token for user {user}");
    Ok(())
}
