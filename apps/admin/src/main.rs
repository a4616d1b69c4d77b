use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    ApiConfig, DisputeEvent, DisputesState, DisputesWorkflow, Endpoint, ResolveOutcome,
    StatsClient,
};
use shared::{domain::GameId, protocol::StatRow};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use views::{disputes::PAGE_TITLE, html, Column, DisputesPage, ImagePolicy, TableView};

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "admin", about = "Administrative client for the esports stats backend")]
struct Args {
    /// Settings file; missing files fall back to defaults.
    #[arg(long, default_value = "admin.toml")]
    config: PathBuf,
    /// Overrides the configured backend address.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Disputes(DisputesCommand),
    #[command(subcommand)]
    Stats(StatsCommand),
    /// Prints the URL for a backend operation, e.g. `endpoint player_stats valorant "a b"`.
    Endpoint {
        operation: String,
        args: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum DisputesCommand {
    /// Lists open disputes.
    List {
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Resolves disputes and removes them from the open list.
    Resolve {
        #[arg(required = true)]
        game_ids: Vec<String>,
    },
    /// Hands a dispute off to the review surface.
    Review { game_id: String },
}

#[derive(Subcommand, Debug)]
enum StatsCommand {
    Player {
        #[arg(long)]
        game: String,
        #[arg(long)]
        player: String,
        #[command(flatten)]
        output: TableOutput,
    },
    Match {
        #[arg(long)]
        game: String,
        #[arg(long)]
        week: String,
        #[command(flatten)]
        output: TableOutput,
    },
    Season {
        #[arg(long)]
        game: String,
        #[arg(long)]
        week: String,
        #[command(flatten)]
        output: TableOutput,
    },
}

#[derive(ClapArgs, Debug)]
struct TableOutput {
    /// Comma separated field names; defaults to the first row's fields.
    #[arg(long)]
    columns: Option<String>,
    #[arg(long)]
    html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    if let Some(api_base_url) = args.api_base_url {
        settings.api_base_url = api_base_url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let api_config = ApiConfig::new(&settings.api_base_url)?;
    info!(api_base_url = api_config.base_url(), "using stats backend");
    let images = ImagePolicy::with_allowed_hosts(settings.image_hosts.iter().cloned());

    match args.command {
        Command::Disputes(command) => run_disputes(command, &api_config, &images).await,
        Command::Stats(command) => run_stats(command, &api_config).await,
        Command::Endpoint { operation, args } => {
            let endpoint = Endpoint::from_operation(&operation, &args).map_err(|err| {
                anyhow!("{err}; known operations: {}", Endpoint::OPERATIONS.join(", "))
            })?;
            println!("{}", api_config.directory().url(&endpoint));
            Ok(())
        }
    }
}

async fn run_disputes(
    command: DisputesCommand,
    api_config: &ApiConfig,
    images: &ImagePolicy,
) -> Result<()> {
    let workflow = DisputesWorkflow::new(Arc::new(StatsClient::new(api_config)));
    let mut events = workflow.subscribe_events();

    match command {
        DisputesCommand::List { html: html_path } => {
            let snapshot = workflow.load().await;
            print_lines(drain_events(&mut events));
            let page = DisputesPage::from_snapshot(&snapshot, images);
            match html_path {
                Some(path) => {
                    write_html(&path, &page.render_html())?;
                    println!("{} dispute(s) written to {}", page.card_count(), path.display());
                }
                None => print!("{}", page.render_text()),
            }
        }
        DisputesCommand::Resolve { game_ids } => {
            let snapshot = workflow.load().await;
            print_lines(drain_events(&mut events));
            drop(events);
            if let DisputesState::Failed { reason } = &snapshot.state {
                warn!("continuing without the open dispute list: {reason}");
            }

            let game_ids: Vec<GameId> = game_ids.into_iter().map(GameId::from).collect();
            let outcomes = futures::future::join_all(
                game_ids.iter().map(|game_id| workflow.resolve(game_id)),
            )
            .await;

            let (lines, failed) = report_outcomes(&game_ids, &outcomes);
            print_lines(lines);
            println!("{} dispute(s) still open", workflow.disputes().await.len());
            if !failed.is_empty() {
                let ids: Vec<&str> = failed.iter().map(GameId::as_str).collect();
                return Err(anyhow!("failed to resolve: {}", ids.join(", ")));
            }
        }
        DisputesCommand::Review { game_id } => {
            workflow.review(&GameId::from(game_id));
            print_lines(drain_events(&mut events));
        }
    }
    Ok(())
}

/// Surfaces workflow events the way the page would: notices as alerts and the
/// review hand-off as a navigation target. Returns the lines to print.
fn drain_events(events: &mut broadcast::Receiver<DisputeEvent>) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match events.try_recv() {
            Ok(DisputeEvent::Loaded { count }) => info!(count, "disputes loaded"),
            Ok(DisputeEvent::LoadFailed { reason }) => warn!("disputes unavailable: {reason}"),
            Ok(DisputeEvent::ReviewRequested { game_id }) => {
                lines.push(format!("review: game {game_id}"))
            }
            Ok(DisputeEvent::Notice(notice)) => lines.push(notice.message().to_string()),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "event receiver lagged; older events dropped")
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    lines
}

/// One notice line per resolve that reached the backend, plus the ids that
/// failed. Built from the returned outcomes so none are lost to channel lag.
fn report_outcomes(
    game_ids: &[GameId],
    outcomes: &[ResolveOutcome],
) -> (Vec<String>, BTreeSet<GameId>) {
    let mut lines = Vec::with_capacity(outcomes.len());
    let mut failed = BTreeSet::new();
    for (game_id, outcome) in game_ids.iter().zip(outcomes) {
        match outcome.notice(game_id) {
            Some(notice) => lines.push(notice.message().to_string()),
            None => info!(%game_id, "duplicate resolve request skipped"),
        }
        if matches!(outcome, ResolveOutcome::Failed { .. }) {
            failed.insert(game_id.clone());
        }
    }
    (lines, failed)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

async fn run_stats(command: StatsCommand, api_config: &ApiConfig) -> Result<()> {
    let client = StatsClient::new(api_config);
    let (title, rows, output) = match command {
        StatsCommand::Player {
            game,
            player,
            output,
        } => {
            let rows = client
                .player_stats(&game, &player)
                .await
                .with_context(|| format!("failed to fetch {game} stats for {player}"))?;
            (format!("{player} - {game}"), rows, output)
        }
        StatsCommand::Match { game, week, output } => {
            let rows = client
                .match_stats(&game, &week)
                .await
                .with_context(|| format!("failed to fetch {game} match stats for week {week}"))?;
            (format!("{game} matches - week {week}"), rows, output)
        }
        StatsCommand::Season { game, week, output } => {
            let rows = client
                .season_stats(&game, &week)
                .await
                .with_context(|| format!("failed to fetch {game} season stats for week {week}"))?;
            (format!("{game} season - week {week}"), rows, output)
        }
    };
    render_stats(&title, &rows, &output)
}

fn render_stats(title: &str, rows: &[StatRow], output: &TableOutput) -> Result<()> {
    let columns = match &output.columns {
        Some(list) => Column::parse_list(list),
        None => Column::infer(rows),
    };
    let table = TableView::build(&columns, rows);
    match &output.html {
        Some(path) => {
            let body = format!("<h1>{}</h1>\n{}", html::escape(title), table.render_html());
            write_html(path, &html::document(title, &body))?;
            println!("{} row(s) written to {}", table.rows.len(), path.display());
        }
        None if table.is_empty() => println!("No stats found."),
        None => print!("{}", table.render_text()),
    }
    Ok(())
}

fn write_html(path: &Path, markup: &str) -> Result<()> {
    let document = if markup.starts_with("<!DOCTYPE") {
        markup.to_string()
    } else {
        html::document(PAGE_TITLE, markup)
    };
    fs::write(path, document).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stats_command_with_columns() {
        let args = Args::try_parse_from([
            "admin",
            "stats",
            "player",
            "--game",
            "valorant",
            "--player",
            "a b",
            "--columns",
            "player,kills",
        ])
        .expect("args");
        match args.command {
            Command::Stats(StatsCommand::Player { player, output, .. }) => {
                assert_eq!(player, "a b");
                assert_eq!(output.columns.as_deref(), Some("player,kills"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn resolve_requires_at_least_one_id() {
        assert!(Args::try_parse_from(["admin", "disputes", "resolve"]).is_err());
        let args = Args::try_parse_from(["admin", "disputes", "resolve", "g1", "g1"])
            .expect("args");
        assert!(matches!(
            args.command,
            Command::Disputes(DisputesCommand::Resolve { game_ids }) if game_ids.len() == 2
        ));
    }

    #[test]
    fn drain_keeps_reading_after_lag() {
        let (sender, mut events) = broadcast::channel(4);
        for i in 0..300 {
            let _ = sender.send(DisputeEvent::Notice(client_core::Notice::Resolved {
                game_id: GameId::new(format!("g{i}")),
            }));
        }
        let lines = drain_events(&mut events);
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|line| line == "Dispute resolved successfully!"));
    }

    #[test]
    fn every_resolve_outcome_gets_a_notice_line() {
        let game_ids: Vec<GameId> = (0..300).map(|i| GameId::new(format!("g{i}"))).collect();
        let mut outcomes = vec![ResolveOutcome::Resolved; 300];
        outcomes[7] = ResolveOutcome::Failed {
            reason: "database unavailable".into(),
        };
        outcomes[8] = ResolveOutcome::AlreadyInFlight;

        let (lines, failed) = report_outcomes(&game_ids, &outcomes);

        assert_eq!(lines.len(), 299);
        assert_eq!(lines[7], "Failed to resolve dispute.");
        assert_eq!(
            lines.iter().filter(|l| *l == "Dispute resolved successfully!").count(),
            298
        );
        assert_eq!(failed.into_iter().collect::<Vec<_>>(), vec![GameId::new("g7")]);
    }

    #[test]
    fn api_base_url_flag_is_optional() {
        let args = Args::try_parse_from([
            "admin",
            "--api-base-url",
            "http://10.0.0.5:8080",
            "endpoint",
            "resolve_dispute",
            "42",
        ])
        .expect("args");
        assert_eq!(args.api_base_url.as_deref(), Some("http://10.0.0.5:8080"));
        match args.command {
            Command::Endpoint { operation, args } => {
                assert_eq!(operation, "resolve_dispute");
                assert_eq!(args, vec!["42"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
