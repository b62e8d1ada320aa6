use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod calendar;
mod config;
mod db;
mod digest;
mod error;
mod leaderboard;
mod models;
mod overlap;
mod report;
mod store;

use crate::config::Config;
use crate::db::PgStore;
use crate::digest::DigestSources;
use crate::models::{LeaderboardCategory, UserId};
use crate::store::UserStore;

#[derive(Parser)]
#[command(name = "dancetribe-insights")]
#[command(about = "Leaderboards, trip overlaps and weekly digests for DanceTribe", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Store today's snapshot for every leaderboard
    Snapshot,
    /// Delete leaderboard snapshots past the retention window
    Cleanup,
    /// Print the latest stored leaderboard for a category
    Rankings {
        #[arg(long)]
        category: LeaderboardCategory,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show week-over-week leaderboard movement for a user
    RankChanges {
        #[arg(long)]
        user: Uuid,
    },
    /// List friends travelling to the same city at the same time
    Overlaps {
        #[arg(long)]
        user: Uuid,
    },
    /// Compose the weekly digest for one user
    Digest {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the raw digest data as JSON instead of the email body
        #[arg(long)]
        json: bool,
    },
    /// Compose weekly digests for every active user
    DigestAll {
        #[arg(long, default_value = "digests")]
        out_dir: PathBuf,
    },
    /// Export the latest stored leaderboard for a category as CSV
    Export {
        #[arg(long)]
        category: LeaderboardCategory,
        #[arg(long, default_value = "leaderboard.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool.clone());
    let sources = DigestSources {
        users: &store,
        views: &store,
        snapshots: &store,
    };
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, now).await?;
            println!("Seed data inserted.");
        }
        Commands::Snapshot => {
            let run = leaderboard::snapshot_all_leaderboards(&store, &store, now).await;
            println!(
                "Saved {} leaderboard snapshots ({} empty).",
                run.count(),
                run.empty.len()
            );
            if !run.success() {
                for (category, message) in run.failed.iter() {
                    println!("- {category} failed: {message}");
                }
                anyhow::bail!("{} leaderboard snapshots failed", run.failed.len());
            }
        }
        Commands::Cleanup => {
            let deleted = leaderboard::cleanup_old_snapshots(&store, now).await?;
            println!("Deleted {deleted} expired snapshots.");
        }
        Commands::Rankings { category, limit } => {
            match leaderboard::latest_rankings(&store, category, now).await? {
                Some(snapshot) => print!("{}", report::render_rankings(&snapshot, limit)),
                None => println!("No snapshot stored for {category}."),
            }
        }
        Commands::RankChanges { user } => {
            let changes = leaderboard::all_rank_changes(&store, UserId(user), now).await;
            for (category, change) in changes.iter() {
                println!(
                    "- {}: current {:?}, previous {:?}, change {:+}{}{}",
                    category.label(),
                    change.current,
                    change.previous,
                    change.change,
                    if change.is_new { " (new)" } else { "" },
                    if change.dropped_out { " (dropped out)" } else { "" }
                );
            }
        }
        Commands::Overlaps { user } => {
            let Some(profile) = store.digest_user(UserId(user)).await? else {
                println!("No user {user}.");
                return Ok(());
            };
            let today = calendar::today(now);
            let friends = store.friends_upcoming_trips(&profile.friends, today).await?;
            let overlaps = overlap::find_trip_overlaps(&profile.trips, &friends, today, None);

            if overlaps.is_empty() {
                println!("No overlapping trips with friends.");
                return Ok(());
            }

            for found in overlaps.iter() {
                println!(
                    "- {} in {}: {} to {} ({} days, {})",
                    found.friend_name,
                    found.city.name,
                    found.overlap.start,
                    found.overlap.end,
                    found.overlap.days,
                    overlap::starts_in_label(today, found.overlap.start)
                );
            }
        }
        Commands::Digest { user, out, json } => {
            let Some(data) = digest::weekly_digest_data(sources, UserId(user), now).await else {
                println!("No digest for {user}: unknown user or no email on file.");
                return Ok(());
            };
            if !digest::should_send_digest(&data) {
                println!("Nothing new for {} this week.", data.username);
            }
            let body = if json {
                serde_json::to_string_pretty(&data)?
            } else {
                report::render_digest(&data)
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, body)?;
                    println!("Digest written to {}.", path.display());
                }
                None => print!("{body}"),
            }
        }
        Commands::DigestAll { out_dir } => {
            let batch =
                digest::collect_weekly_digests(sources, config.admin_email.as_deref(), now).await?;
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            for data in batch.ready.iter() {
                let path = out_dir.join(format!("{}.md", data.username));
                std::fs::write(&path, report::render_digest(data))?;
            }
            println!(
                "Wrote {} digests to {} ({} quiet, {} without email).",
                batch.ready.len(),
                out_dir.display(),
                batch.quiet,
                batch.undeliverable
            );
        }
        Commands::Export { category, out } => {
            let Some(snapshot) = leaderboard::latest_rankings(&store, category, now).await? else {
                println!("No snapshot stored for {category}.");
                return Ok(());
            };
            let mut writer = csv::Writer::from_path(&out)?;
            for entry in snapshot.rankings.iter() {
                writer.serialize(entry)?;
            }
            writer.flush()?;
            println!(
                "Exported {} entries of {} to {}.",
                snapshot.rankings.len(),
                category,
                out.display()
            );
        }
    }

    Ok(())
}
