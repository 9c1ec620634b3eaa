use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use devbytes::app::App;
use devbytes::config::Config;
use devbytes::domain::Video;
use devbytes::{logging, work::RefreshDataWorker};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "devbytes")]
#[command(about = "Keep a local, observable cache of the DevBytes playlist")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/devbytes/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
  /// Refresh the cache once, now
  Sync,
  /// Print the cached videos
  List,
  /// Schedule the daily refresh and print the cache whenever it changes
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let app = App::new(&config)?;

  match args.command.unwrap_or(Command::Watch) {
    Command::Sync => {
      app.repository().refresh().await?;
      let count = app.repository().videos()?.len();
      println!("{} videos cached", count);
    }
    Command::List => print_videos(&app.repository().videos()?),
    Command::Watch => watch(&app).await?,
  }

  Ok(())
}

async fn watch(app: &App) -> Result<()> {
  let mut videos = app.repository().observe_videos();
  let outcome = app.setup_recurring_work();
  info!(?outcome, "watching cache, press Ctrl-C to stop");

  loop {
    tokio::select! {
      snapshot = videos.next() => {
        let snapshot = snapshot.ok_or_else(|| eyre!("video cache closed"))?;
        print_videos(&snapshot);
        if let Some(work) = app.work_manager().work_info(RefreshDataWorker::WORK_NAME) {
          println!("next refresh: {} ({:?})", work.next_run_at.to_rfc3339(), work.state);
        }
      }
      _ = tokio::signal::ctrl_c() => {
        info!("shutting down");
        return Ok(());
      }
    }
  }
}

fn print_videos(videos: &[Video]) {
  if videos.is_empty() {
    println!("(no cached videos)");
    return;
  }

  for video in videos {
    println!("{}  {}", video.updated, video.title);
    println!("    {}", video.url);
    let summary = video.short_description();
    if !summary.is_empty() {
      println!("    {}", summary);
    }
  }
}
