use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lob_engine::config::Settings;
use lob_engine::engine::{Command, Outcome, Router};
use lob_engine::matching::LimitOrderBook;
use lob_engine::metrics::install_recorder;
use lob_engine::persistence::SnapshotStore;

#[derive(Parser, Debug)]
#[command(name = "engine")]
struct Args {
    #[arg(long, default_value = "config/example.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();
    let _prom = install_recorder()?;

    let args = Args::parse();
    let settings = Settings::load(&args.config)?;
    let snapshot_dir = settings.persistence.as_ref().map(|p| p.snapshot_dir.clone());

    let mut router = Router::new(settings.channel_capacity, settings.depth_levels);
    for market in &settings.markets {
        let book = match &snapshot_dir {
            Some(dir) => restore_or_build(dir, market.build_book()?)?,
            None => market.build_book()?,
        };
        router.insert(book)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = match serde_json::from_str::<Command>(&line) {
            Ok(command) => router.apply(command).await,
            Err(err) => {
                warn!(%err, "failed to decode command");
                Outcome::Rejected {
                    reason: format!("malformed command: {err}"),
                }
            }
        };
        let mut out = serde_json::to_vec(&outcome)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
    }
    stdout.flush().await?;

    let books = router.shutdown().await?;
    if let Some(dir) = &snapshot_dir {
        std::fs::create_dir_all(dir)?;
        for book in &books {
            let path = SnapshotStore::path_for(dir, book.symbol());
            SnapshotStore::save(&path, &book.snapshot()?)?;
            info!(symbol = %book.symbol(), orders = book.order_count(), path = %path.display(), "snapshot written");
        }
    }
    Ok(())
}

fn restore_or_build(dir: &Path, empty: LimitOrderBook) -> anyhow::Result<LimitOrderBook> {
    let path = SnapshotStore::path_for(dir, empty.symbol());
    let Some(bytes) = SnapshotStore::load(&path)? else {
        return Ok(empty);
    };
    let book = LimitOrderBook::restore(&bytes)?;
    if book.symbol() != empty.symbol() || book.tick_size() != empty.tick_size() {
        anyhow::bail!(
            "snapshot {} holds {} with tick {}, config expects {} with tick {}",
            path.display(),
            book.symbol(),
            book.tick_size(),
            empty.symbol(),
            empty.tick_size()
        );
    }
    info!(symbol = %book.symbol(), orders = book.order_count(), "restored from snapshot");
    Ok(book)
}
