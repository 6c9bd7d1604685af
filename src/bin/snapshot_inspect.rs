use clap::Parser;

use lob_engine::persistence::{Snapshot, SnapshotStore};
use lob_engine::matching::LimitOrderBook;

#[derive(Parser, Debug)]
#[command(name = "snapshot_inspect")]
struct Args {
    #[arg(long)]
    snapshot: String,
    /// Depth levels to print per side.
    #[arg(long, default_value_t = 10)]
    levels: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let bytes = SnapshotStore::load(std::path::Path::new(&args.snapshot))?
        .ok_or_else(|| anyhow::anyhow!("snapshot not found"))?;
    let snapshot = Snapshot::decode(&bytes)?;
    println!("version={}", snapshot.meta.version);
    println!("symbol={}", snapshot.meta.symbol);
    println!("order_count={}", snapshot.meta.order_count);
    println!("next_sequence={}", snapshot.state.next_sequence);
    println!("next_trade_sequence={}", snapshot.state.next_trade_sequence);
    println!("checksum={}", snapshot.meta.checksum);

    let book = LimitOrderBook::from_state(snapshot.state)?;
    print!("{}", serde_yaml::to_string(&book.market_depth(args.levels))?);
    Ok(())
}
