use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::matching::LimitOrderBook;
use crate::types::{Symbol, TickSize};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub markets: Vec<MarketConfig>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
    #[serde(default)]
    pub persistence: Option<PersistenceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub symbol: String,
    /// Decimal string, e.g. `"0.01"`.
    pub tick_size: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub snapshot_dir: PathBuf,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_depth_levels() -> usize {
    10
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let builder = config::Config::builder().add_source(config::File::with_name(path));
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let builder =
            config::Config::builder().add_source(config::File::from_str(raw, config::FileFormat::Yaml));
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.markets.is_empty() {
            bail!("at least one market must be configured");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be greater than zero");
        }
        let mut seen = HashSet::new();
        for market in &self.markets {
            let symbol = market.symbol()?;
            market.tick_size()?;
            if !seen.insert(symbol.clone()) {
                bail!("market {symbol} configured twice");
            }
        }
        Ok(())
    }
}

impl MarketConfig {
    pub fn symbol(&self) -> anyhow::Result<Symbol> {
        Symbol::new(&self.symbol).with_context(|| format!("market symbol {:?}", self.symbol))
    }

    pub fn tick_size(&self) -> anyhow::Result<TickSize> {
        let value = Decimal::from_str(self.tick_size.trim())
            .map_err(|err| anyhow!("tick_size {:?} for {}: {err}", self.tick_size, self.symbol))?;
        Ok(TickSize::new(value)?)
    }

    pub fn build_book(&self) -> anyhow::Result<LimitOrderBook> {
        Ok(LimitOrderBook::new(self.symbol()?, self.tick_size()?))
    }
}
