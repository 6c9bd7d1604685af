use std::time::Duration;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::order::Trade;
use crate::types::Symbol;

pub const ORDERS_ACCEPTED: &str = "lob_orders_accepted_total";
pub const ORDERS_REJECTED: &str = "lob_orders_rejected_total";
pub const ORDERS_CANCELLED: &str = "lob_orders_cancelled_total";
pub const TRADES: &str = "lob_trades_total";
pub const TRADED_QUANTITY: &str = "lob_traded_quantity_total";
pub const COMMAND_SECONDS: &str = "lob_command_seconds";

pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder()?;
    Ok(handle)
}

pub(crate) fn record_accepted(symbol: &Symbol, trades: &[Trade]) {
    let label = symbol.to_string();
    counter!(ORDERS_ACCEPTED, "symbol" => label.clone()).increment(1);
    if trades.is_empty() {
        return;
    }
    let quantity: u64 = trades.iter().map(|trade| trade.quantity.value()).sum();
    counter!(TRADES, "symbol" => label.clone()).increment(trades.len() as u64);
    counter!(TRADED_QUANTITY, "symbol" => label).increment(quantity);
}

pub(crate) fn record_rejected(symbol: &Symbol) {
    counter!(ORDERS_REJECTED, "symbol" => symbol.to_string()).increment(1);
}

pub(crate) fn record_cancelled(symbol: &Symbol) {
    counter!(ORDERS_CANCELLED, "symbol" => symbol.to_string()).increment(1);
}

pub(crate) fn record_latency(command: &'static str, elapsed: Duration) {
    histogram!(COMMAND_SECONDS, "command" => command).record(elapsed.as_secs_f64());
}
