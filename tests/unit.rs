use std::thread;

use rust_decimal::Decimal;

use lob_engine::config::Settings;
use lob_engine::persistence::snapshot::{Snapshot, SNAPSHOT_VERSION};
use lob_engine::shared::SharedBook;
use lob_engine::{
    BookError, LimitOrderBook, Order, OrderId, Price, Quantity, Side, SnapshotError, Symbol, TickSize, UserId,
};

fn order(id: u64, side: Side, cents: i64, qty: u64) -> Order {
    Order::new(
        OrderId::new(id),
        UserId::new(format!("user-{id}")),
        side,
        Price::from_cents(cents).unwrap(),
        Quantity::new(qty).unwrap(),
    )
}

fn seeded_book() -> LimitOrderBook {
    let mut book = LimitOrderBook::new(Symbol::new("UNIT").unwrap(), TickSize::CENT);
    book.add_order(order(1, Side::Buy, 9_950, 40)).unwrap();
    book.add_order(order(2, Side::Buy, 9_950, 10)).unwrap();
    book.add_order(order(3, Side::Sell, 10_050, 25)).unwrap();
    book.add_order(order(4, Side::Sell, 10_100, 5)).unwrap();
    book
}

#[test]
fn zero_quantity_and_non_positive_price_are_rejected() {
    assert!(matches!(Quantity::new(0), Err(BookError::InvalidQuantity { .. })));
    assert!(matches!(
        Price::new(Decimal::ZERO, TickSize::CENT),
        Err(BookError::InvalidPrice { .. })
    ));
    assert!(matches!(
        Price::new(Decimal::new(-100, 2), TickSize::CENT),
        Err(BookError::InvalidPrice { .. })
    ));
    assert!(matches!(TickSize::new(Decimal::ZERO), Err(BookError::InvalidTickSize(_))));
    assert!(Price::parse("abc", TickSize::CENT).is_err());
}

#[test]
fn snapshot_meta_describes_the_book() {
    let book = seeded_book();
    let snapshot = Snapshot::decode(&book.snapshot().unwrap()).unwrap();
    assert_eq!(snapshot.meta.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.meta.symbol, "UNIT");
    assert_eq!(snapshot.meta.order_count, 4);
    assert_eq!(snapshot.meta.checksum.len(), 64);
    assert_eq!(snapshot.state.next_sequence, 5);
}

#[test]
fn flipped_byte_never_restores_silently() {
    let book = seeded_book();
    let bytes = book.snapshot().unwrap().to_vec();
    for position in [bytes.len() / 2, bytes.len() - 1] {
        let mut tampered = bytes.clone();
        tampered[position] ^= 0x01;
        match LimitOrderBook::restore(&tampered) {
            Err(_) => {}
            Ok(restored) => assert_eq!(restored.capture(), book.capture()),
        }
    }
}

#[test]
fn truncated_snapshot_is_an_error() {
    let bytes = seeded_book().snapshot().unwrap();
    assert!(matches!(
        LimitOrderBook::restore(&bytes[..bytes.len() / 3]),
        Err(SnapshotError::Codec(_))
    ));
}

#[test]
fn index_table_must_agree_with_levels() {
    let book = seeded_book();
    let mut state = book.capture();
    state.index.retain(|record| record.order_id != OrderId::new(3));
    let bytes = Snapshot::build(state).unwrap().encode().unwrap();
    assert!(matches!(LimitOrderBook::restore(&bytes), Err(SnapshotError::Corrupt(_))));

    let mut state = book.capture();
    state.index[0].side = Side::Sell;
    let bytes = Snapshot::build(state).unwrap().encode().unwrap();
    assert!(matches!(LimitOrderBook::restore(&bytes), Err(SnapshotError::Corrupt(_))));
}

#[test]
fn stale_sequence_counter_is_corrupt() {
    let mut state = seeded_book().capture();
    state.next_sequence = 2;
    let bytes = Snapshot::build(state).unwrap().encode().unwrap();
    assert!(matches!(LimitOrderBook::restore(&bytes), Err(SnapshotError::Corrupt(_))));
}

#[test]
fn example_config_loads() {
    let settings = Settings::load("config/example.yaml").unwrap();
    assert_eq!(settings.markets.len(), 2);
    let btc = settings.markets[1].build_book().unwrap();
    assert_eq!(btc.symbol().as_str(), "BTC-USD");
    assert_eq!(btc.tick_size().value(), Decimal::new(5, 1));
    assert!(settings.persistence.is_some());
}

#[test]
fn shared_book_serialises_writers_across_threads() {
    let shared = SharedBook::new(LimitOrderBook::new(Symbol::new("MT").unwrap(), TickSize::CENT));
    let writers: Vec<_> = (0..4u64)
        .map(|t| {
            let book = shared.clone();
            thread::spawn(move || {
                for i in 0..250u64 {
                    let id = t * 1_000 + i + 1;
                    let side = if (t + i) % 2 == 0 { Side::Buy } else { Side::Sell };
                    let cents = 10_000 + (i % 7) as i64 - 3;
                    book.add_order(order(id, side, cents, 1 + i % 9)).unwrap();
                    if i % 5 == 0 {
                        let _ = book.cancel_order(OrderId::new(id));
                    }
                }
            })
        })
        .collect();
    let reader = {
        let book = shared.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                book.read(|b| {
                    if let (Some(bid), Some(ask)) = (b.best_bid(), b.best_ask()) {
                        assert!(bid < ask);
                    }
                });
            }
        })
    };
    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    shared.check_invariants().unwrap();
    let restored = LimitOrderBook::restore(&shared.snapshot().unwrap()).unwrap();
    let book = shared.into_inner().unwrap();
    assert_eq!(restored.capture(), book.capture());
}
