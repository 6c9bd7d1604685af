use lob_engine::config::Settings;
use lob_engine::engine::{BookHandle, Command, EngineError, Outcome, Router};
use lob_engine::{BookError, LimitOrderBook, Order, OrderId, Price, Quantity, Side, Symbol, TickSize, UserId};

fn settings() -> Settings {
    Settings::from_yaml_str(
        r#"
markets:
  - symbol: AAPL
    tick_size: "0.01"
  - symbol: MSFT
    tick_size: "0.05"
channel_capacity: 16
depth_levels: 3
"#,
    )
    .unwrap()
}

fn submit(symbol: &str, id: u64, side: Side, price: &str, quantity: u64) -> Command {
    Command::Submit {
        symbol: symbol.to_string(),
        order_id: OrderId::new(id),
        user_id: format!("user-{id}"),
        side,
        price: price.to_string(),
        quantity,
    }
}

#[tokio::test]
async fn actor_matches_and_returns_book_on_shutdown() {
    let book = LimitOrderBook::new(Symbol::new("ACT").unwrap(), TickSize::CENT);
    let (handle, task) = BookHandle::spawn(book, 8);

    let ask = Order::new(
        OrderId::new(1),
        UserId::new("maker"),
        Side::Sell,
        Price::from_cents(15_050).unwrap(),
        Quantity::new(50).unwrap(),
    );
    assert!(handle.submit(ask).await.unwrap().is_empty());
    let bid = Order::new(
        OrderId::new(2),
        UserId::new("taker"),
        Side::Buy,
        Price::from_cents(15_100).unwrap(),
        Quantity::new(75).unwrap(),
    );
    let trades = handle.submit(bid).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, Price::from_cents(15_050).unwrap());

    let top = handle.top().await.unwrap();
    assert_eq!(top.best_bid, Some(Price::from_cents(15_100).unwrap()));
    assert_eq!(top.best_bid_quantity.map(Quantity::value), Some(25));
    assert_eq!(top.best_ask, None);

    assert!(matches!(
        handle.cancel(OrderId::new(1)).await,
        Err(EngineError::Book(BookError::OrderNotFound(_)))
    ));
    assert_eq!(handle.get(OrderId::new(2)).await.unwrap().unwrap().remaining_quantity.value(), 25);

    let bytes = handle.snapshot().await.unwrap();
    drop(handle);
    let book = task.await.unwrap();
    assert_eq!(LimitOrderBook::restore(&bytes).unwrap().capture(), book.capture());
}

#[tokio::test]
async fn closed_actor_reports_closed() {
    let book = LimitOrderBook::new(Symbol::new("GONE").unwrap(), TickSize::CENT);
    let (handle, task) = BookHandle::spawn(book, 1);
    task.abort();
    let _ = task.await;
    assert!(matches!(handle.depth(1).await, Err(EngineError::Closed(_))));
}

#[tokio::test]
async fn router_keeps_symbols_apart() {
    let router = Router::from_settings(&settings()).unwrap();

    let outcome = router.apply(submit("aapl", 1, Side::Sell, "150.00", 10)).await;
    assert!(matches!(outcome, Outcome::Accepted { ref trades, .. } if trades.is_empty()));
    let outcome = router.apply(submit("MSFT", 1, Side::Buy, "150.00", 10)).await;
    assert!(matches!(outcome, Outcome::Accepted { ref trades, .. } if trades.is_empty()));

    let Outcome::Depth { depth, .. } = router
        .apply(Command::Depth {
            symbol: "AAPL".into(),
            levels: None,
        })
        .await
    else {
        panic!("expected depth");
    };
    assert!(depth.bids.is_empty());
    assert_eq!(depth.asks.len(), 1);

    let outcome = router.apply(submit("MSFT", 2, Side::Sell, "150.03", 1)).await;
    assert!(matches!(outcome, Outcome::Rejected { ref reason } if reason.contains("tick")));

    let outcome = router.apply(submit("NOPE", 3, Side::Buy, "1.00", 1)).await;
    assert_eq!(
        outcome,
        Outcome::Rejected {
            reason: "unknown symbol NOPE".into()
        }
    );

    let outcome = router
        .apply(Command::Cancel {
            symbol: "AAPL".into(),
            order_id: OrderId::new(1),
        })
        .await;
    assert!(matches!(outcome, Outcome::Cancelled { ref order, .. } if order.remaining_quantity.value() == 10));

    let books = router.shutdown().await.unwrap();
    assert_eq!(books.len(), 2);
    assert!(books[0].is_empty());
    assert_eq!(books[1].order_count(), 1);
}

#[tokio::test]
async fn duplicate_symbol_is_refused() {
    let mut router = Router::new(4, 5);
    router
        .insert(LimitOrderBook::new(Symbol::new("DUP").unwrap(), TickSize::CENT))
        .unwrap();
    let err = router
        .insert(LimitOrderBook::new(Symbol::new("dup").unwrap(), TickSize::CENT))
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateSymbol(_)));
    router.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_submitters_keep_the_book_consistent() {
    let book = LimitOrderBook::new(Symbol::new("CONC").unwrap(), TickSize::CENT);
    let (handle, task) = BookHandle::spawn(book, 32);

    let mut joins = Vec::new();
    for worker in 0..4u64 {
        let handle = handle.clone();
        joins.push(tokio::spawn(async move {
            for i in 0..200u64 {
                let id = worker * 10_000 + i + 1;
                let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                let order = Order::new(
                    OrderId::new(id),
                    UserId::new(format!("w{worker}")),
                    side,
                    Price::from_cents(10_000 + (i % 5) as i64 - 2).unwrap(),
                    Quantity::new(1 + i % 4).unwrap(),
                );
                handle.submit(order).await.unwrap();
            }
        }));
    }
    for join in joins {
        join.await.unwrap();
    }
    drop(handle);
    let book = task.await.unwrap();
    book.check_invariants().unwrap();
}
