//! Basic operator usage: build once, attach many times.

use futures::{stream, TryStreamExt};
use streamlift::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Operators from transformations ===\n");

    let squares_of_odds = to_operator(|input: BridgeStream<i64>| {
        input
            .try_filter(|x| futures::future::ready(x % 2 == 1))
            .map_ok(|x| x * x)
    })
    .named("squares_of_odds");

    // 1. Push events by hand into an attachment
    println!("1. Manual attachment:");
    let (mut upstream, delivery) = squares_of_odds.bind(Subscriber::new(
        PrintSink::with_prefix("  manual".to_string()),
    ));
    for i in 1..=5 {
        upstream.on_next(i);
    }
    upstream.on_complete();
    println!("  attachment {}", delivery.await);

    // 2. The same operator, attached after an ordinary stream
    println!("\n2. Lifted stream:");
    let collected: Vec<i64> = stream::iter((1..=9).map(Ok))
        .lift(&squares_of_odds)
        .try_collect()
        .await?;
    println!("  lifted: {:?}", collected);

    // 3. Errors pass through untouched
    println!("\n3. Error propagation:");
    let failing = stream::iter(vec![Ok(1), Ok(3), Err(Error::custom("sensor offline"))]);
    let collector = CollectSink::new();
    let mut upstream = squares_of_odds.attach(Subscriber::new(collector.clone()));
    let mut source = Box::pin(failing);
    while let Some(event) = futures::StreamExt::next(&mut source).await {
        match event {
            Ok(item) => upstream.on_next(item),
            Err(error) => upstream.on_error(error),
        }
    }
    match collector.wait_for_termination().await {
        Termination::Completed => println!("  completed with {:?}", collector.items()),
        Termination::Errored(e) => println!("  {:?} then error: {}", collector.items(), e),
    }

    Ok(())
}
