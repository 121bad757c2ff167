//! Integration tests for operator attachments

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use streamlift::prelude::*;
use tokio_util::sync::CancellationToken;

fn identity() -> Operator<i64, i64> {
    to_operator(|input: BridgeStream<i64>| input)
}

/// Operator that records every item reaching the transformation's input.
fn recording_identity(seen: Arc<Mutex<Vec<i64>>>) -> Operator<i64, i64> {
    to_operator(move |input: BridgeStream<i64>| {
        let seen = seen.clone();
        input.inspect_ok(move |x| seen.lock().unwrap().push(*x))
    })
}

#[tokio::test]
async fn test_identity_preserves_events_and_completion() {
    let collector = CollectSink::new();
    let mut upstream = identity().attach(Subscriber::new(collector.clone()));

    for i in 1..=3 {
        upstream.on_next(i);
    }
    upstream.on_complete();

    assert!(matches!(
        collector.wait_for_termination().await,
        Termination::Completed
    ));
    assert_eq!(collector.items(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_map_transform() {
    let double = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x * 2));
    let collector = CollectSink::new();
    let mut upstream = double.attach(Subscriber::new(collector.clone()));

    for i in 1..=3 {
        upstream.on_next(i);
    }
    upstream.on_complete();

    collector.wait_for_termination().await;
    assert_eq!(collector.items(), vec![2, 4, 6]);
}

#[tokio::test]
async fn test_filter_then_error() {
    let above_one = to_operator(|input: BridgeStream<i64>| {
        input.try_filter(|x| futures::future::ready(*x > 1))
    });
    let collector = CollectSink::new();
    let mut upstream = above_one.attach(Subscriber::new(collector.clone()));

    for i in 1..=3 {
        upstream.on_next(i);
    }
    upstream.on_error(Error::custom("Boom"));
    upstream.on_complete();

    match collector.wait_for_termination().await {
        Termination::Errored(e) => assert_eq!(e.to_string(), "Boom"),
        Termination::Completed => panic!("completion after error"),
    }
    assert_eq!(collector.items(), vec![2, 3]);
    assert_eq!(upstream.state(), AttachmentState::Errored);
}

#[tokio::test]
async fn test_completion_without_error() {
    let collector = CollectSink::new();
    let mut upstream = identity().attach(Subscriber::new(collector.clone()));

    upstream.on_complete();
    upstream.on_error(Error::custom("late"));

    assert!(matches!(
        collector.wait_for_termination().await,
        Termination::Completed
    ));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(
        collector.termination(),
        Some(Termination::Completed)
    ));
}

#[tokio::test]
async fn test_cancel_after_first_event() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let op = recording_identity(seen.clone());

    let collector = CollectSink::new();
    let subscriber = Subscriber::new(collector.clone());
    let token = subscriber.token().clone();
    let mut upstream = op.attach(subscriber);

    upstream.on_next(1);
    collector.wait_for_items(1).await;
    token.cancel();

    upstream.on_next(2);
    upstream.on_next(3);
    upstream.on_complete();
    assert!(upstream.is_unsubscribed());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(collector.items(), vec![1]);
    assert!(collector.termination().is_none());
}

#[tokio::test]
async fn test_downstream_cancels_from_inside_sink() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let op = recording_identity(seen.clone());

    let token = CancellationToken::new();
    let received = Arc::new(AtomicUsize::new(0));
    let received_ref = received.clone();
    let cancel = token.clone();
    let sink = sink_from_fn(move |n: Notification<i64>| {
        if let Notification::Next(_) = n {
            received_ref.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
        }
    });
    let mut upstream = op.attach(Subscriber::with_token(sink, token));

    upstream.on_next(1);
    while received.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    for i in 2..=10 {
        upstream.on_next(i);
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_transform_termination_stops_upstream() {
    let first = to_operator(|input: BridgeStream<i64>| input.take(1));
    let collector = CollectSink::new();
    let mut upstream = first.attach(Subscriber::new(collector.clone()));

    upstream.on_next(1);
    assert!(matches!(
        collector.wait_for_termination().await,
        Termination::Completed
    ));
    upstream.on_next(2);

    assert_eq!(upstream.state(), AttachmentState::Completed);
    assert!(upstream.is_unsubscribed());
    assert_eq!(collector.items(), vec![1]);
}

#[tokio::test]
async fn test_dropped_upstream_completes_downstream() {
    let collector = CollectSink::new();
    let mut upstream = identity().attach(Subscriber::new(collector.clone()));

    upstream.on_next(1);
    drop(upstream);

    let termination = tokio::time::timeout(
        Duration::from_millis(200),
        collector.wait_for_termination(),
    )
    .await
    .expect("downstream should terminate once upstream is dropped");
    assert!(matches!(termination, Termination::Completed));
    assert_eq!(collector.items(), vec![1]);
}

#[tokio::test]
async fn test_attachments_are_isolated() {
    let op = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x + 100));

    let left = CollectSink::new();
    let right = CollectSink::new();
    let mut up_left = op.attach(Subscriber::new(left.clone()));
    let mut up_right = op.clone().attach(Subscriber::new(right.clone()));

    up_left.on_next(1);
    up_right.on_next(2);
    up_left.on_next(3);
    up_right.on_error(Error::custom("right failed"));
    up_left.on_complete();

    assert!(matches!(
        left.wait_for_termination().await,
        Termination::Completed
    ));
    assert!(matches!(
        right.wait_for_termination().await,
        Termination::Errored(_)
    ));
    assert_eq!(left.items(), vec![101, 103]);
    assert_eq!(right.items(), vec![102]);
}

#[tokio::test]
async fn test_stateful_transform_is_per_attachment() {
    let running_sum = to_operator(|input: BridgeStream<i64>| {
        input.scan(0i64, |acc, item| {
            let out = item.map(|x| {
                *acc += x;
                *acc
            });
            futures::future::ready(Some(out))
        })
    });

    let a: Vec<i64> = stream::iter((1..=4).map(Ok))
        .lift(&running_sum)
        .try_collect()
        .await
        .unwrap();
    let b: Vec<i64> = stream::iter((10..=11).map(Ok))
        .lift(&running_sum)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(a, vec![1, 3, 6, 10]);
    assert_eq!(b, vec![10, 21]);
}

#[tokio::test]
async fn test_fan_out_inside_transform() {
    // Pair every item with its successor using two subscriptions to the bridge.
    let pairs = to_operator(|input: BridgeStream<i64>| {
        let next = input.resubscribe().skip(1);
        input
            .zip(next)
            .map(|(a, b)| -> Result<(i64, i64)> { Ok((a?, b?)) })
    });

    let out: Vec<(i64, i64)> = stream::iter((1..=4).map(Ok))
        .lift(&pairs)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(out, vec![(1, 2), (2, 3), (3, 4)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ordering_across_threads() {
    let collector = CollectSink::new();
    let mut upstream = identity().attach(Subscriber::new(collector.clone()));

    let producer = tokio::task::spawn_blocking(move || {
        for i in 0..1000 {
            upstream.on_next(i);
        }
        upstream.on_complete();
    });

    collector.wait_for_termination().await;
    producer.await.unwrap();
    assert_eq!(collector.items(), (0..1000).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_races_with_emission() {
    for _ in 0..20 {
        let counter = CountSink::new();
        let subscriber = Subscriber::new(counter.clone());
        let token = subscriber.token().clone();
        let mut upstream = identity().attach(subscriber);

        let producer = tokio::task::spawn_blocking(move || {
            for i in 0..500 {
                upstream.on_next(i);
            }
            upstream.on_complete();
            upstream.state()
        });
        token.cancel();

        let state = producer.await.unwrap();
        assert!(matches!(
            state,
            AttachmentState::Cancelled | AttachmentState::Completed
        ));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let settled = counter.count();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(counter.count(), settled);
    }
}

#[tokio::test]
async fn test_bind_on_local_executor() {
    let collector = CollectSink::new();
    let (mut upstream, delivery) = identity()
        .named("local")
        .bind(Subscriber::new(collector.clone()));

    let feeder = async move {
        for i in 1..=3 {
            upstream.on_next(i);
            tokio::task::yield_now().await;
        }
        upstream.on_complete();
    };

    let ((), state) = futures::join!(feeder, delivery);
    assert_eq!(state, AttachmentState::Completed);
    assert_eq!(collector.items(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_chained_lifts() {
    let double = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x * 2));
    let to_string = to_operator(|input: BridgeStream<i64>| input.map_ok(|x| x.to_string()));

    let out: Vec<String> = stream::iter((1..=3).map(Ok))
        .lift(&double)
        .lift(&to_string)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(out, vec!["2", "4", "6"]);
}
