use conclab::channels::{
    buffered_channel_processor, buffered_map, consumer, merge_channels, producer,
    producer_with_interval,
};
use conclab::Context;
use crossbeam::channel::{bounded, unbounded, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

fn closed_channel_of(values: &[i64]) -> crossbeam::channel::Receiver<i64> {
    let (tx, rx) = bounded(values.len());
    for value in values {
        tx.send(*value).unwrap();
    }
    rx
}

#[test]
fn producer_emits_count_values_then_closes() {
    let ctx = Context::new().with_timeout(Duration::from_secs(5));
    let stream = producer(&ctx, 5);
    let values: Vec<i64> = stream.iter().collect();
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
}

#[test]
fn producer_stops_when_cancelled() {
    let ctx = Context::new();
    let stream = producer_with_interval(&ctx, 1000, Duration::from_millis(20));
    assert_eq!(stream.recv_timeout(Duration::from_secs(1)), Ok(0));
    ctx.cancel();

    let start = Instant::now();
    let rest = consumer(&Context::new(), &stream, Duration::from_secs(3));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(rest.len() <= 1);
}

#[test]
fn producer_with_zero_count_closes_immediately() {
    let stream = producer(&Context::new(), 0);
    assert_eq!(
        stream.recv_timeout(Duration::from_secs(1)),
        Err(RecvTimeoutError::Disconnected)
    );
}

#[test]
fn merged_stream_carries_every_value_and_closes() {
    let ctx = Context::new().with_timeout(Duration::from_secs(5));
    let (first_tx, first) = unbounded();
    let (second_tx, second) = unbounded();
    thread::spawn(move || {
        for i in 0..3 {
            first_tx.send(i).unwrap();
        }
    });
    thread::spawn(move || {
        for i in 3..6 {
            second_tx.send(i).unwrap();
        }
    });

    let merged = merge_channels(&ctx, vec![first, second]);
    let start = Instant::now();
    let mut values = consumer(&ctx, &merged, Duration::from_secs(3));
    assert!(start.elapsed() < Duration::from_secs(2), "merged stream never closed");

    values.sort_unstable();
    assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn merged_stream_keeps_order_within_each_input() {
    let ctx = Context::new().with_timeout(Duration::from_secs(5));
    let a = producer_with_interval(&ctx, 5, Duration::from_millis(5));
    let b = buffered_map(
        producer_with_interval(&ctx, 5, Duration::from_millis(7)),
        0,
        |v| v + 100,
    );
    let merged = merge_channels(&ctx, vec![a, b]);

    let values: Vec<i64> = merged.iter().collect();
    let from_a: Vec<i64> = values.iter().copied().filter(|v| *v < 100).collect();
    let from_b: Vec<i64> = values.iter().copied().filter(|v| *v >= 100).collect();
    assert_eq!(from_a, vec![0, 1, 2, 3, 4]);
    assert_eq!(from_b, vec![100, 101, 102, 103, 104]);
}

#[test]
fn merge_of_no_inputs_is_closed() {
    let merged = merge_channels::<i64>(&Context::new(), Vec::new());
    assert!(merged.recv().is_err());
}

#[test]
fn merge_stops_relaying_when_cancelled() {
    let ctx = Context::new();
    let (tx, silent) = unbounded::<i64>();
    let merged = merge_channels(&ctx, vec![silent]);

    ctx.cancel();
    assert_eq!(
        merged.recv_timeout(Duration::from_secs(1)),
        Err(RecvTimeoutError::Disconnected)
    );
    drop(tx);
}

#[test]
fn buffered_processor_doubles_in_order() {
    let output = buffered_channel_processor(closed_channel_of(&[1, 2, 3, 4, 5]), 3);
    let values: Vec<i64> = output.iter().collect();
    assert_eq!(values, vec![2, 4, 6, 8, 10]);
}

#[test]
fn buffered_stage_runs_ahead_of_the_reader() {
    let output = buffered_channel_processor(closed_channel_of(&[1, 2, 3, 4, 5]), 3);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(output.len(), 3);
}

#[test]
fn buffered_processor_wraps_on_overflow() {
    let output = buffered_channel_processor(closed_channel_of(&[i64::MAX, 7]), 2);
    let values: Vec<i64> = output.iter().collect();
    assert_eq!(values, vec![i64::MAX.wrapping_mul(2), 14]);
}

#[test]
fn buffered_map_applies_any_transform() {
    let (tx, rx) = unbounded();
    let output = buffered_map(rx, 2, |word: &str| word.len());
    for word in &["a", "bb", "ccc"] {
        tx.send(*word).unwrap();
    }
    drop(tx);
    assert_eq!(output.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn consumer_times_out_on_a_silent_stream() {
    let ctx = Context::new().with_timeout(Duration::from_secs(2));
    let (_tx, silent) = unbounded::<i64>();

    let start = Instant::now();
    let values = consumer(&ctx, &silent, Duration::from_millis(100));
    assert!(values.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn consumer_returns_when_cancelled() {
    let ctx = Context::new();
    ctx.cancel();
    let (_tx, silent) = unbounded::<i64>();
    assert!(consumer(&ctx, &silent, Duration::from_secs(5)).is_empty());
}

#[test]
fn consumer_collects_until_input_ends() {
    let ctx = Context::new().with_timeout(Duration::from_secs(2));
    let (tx, input) = bounded(0);
    thread::spawn(move || {
        for i in 0..5 {
            tx.send(i).unwrap();
            thread::sleep(Duration::from_millis(20));
        }
    });

    let values = consumer(&ctx, &input, Duration::from_secs(1));
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
}

#[test]
fn consumer_shorter_than_producer_cadence_is_empty() {
    let ctx = Context::new().with_timeout(Duration::from_secs(2));
    let (tx, input) = bounded::<i64>(0);
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        let _ = tx.send(1);
    });

    assert!(consumer(&ctx, &input, Duration::from_millis(100)).is_empty());
    drop(input);
    sender.join().unwrap();
}
