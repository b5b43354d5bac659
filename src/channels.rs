//! Stream combinators over crossbeam channels.
//!
//! Each stage runs on its own thread and owns the sending half of its output;
//! a stream is finished when every sender is gone.

use crossbeam::channel::{after, at, bounded, Receiver};
use crossbeam::select;
use std::thread;
use std::time::{Duration, Instant};

use crate::context::Context;

/// Pause between two values of [`producer`].
pub const PRODUCER_INTERVAL: Duration = Duration::from_millis(100);

/// Emits `0..count`, one value every [`PRODUCER_INTERVAL`].
pub fn producer(ctx: &Context, count: usize) -> Receiver<i64> {
    producer_with_interval(ctx, count, PRODUCER_INTERVAL)
}

pub fn producer_with_interval(ctx: &Context, count: usize, interval: Duration) -> Receiver<i64> {
    let (out, stream) = bounded(0);
    let ctx = ctx.clone();
    thread::spawn(move || {
        for i in 0..count {
            let sent = select! {
                send(out, i as i64) -> res => res.is_ok(),
                recv(ctx.done()) -> _ => false,
            };
            if !sent {
                return;
            }
            if i + 1 == count {
                break;
            }
            let cancelled = select! {
                recv(after(interval)) -> _ => false,
                recv(ctx.done()) -> _ => true,
            };
            if cancelled {
                return;
            }
        }
    });
    stream
}

/// Fan-in: relays every value of every input onto one stream, in arrival
/// order. The merged stream ends once all inputs have ended or `ctx` fires.
pub fn merge_channels<T>(ctx: &Context, inputs: Vec<Receiver<T>>) -> Receiver<T>
where
    T: Send + 'static,
{
    let (out, merged) = bounded(0);
    for input in inputs {
        // each relay owns a sender; the last one to finish closes `merged`
        let out = out.clone();
        let ctx = ctx.clone();
        thread::spawn(move || loop {
            let value = select! {
                recv(input) -> value => value.ok(),
                recv(ctx.done()) -> _ => None,
            };
            let value = match value {
                Some(value) => value,
                None => return,
            };
            let relayed = select! {
                send(out, value) -> res => res.is_ok(),
                recv(ctx.done()) -> _ => false,
            };
            if !relayed {
                return;
            }
        });
    }
    merged
}

/// Doubles every value (wrapping on overflow), keeping up to `buffer_size`
/// results ahead of the reader.
pub fn buffered_channel_processor(input: Receiver<i64>, buffer_size: usize) -> Receiver<i64> {
    buffered_map(input, buffer_size, |value| value.wrapping_mul(2))
}

/// Applies `f` to every value of `input` in order. The output closes when
/// `input` is exhausted, and the stage stops early if the output reader
/// goes away.
pub fn buffered_map<T, U, F>(input: Receiver<T>, buffer_size: usize, f: F) -> Receiver<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + 'static,
{
    let (out, output) = bounded(buffer_size);
    thread::spawn(move || {
        for value in input.iter() {
            if out.send(f(value)).is_err() {
                break;
            }
        }
    });
    output
}

/// Collects values from `input` until it ends, `timeout` elapses or `ctx`
/// fires, whichever comes first.
pub fn consumer<T>(ctx: &Context, input: &Receiver<T>, timeout: Duration) -> Vec<T> {
    let deadline = Instant::now() + timeout;
    let timer = at(deadline);
    let mut values = Vec::new();
    loop {
        let value = select! {
            recv(input) -> value => value.ok(),
            recv(timer) -> _ => None,
            recv(ctx.done()) -> _ => None,
        };
        match value {
            Some(value) => values.push(value),
            None => return values,
        }
    }
}
