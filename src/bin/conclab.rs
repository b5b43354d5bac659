use clap::{Parser, Subcommand};
use conclab::channels::{buffered_channel_processor, consumer, merge_channels, producer};
use conclab::server::Server;
use conclab::{process_items, Context, Counter, MutexCounter, Result, Task, TaskOutcome, WorkerPool};
use crossbeam::channel::bounded;
use slog::*;
use std::{net::SocketAddr, process::exit, thread, time::Duration};

#[derive(Parser)]
#[clap(version, author, about = "Walks through the concurrency demonstrations")]
struct Options {
    /// Number of workers in the pool demonstration
    #[clap(long, short, default_value = "3")]
    workers: usize,

    /// Address the HTTP server binds to
    #[clap(long, short, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Seconds the HTTP server stays up before shutting down
    #[clap(long, default_value = "2")]
    serve_for: u64,

    #[clap(subcommand)]
    demo: Option<Demo>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Demo {
    /// Threads incrementing a shared counter
    Threads,
    /// Producers merged into a consumer, plus a buffered stage
    Channels,
    /// A batch of tasks through the worker pool
    Pool,
    /// The HTTP server, stopped gracefully after --serve-for seconds
    Serve,
    /// Everything above, in order
    All,
}

fn main() {
    let logger = logger();
    let options = Options::parse();

    let code = match run(&options, &logger) {
        Ok(()) => 0,
        Err(e) => {
            error!(&logger, "{}", e);
            1
        }
    };
    // flush the async drain before exiting
    drop(logger);
    exit(code);
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!())
}

fn run(options: &Options, logger: &Logger) -> Result<()> {
    let demo = options.demo.unwrap_or(Demo::All);
    info!(logger, "conclab starting";
        "version" => env!("CARGO_PKG_VERSION"),
        "demo" => ?demo
    );

    if demo == Demo::Threads || demo == Demo::All {
        demo_threads(logger);
    }
    if demo == Demo::Channels || demo == Demo::All {
        demo_channels(logger);
    }
    if demo == Demo::Pool || demo == Demo::All {
        demo_pool(options.workers, logger)?;
    }
    if demo == Demo::Serve || demo == Demo::All {
        demo_serve(options.addr, Duration::from_secs(options.serve_for), logger)?;
    }

    info!(logger, "demonstration finished");
    Ok(())
}

fn demo_threads(logger: &Logger) {
    let counter = MutexCounter::new();
    process_items((0..5).collect(), |id: usize| {
        let value = counter.increment();
        info!(logger, "thread incremented counter"; "thread" => id, "value" => value);
        thread::sleep(Duration::from_millis(100));
    });
    info!(logger, "final counter value"; "value" => counter.value());
}

fn demo_channels(logger: &Logger) {
    let ctx = Context::new().with_timeout(Duration::from_secs(3));

    let first = producer(&ctx, 3);
    let second = producer(&ctx, 3);
    let merged = merge_channels(&ctx, vec![first, second]);
    let values = consumer(&ctx, &merged, Duration::from_secs(2));
    info!(logger, "received values"; "values" => ?values);

    let (input, stream) = bounded(5);
    for value in 1..=5 {
        // capacity matches the count, so this never blocks
        let _ = input.send(value);
    }
    drop(input);
    let doubled: Vec<i64> = buffered_channel_processor(stream, 3).iter().collect();
    info!(logger, "buffered stage output"; "values" => ?doubled);
}

fn demo_pool(workers: usize, logger: &Logger) -> Result<()> {
    let ctx = Context::new().with_timeout(Duration::from_secs(5));
    let mut pool = WorkerPool::with_logger(workers, logger.new(o!("component" => "pool")))?;

    let tasks = Task::batch((1..=5).map(|i| format!("task{}", i)));
    let outcomes = pool.process_tasks(&ctx, tasks, |task: Task<String>| {
        thread::sleep(Duration::from_millis(100));
        TaskOutcome::ok(task.id(), format!("{}_processed", task.payload()))
    })?;
    pool.stop()?;

    info!(logger, "tasks processed"; "count" => outcomes.len());
    for outcome in outcomes {
        info!(logger, "task outcome";
            "task" => outcome.task_id,
            "output" => ?outcome.output
        );
    }
    Ok(())
}

fn demo_serve(addr: SocketAddr, serve_for: Duration, logger: &Logger) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = Server::with_logger(addr, logger.new(o!("component" => "server")))
            .start()
            .await?;
        info!(logger, "try it out"; "command" => format!("curl http://{}/", server.local_addr()));

        tokio::time::sleep(serve_for).await;
        server.stop(Duration::from_secs(5)).await
    })
}
