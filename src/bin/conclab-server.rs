use clap::Parser;
use conclab::server::Server;
use conclab::Result;
use slog::*;
use std::{net::SocketAddr, process::exit, time::Duration};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[clap(version, author, about = "Serves the request-counting HTTP server until Ctrl-C")]
struct Options {
    #[clap(long, short, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() {
    let logger = logger();
    let options = Options::parse();

    let code = match run(options.addr, &logger).await {
        Ok(()) => 0,
        Err(e) => {
            error!(&logger, "{}", e);
            1
        }
    };
    drop(logger);
    exit(code);
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!())
}

async fn run(addr: SocketAddr, logger: &Logger) -> Result<()> {
    info!(logger, "conclab-server initializing";
        "version" => env!("CARGO_PKG_VERSION"),
        "ip" => %addr
    );
    let server = Server::with_logger(addr, logger.clone()).start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(logger, "unable to listen for ctrl-c"; "error" => %e);
    }
    server.stop(SHUTDOWN_TIMEOUT).await
}
