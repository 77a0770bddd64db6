use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tokio_rdt::{
    bind_udp, default_server_addr, FaultConfig, LossyTransport, RdtConfiguration, RdtSender,
};
use tracing::{error, info, Level};

/// Sends numbered messages to a receiver with stop-and-wait ARQ.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Address of the receiver.
    #[arg(short, long, default_value_t = default_server_addr())]
    server: SocketAddr,
    /// Local address to send from.
    #[arg(short, long, default_value = "127.0.0.1:0")]
    bind: SocketAddr,
    /// Number of messages to send before DONE.
    #[arg(short, long, default_value_t = 20)]
    count: usize,
    /// Initial retransmission timeout.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Ceiling of the retransmission timeout.
    #[arg(long, default_value_t = 5000)]
    max_timeout_ms: u64,
    /// Timeout multiplier from the second retry of a message onwards.
    #[arg(long, default_value_t = 1.5)]
    backoff: f64,
    /// Transmissions of a packet before giving up.
    #[arg(long, default_value_t = 10)]
    max_retries: u32,
    /// Pause between messages.
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
    #[command(flatten)]
    faults: FaultConfig,
    /// Log every packet.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = RdtConfiguration {
        base_timeout: Duration::from_millis(cli.timeout_ms),
        max_timeout: Duration::from_millis(cli.max_timeout_ms),
        backoff_factor: cli.backoff,
        max_retries: cli.max_retries,
        message_interval: Duration::from_millis(cli.interval_ms),
        ..Default::default()
    };

    let socket = match bind_udp(cli.bind, &config) {
        Ok(socket) => socket,
        Err(err) => {
            error!("cannot bind {}: {}", cli.bind, err);
            return ExitCode::FAILURE;
        }
    };
    let transport = LossyTransport::new(socket, cli.faults);
    let mut sender = match RdtSender::new(transport, cli.server, config) {
        Ok(sender) => sender,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let messages: Vec<String> = (0..cli.count)
        .map(|n| format!("Message-{}-Seq-{}", n, n % 256))
        .collect();

    info!("sending {} messages to {}", cli.count, cli.server);
    match sender.transfer(messages).await {
        Ok(report) => {
            info!(
                "transfer complete: {} delivered, {} transmissions ({} retransmissions), DONE {}",
                report.delivered,
                report.transmissions,
                report.retransmissions,
                if report.terminated { "acknowledged" } else { "unacknowledged" }
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let report = sender.report();
            error!(
                "transfer failed after {} of {} messages: {}",
                report.delivered, cli.count, err
            );
            ExitCode::FAILURE
        }
    }
}
