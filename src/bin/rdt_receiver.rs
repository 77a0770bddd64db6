use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tokio_rdt::{
    bind_udp, default_server_addr, FaultConfig, LossyTransport, RdtConfiguration, RdtReceiver,
};
use tracing::{error, info, Level};

/// Receives one stop-and-wait session and prints the delivered messages.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Local address to listen on.
    #[arg(short, long, default_value_t = default_server_addr())]
    bind: SocketAddr,
    /// Keep acknowledging retransmitted DONE packets for this long after shutdown.
    #[arg(long)]
    linger_ms: Option<u64>,
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
        linger_timeout: cli.linger_ms.map(Duration::from_millis),
        ..Default::default()
    };

    let socket = match bind_udp(cli.bind, &config) {
        Ok(socket) => socket,
        Err(err) => {
            error!("cannot bind {}: {}", cli.bind, err);
            return ExitCode::FAILURE;
        }
    };
    info!("listening on {}", cli.bind);

    let transport = LossyTransport::new(socket, cli.faults);
    let mut receiver = match RdtReceiver::new(transport, config) {
        Ok(receiver) => receiver,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match receiver.serve().await {
        Ok(report) => {
            for message in &report.messages {
                println!("{}", String::from_utf8_lossy(message));
            }
            info!(
                "session closed: {} accepted, {} duplicates, {} dropped",
                report.accepted, report.duplicates, report.dropped
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("receiver failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
