use clap::Parser;
use log::info;
use server::map::FlatChunkProvider;
use server::network::Server;
use server::transport::TcpAcceptor;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then runs the tick loop until the
/// process receives a termination signal.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
        port: u16,
        /// Tick rate (synchronization passes per second)
        #[clap(short, long, default_value = "20")]
        tick_rate: u32,
    }

    // Parse command line arguments
    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpAcceptor::bind(&address)?;
    info!("listening for connections on {}", listener.local_addr()?);

    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate as f64);
    let mut server = Server::new(
        listener,
        Box::new(FlatChunkProvider::default()),
        tick_duration,
    );

    // Run until Ctrl+C, checked between ticks
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    info!("done");
    Ok(())
}
