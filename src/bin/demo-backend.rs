//! Standalone demo backend: `/` greets, `/health` answers 200.

use clap::Parser;

use ring_proxy::demo::DemoServer;
use ring_proxy::lifecycle::signals::wait_for_signal;
use ring_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "demo-backend", about = "Demo backend server for ring-proxy", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:5001")]
    listen: String,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let server = DemoServer::spawn(args.listen.as_str()).await?;
    tracing::info!(address = %server.local_addr(), "Demo backend ready");

    wait_for_signal().await;
    server.shutdown().await;
    Ok(())
}
