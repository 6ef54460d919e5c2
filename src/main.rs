use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = edge_forwarder::cli::Cli::parse();
    if let Err(e) = edge_forwarder::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
