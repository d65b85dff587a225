#[tokio::main]
async fn main() {
    if let Err(error) = entitlement_sync::app::run().await {
        tracing::error!("Service exited with error: {}", error);
        eprintln!("entitlement-sync: {}", error);
        std::process::exit(1);
    }
}
