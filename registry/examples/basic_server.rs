//! Basic registry server over an in-memory store.
//!
//! Run with: cargo run -p registry --example basic_server

use registry::RegistryBuilder;
use store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let app = RegistryBuilder::new()
        .store(Store::create("memory:")?)
        .build();

    let addr = "127.0.0.1:5000";
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("registry listening on http://{addr}");
    tracing::info!("try: docker push {addr}/hello-world");

    axum::serve(listener, app).await?;
    Ok(())
}
