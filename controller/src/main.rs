mod api;
mod host;
mod publisher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
