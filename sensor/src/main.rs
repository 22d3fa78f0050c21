mod host;
mod sweep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
