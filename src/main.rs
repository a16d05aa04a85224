use artifacts_store::models::Variant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    artifacts_store::cli::run(Variant::Archive).await
}
