#[tokio::main]
async fn main() -> anyhow::Result<()> {
    foldertree_lib::run().await
}
