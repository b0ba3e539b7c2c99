use redis_lite::server::{Config, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args(std::env::args())?;

    let server = Server::bind(config).await?;
    server.serve().await
}
