use seating_server::{Server, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 配置, 工作目录, 日志)
    let config = setup_environment()?;

    print_banner();
    tracing::info!("Seating server starting...");

    // 2. 运行直到 Ctrl-C
    let server = Server::new(config);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = server.run(shutdown).await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
