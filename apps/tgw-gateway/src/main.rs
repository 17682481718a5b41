//! 遥测网关：UDP 事件接入，转发到协议变量汇与远端日志收集器。

mod lifecycle;

use lifecycle::Gateway;
use std::sync::Arc;
use tgw_config::GatewayConfig;
use tgw_protocol::LoggingProtocolSink;
use tgw_telemetry::{init_tracing, metrics};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let config = GatewayConfig::from_env()?;
    init_tracing();

    let gateway = Gateway::new(&config, Arc::new(LoggingProtocolSink));
    // 任一组件启动失败即退出（已启动的组件会被回滚）
    gateway.start().await?;

    shutdown_signal().await;
    info!(target: "tgw.gateway", "shutdown_signal_received");
    gateway.stop().await;
    info!(target: "tgw.gateway", metrics = ?metrics().snapshot(), "final_metrics");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(target: "tgw.gateway", error = %err, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(target: "tgw.gateway", error = %err, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
