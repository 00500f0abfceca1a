//! CCF 主程序
//!
//! 入口：加载配置与日志，连接浏览器中的房间页面，启动聊天监听与指令引擎，收到信号后落盘账本退出。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ccf::catalog::{Catalog, CatalogSpec};
use ccf::config::load_config;
use ccf::core::{LedgerFlush, ShutdownCoordinator, ShutdownManager, ShutdownReason, SystemClock};
use ccf::ui::{CdpAdapter, ChatWatcher};
use ccf::{observability, Engine};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 可选参数：额外的配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    observability::init();

    let data_dir = config.app.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let timeout = Duration::from_secs(config.catalog.request_timeout_secs);
    let catalog_dir = data_dir.join("catalog");
    let monsters = Arc::new(Catalog::new(
        CatalogSpec {
            name: "monsters".into(),
            url: config.catalog.monster_url.clone(),
            bucket_field: None,
            timeout,
        },
        &catalog_dir,
    ));
    let gacha_items = Arc::new(Catalog::new(
        CatalogSpec {
            name: "gacha".into(),
            url: config.catalog.gacha_url.clone(),
            bucket_field: Some("rarity".into()),
            timeout,
        },
        &catalog_dir,
    ));

    let ws_url = config
        .browser
        .debug_ws_url
        .clone()
        .context("browser.debug_ws_url is not set (start Chrome with --remote-debugging-port)")?;
    let page_filter = config.browser.page_url_contains.clone();
    let adapter = tokio::task::spawn_blocking(move || CdpAdapter::connect(&ws_url, &page_filter))
        .await
        .context("Browser connect task panicked")?
        .context("Failed to attach to room tab")?;
    let watcher = ChatWatcher::new(
        adapter.tab(),
        Duration::from_millis(config.browser.watch_interval_ms),
    );

    let engine = Arc::new(
        Engine::new(
            Arc::new(adapter),
            Arc::new(SystemClock),
            config,
            monsters.clone(),
            gacha_items.clone(),
        )
        .context("Failed to create engine")?,
    );

    // 后台预热目录，首条指令不用等网络
    for catalog in [monsters, gacha_items] {
        tokio::spawn(async move {
            catalog.ensure_ready().await;
        });
    }

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let token = shutdown.token();

    let (tx, rx) = mpsc::channel(256);
    let watcher_task = {
        let token = token.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = watcher.run(tx, token).await {
                tracing::error!(error = %e, "Chat watcher exited");
            }
            if !shutdown.is_shutdown() {
                shutdown.shutdown(ShutdownReason::WatcherClosed);
            }
        })
    };

    engine.clone().run(rx, token).await;
    let _ = watcher_task.await;

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(LedgerFlush::new(engine.durable_ledger()));
    coordinator.run_cleanup().await;
    tracing::info!("Bye");
    Ok(())
}
