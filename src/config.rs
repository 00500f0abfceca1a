//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CCF__*` 覆盖（双下划线表示嵌套，如 `CCF__TIMING__POLL_INTERVAL_MS=30`）。
//! 每个段都带默认值，没有配置文件时使用内置常量。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub dedup: DedupSection,
    pub timing: TimingSection,
    pub script: ScriptSection,
    pub call: CallSection,
    pub gacha: GachaSection,
    pub catalog: CatalogSection,
    pub browser: BrowserSection,
}

/// [app] 段：持久化数据目录
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppSection {
    /// 去重账本、目录缓存的根目录，未设置时用 ./data
    pub data_dir: Option<PathBuf>,
}

impl AppSection {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data"))
    }
}

/// [dedup] 段：会话账本（轻量指令）与持久账本（重量指令）的 TTL 与容量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupSection {
    pub session_ttl_secs: u64,
    pub session_max_entries: usize,
    pub durable_ttl_secs: u64,
    pub durable_max_entries: usize,
    /// 持久账本文件名（相对 data_dir）
    pub durable_file: String,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            session_ttl_secs: 10 * 60,
            session_max_entries: 500,
            durable_ttl_secs: 30 * 60,
            durable_max_entries: 300,
            durable_file: "processed.json".to_string(),
        }
    }
}

/// [timing] 段：所有轮询、等待与自删除延迟（毫秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub poll_interval_ms: u64,
    /// 上次成功坐标处等待菜单的时长
    pub last_point_menu_wait_ms: u64,
    pub menu_wait_ms: u64,
    pub edit_menu_wait_ms: u64,
    pub dialog_wait_ms: u64,
    pub menu_dismiss_settle_ms: u64,
    pub field_write_gap_ms: u64,
    pub commit_settle_ms: u64,
    pub hover_settle_ms: u64,
    pub editor_poll_attempts: u32,
    pub retract_delay_ms: u64,
    pub execute_retract_delay_ms: u64,
    pub reply_cooldown_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            last_point_menu_wait_ms: 500,
            menu_wait_ms: 700,
            edit_menu_wait_ms: 800,
            dialog_wait_ms: 2000,
            menu_dismiss_settle_ms: 40,
            field_write_gap_ms: 20,
            commit_settle_ms: 50,
            hover_settle_ms: 40,
            editor_poll_attempts: 30,
            retract_delay_ms: 1000,
            execute_retract_delay_ms: 100,
            reply_cooldown_ms: 700,
        }
    }
}

impl TimingSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 全部时长压到几毫秒，供测试使用
    pub fn instant() -> Self {
        Self {
            poll_interval_ms: 1,
            last_point_menu_wait_ms: 5,
            menu_wait_ms: 5,
            edit_menu_wait_ms: 5,
            dialog_wait_ms: 5,
            menu_dismiss_settle_ms: 0,
            field_write_gap_ms: 0,
            commit_settle_ms: 0,
            hover_settle_ms: 0,
            editor_poll_attempts: 3,
            retract_delay_ms: 1,
            execute_retract_delay_ms: 1,
            reply_cooldown_ms: 0,
        }
    }
}

/// [script] 段：.execute 的默认行间等待，按行首 token 查表
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptSection {
    pub default_wait_ms: u64,
    pub prefix_waits: Vec<PrefixWait>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PrefixWait {
    pub prefix: String,
    pub wait_ms: u64,
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            default_wait_ms: 200,
            prefix_waits: vec![
                PrefixWait {
                    prefix: ".move".into(),
                    wait_ms: 700,
                },
                PrefixWait {
                    prefix: ".call".into(),
                    wait_ms: 1000,
                },
            ],
        }
    }
}

/// [call] 段：召唤数量上限与连续贴入间隔
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallSection {
    pub max_count: u32,
    pub clone_gap_ms: u64,
}

impl Default for CallSection {
    fn default() -> Self {
        Self {
            max_count: 10,
            clone_gap_ms: 500,
        }
    }
}

/// [gacha] 段：抽卡次数、稀有度权重、棋子尺寸与摆放位置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GachaSection {
    pub draw_count: usize,
    /// ★1 / ★2 / ★3 的百分比权重，合计 100
    pub rarity_weights: [u32; 3],
    pub token_size: u32,
    pub step_wait_ms: u64,
    /// 各抽的中心坐标；不足时沿用最后一个
    pub layout_centers: Vec<LayoutPoint>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct LayoutPoint {
    pub x: f64,
    pub y: f64,
}

impl Default for GachaSection {
    fn default() -> Self {
        Self {
            draw_count: 5,
            rarity_weights: [75, 20, 5],
            token_size: 7,
            step_wait_ms: 500,
            layout_centers: [-240.0, -120.0, 0.0, 120.0, 240.0]
                .into_iter()
                .map(|x| LayoutPoint { x, y: -240.0 })
                .collect(),
        }
    }
}

/// [catalog] 段：远端只读数据源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub monster_url: String,
    pub gacha_url: String,
    pub request_timeout_secs: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            monster_url:
                "https://raw.githubusercontent.com/4bxy/SWmonsterDB/refs/heads/main/monsterDBv8.json"
                    .to_string(),
            gacha_url: "https://raw.githubusercontent.com/4bxy/SWmonsterDB/refs/heads/main/gachaRS.json"
                .to_string(),
            request_timeout_secs: 20,
        }
    }
}

/// [browser] 段：连接已打开的 Chrome（remote debugging）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    /// 形如 ws://127.0.0.1:9222/devtools/browser/<id>
    pub debug_ws_url: Option<String>,
    /// 用于挑选目标标签页的 URL 片段
    pub page_url_contains: String,
    pub watch_interval_ms: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            debug_ws_url: None,
            page_url_contains: "ccfolia.com/rooms".to_string(),
            watch_interval_ms: 300,
        }
    }
}

/// 从 config 目录加载配置，环境变量 CCF__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CCF__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CCF")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
