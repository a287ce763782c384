//! 服务配置模块

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::sync::OnceCell;

/// 服务配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// 数据库路径
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// 配额扫描间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// 日志目录（设置后按天轮转写文件，否则输出到控制台）
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_db_path() -> String {
    "./data/rxui.db".to_string()
}

fn default_sweep_interval() -> u64 {
    10
}

static CONFIG: OnceCell<Config> = OnceCell::const_new();

/// 获取全局配置
pub async fn get_config() -> &'static Config {
    CONFIG.get_or_init(init_config).await
}

/// 初始化配置
///
/// 此函数在日志初始化之前运行，加载情况由 main 统一输出。
pub async fn init_config() -> Config {
    let config_paths = ["rxui.toml", "../rxui.toml"];

    for path_str in &config_paths {
        let path = Path::new(path_str);
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("无法读取配置文件: {}", path.display()))
                .unwrap();

            let config: Config = toml::from_str(&content)
                .with_context(|| "解析配置文件失败")
                .unwrap();

            return config;
        }
    }

    Config {
        db_path: default_db_path(),
        sweep_interval_secs: default_sweep_interval(),
        log_dir: None,
    }
}
