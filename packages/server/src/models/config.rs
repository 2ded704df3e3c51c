use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use super::rule::{Settings, DEFAULT_ACTION_SECONDS, MIN_KILLERS};

/// 環境変数から読み込んだ設定。`.env` の読み込み後に初めて参照すること。
pub static CONFIG: Lazy<GameConfig> = Lazy::new(GameConfig::from_env);

#[derive(Debug, Clone)]
pub struct GameConfig {
    // 単一テーブル運用時のセッションキー
    pub session_key: String,
    pub bind_addr: String,
    pub cors_origin: String,
    // 新しいロビーの初期設定
    pub default_settings: Settings,
    // 最終更新からこの時間が経つと放置セッションとして扱う
    pub stale_after: Duration,
    // 全員準備完了から開始までの猶予
    pub start_grace: Duration,
    // 固定シード（デバッグ用）
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            session_key: "global".to_string(),
            bind_addr: "127.0.0.1:8080".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            default_settings: Settings::default(),
            stale_after: Duration::from_secs(60 * 60),
            start_grace: Duration::from_millis(2000),
            rng_seed: None,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_key = env::var("MAFIA_SESSION_KEY").unwrap_or(defaults.session_key);
        let bind_addr = env::var("MAFIA_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let cors_origin = env::var("MAFIA_CORS_ORIGIN").unwrap_or(defaults.cors_origin);
        let killer_count = env::var("MAFIA_DEFAULT_KILLER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(MIN_KILLERS);
        let action_time_seconds = env::var("MAFIA_DEFAULT_ACTION_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_ACTION_SECONDS);
        let stale_after = env::var("MAFIA_STALE_AFTER_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.stale_after);
        let start_grace = env::var("MAFIA_START_GRACE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.start_grace);
        let rng_seed = env::var("MAFIA_RNG_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        Self {
            session_key,
            bind_addr,
            cors_origin,
            default_settings: Settings::clamped(killer_count, action_time_seconds),
            stale_after,
            start_grace,
            rng_seed,
        }
    }
}
