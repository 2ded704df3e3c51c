use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

pub const MIN_PLAYERS: usize = 3;
pub const MAX_PLAYERS: usize = 10;

pub const MIN_KILLERS: usize = 1;
pub const MAX_KILLERS: usize = 3;

pub const MIN_ACTION_SECONDS: u64 = 5;
pub const MAX_ACTION_SECONDS: u64 = 30;
pub const DEFAULT_ACTION_SECONDS: u64 = 10;

// 固定の演出時間
pub const EVERYONE_CLOSE: Duration = Duration::from_secs(5);
pub const ROLE_CLOSE: Duration = Duration::from_secs(3);
pub const EVERYONE_OPEN: Duration = Duration::from_secs(2);

/// 人数と人狼役の組み合わせが配役可能か
pub fn validate_roles(player_count: usize, killer_count: usize) -> Result<(), GameError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
        return Err(GameError::InvalidConfiguration(format!(
            "プレイヤーは{}〜{}人必要です: {}",
            MIN_PLAYERS, MAX_PLAYERS, player_count
        )));
    }
    if !(MIN_KILLERS..=MAX_KILLERS).contains(&killer_count) {
        return Err(GameError::InvalidConfiguration(format!(
            "人狼役の人数は{}〜{}人です: {}",
            MIN_KILLERS, MAX_KILLERS, killer_count
        )));
    }
    // 人狼 + 医者 + 探偵
    if player_count < killer_count + 2 {
        return Err(GameError::InvalidConfiguration(format!(
            "人狼{}人には{}人以上のプレイヤーが必要です",
            killer_count,
            killer_count + 2
        )));
    }
    Ok(())
}

/// ロビーで管理者が変更できるゲーム設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub killer_count: usize,
    pub action_time_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            killer_count: MIN_KILLERS,
            action_time_seconds: DEFAULT_ACTION_SECONDS,
        }
    }
}

impl Settings {
    pub fn new(killer_count: usize, action_time_seconds: u64) -> Result<Self, GameError> {
        let settings = Self {
            killer_count,
            action_time_seconds,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if !(MIN_KILLERS..=MAX_KILLERS).contains(&self.killer_count) {
            return Err(GameError::InvalidConfiguration(format!(
                "人狼役の人数は{}〜{}人で指定してください: {}",
                MIN_KILLERS, MAX_KILLERS, self.killer_count
            )));
        }
        if !(MIN_ACTION_SECONDS..=MAX_ACTION_SECONDS).contains(&self.action_time_seconds) {
            return Err(GameError::InvalidConfiguration(format!(
                "行動時間は{}〜{}秒で指定してください: {}",
                MIN_ACTION_SECONDS, MAX_ACTION_SECONDS, self.action_time_seconds
            )));
        }
        Ok(())
    }

    pub fn action_time(&self) -> Duration {
        Duration::from_secs(self.action_time_seconds)
    }

    /// 範囲外の値を境界に丸める（環境変数からの初期値用）
    pub fn clamped(killer_count: usize, action_time_seconds: u64) -> Self {
        Self {
            killer_count: killer_count.clamp(MIN_KILLERS, MAX_KILLERS),
            action_time_seconds: action_time_seconds.clamp(MIN_ACTION_SECONDS, MAX_ACTION_SECONDS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_bounds() {
        assert!(Settings::new(1, 5).is_ok());
        assert!(Settings::new(3, 30).is_ok());
        assert!(matches!(
            Settings::new(0, 10),
            Err(GameError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Settings::new(4, 10),
            Err(GameError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Settings::new(1, 4),
            Err(GameError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Settings::new(1, 31),
            Err(GameError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_clamped() {
        assert_eq!(Settings::clamped(9, 1), Settings::new(3, 5).unwrap());
        assert_eq!(Settings::clamped(0, 99), Settings::new(1, 30).unwrap());
    }
}
