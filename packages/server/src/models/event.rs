use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    night::NightStep,
    player::PlayerId,
    role::{Role, Winner},
    session::Phase,
};

/// セッションで確定した遷移の通知。表示層はこれを受けて演出や効果音を出す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        from: Phase,
        to: Phase,
        at: DateTime<Utc>,
    },
    NightStepChanged {
        night: u32,
        step: NightStep,
        deadline: DateTime<Utc>,
    },
    PlayerKilled {
        night: u32,
        player_id: PlayerId,
        name: String,
    },
    PlayerEliminated {
        day: u32,
        player_id: PlayerId,
        name: String,
        role: Role,
    },
    GameOver {
        winner: Winner,
    },
    SessionReset {
        epoch: u64,
    },
}
