use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{
    event::SessionEvent,
    night::{Investigation, NightActions, NightStep},
    player::{Player, PlayerId},
    role::Winner,
    rule::{self, Settings},
};
use crate::error::GameError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Lobby,
    Playing,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Lobby,    // ゲーム開始前
    Night,    // 夜フェーズ（小ステップあり）
    Day,      // 投票フェーズ
    GameOver, // ゲーム終了
}

/// 昼の投票先。`"skip"` は投票済みだが誰も選ばない
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Vote {
    Skip,
    Player(PlayerId),
}

impl From<String> for Vote {
    fn from(value: String) -> Self {
        if value == "skip" {
            Vote::Skip
        } else {
            Vote::Player(value)
        }
    }
}

impl From<Vote> for String {
    fn from(vote: Vote) -> Self {
        match vote {
            Vote::Skip => "skip".to_string(),
            Vote::Player(id) => id,
        }
    }
}

/// タイマーが予約された時点のセッション世代。リセットや遷移の後に届いた古いタイマーは無視する。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerToken {
    pub epoch: u64,
    pub transition: u64,
}

/// 一つのテーブルの全状態
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    pub epoch: u64,
    pub transition: u64,
    pub status: SessionStatus,
    pub phase: Phase,
    pub night_step: Option<NightStep>,
    pub night_step_started_at: Option<DateTime<Utc>>,
    pub day_count: u32,
    pub night_count: u32,
    pub settings: Settings,
    pub god: Option<PlayerId>,
    pub admin: Option<PlayerId>,
    pub players: Vec<Player>,
    pub night_actions: NightActions,
    pub votes: BTreeMap<PlayerId, Vote>,
    pub last_night_result: Option<String>,
    pub last_day_result: Option<String>,
    pub detective_results: BTreeMap<PlayerId, Vec<Investigation>>,
    pub winner: Option<Winner>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(key: String, settings: Settings, now: DateTime<Utc>) -> Self {
        Session {
            key,
            epoch: 0,
            transition: 0,
            status: SessionStatus::Lobby,
            phase: Phase::Lobby,
            night_step: None,
            night_step_started_at: None,
            day_count: 0,
            night_count: 0,
            settings,
            god: None,
            admin: None,
            players: Vec::new(),
            night_actions: NightActions::default(),
            votes: BTreeMap::new(),
            last_night_result: None,
            last_day_result: None,
            detective_results: BTreeMap::new(),
            winner: None,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn require_player(&self, player_id: &str) -> Result<&Player, GameError> {
        self.player(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    pub fn is_admin(&self, player_id: &str) -> bool {
        self.admin.as_deref() == Some(player_id)
    }

    pub fn is_god(&self, player_id: &str) -> bool {
        self.god.as_deref() == Some(player_id)
    }

    /// ロビーにプレイヤーを追加する。最初の参加者が管理者になる。
    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<PlayerId, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::InvalidName);
        }
        if self.status != SessionStatus::Lobby {
            return Err(GameError::GameInProgress);
        }
        if self.players.len() >= rule::MAX_PLAYERS {
            return Err(GameError::SessionFull);
        }

        if self.players.is_empty() {
            self.admin = Some(player_id.clone());
        }
        self.players.push(Player::new(player_id.clone(), name.to_string()));
        self.bump(now);
        Ok(player_id)
    }

    /// 名簿から外す。管理者が抜けた場合は次の参加者に引き継ぐ。
    pub fn remove_player(
        &mut self,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Player, GameError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        let removed = self.players.remove(index);

        if self.is_admin(player_id) {
            self.admin = self.players.first().map(|p| p.id.clone());
        }
        if self.is_god(player_id) {
            self.god = None;
        }
        // 抜けたプレイヤーの票と、そのプレイヤーへの票は取り消す
        self.votes.remove(player_id);
        self.votes
            .retain(|_, vote| !matches!(vote, Vote::Player(target) if target == player_id));

        if self.status == SessionStatus::Lobby {
            self.bump(now);
        } else {
            self.touch(now);
        }
        Ok(removed)
    }

    /// ロビーから開始できるか。配役できない設定なら `InvalidConfiguration` を返す。
    pub fn start_check(&self) -> Result<(), GameError> {
        if self.status != SessionStatus::Lobby {
            return Err(GameError::GameInProgress);
        }
        let count = self.players.len();
        if !(rule::MIN_PLAYERS..=rule::MAX_PLAYERS).contains(&count)
            || !self.players.iter().all(|p| p.ready)
        {
            return Err(GameError::not_eligible(format!(
                "{}〜{}人の全員が準備完了する必要があります",
                rule::MIN_PLAYERS,
                rule::MAX_PLAYERS
            )));
        }
        rule::validate_roles(count, self.settings.killer_count)
    }

    /// 3〜10人が全員準備完了し、現在の設定で配役できる
    pub fn lobby_quorum(&self) -> bool {
        self.start_check().is_ok()
    }

    /// 最終更新から `idle_after` より長く経っているか
    pub fn is_idle(&self, now: DateTime<Utc>, idle_after: Duration) -> bool {
        now.signed_duration_since(self.updated_at)
            .to_std()
            .is_ok_and(|idle| idle > idle_after)
    }

    /// 放置されたセッションかどうか。空のロビーはそのまま使えるので対象外。
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if self.players.is_empty() {
            return self.status != SessionStatus::Lobby;
        }
        self.status == SessionStatus::Finished
            || self.alive_count() == 0
            || self.is_idle(now, stale_after)
    }

    /// 名簿を空にしてロビーに戻す。世代を進めて予約済みタイマーを無効にする。
    pub fn reset(&mut self, now: DateTime<Utc>) {
        let settings = self.settings;
        let epoch = self.epoch + 1;
        let transition = self.transition + 1;
        let events = std::mem::take(&mut self.events);
        *self = Session::new(self.key.clone(), settings, now);
        self.epoch = epoch;
        self.transition = transition;
        self.events = events;
        self.emit(SessionEvent::SessionReset { epoch });
    }

    pub fn step_deadline(&self) -> Option<DateTime<Utc>> {
        let step = self.night_step?;
        let started_at = self.night_step_started_at?;
        let duration = step.duration(&self.settings);
        Some(started_at + chrono::Duration::milliseconds(duration.as_millis() as i64))
    }

    pub fn timer_token(&self) -> TimerToken {
        TimerToken {
            epoch: self.epoch,
            transition: self.transition,
        }
    }

    pub fn is_current(&self, token: TimerToken) -> bool {
        self.timer_token() == token
    }

    /// 状態遷移を確定する。タイマーの世代が一つ進む。
    pub(crate) fn bump(&mut self, now: DateTime<Utc>) {
        self.transition += 1;
        self.updated_at = now;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }
}
