use chrono::{DateTime, Utc};
use log::info;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, Mutex};

use crate::error::GameError;
use crate::models::{
    config::GameConfig,
    event::SessionEvent,
    night::{NightActionKind, Submission},
    player::PlayerId,
    rule::Settings,
    session::Vote,
    snapshot::SessionSnapshot,
};
use crate::services::session_service::{SessionHandle, SnapshotStream};

/// テーブル（セッションキー）ごとのセッション一覧
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
    pub config: Arc<GameConfig>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    /// 既定のテーブルは最初から開いておく。tokio ランタイム内で呼ぶこと。
    pub fn with_config(config: GameConfig) -> Self {
        let config = Arc::new(config);
        let default_session = SessionHandle::spawn(config.session_key.clone(), config.clone());
        let sessions = HashMap::from([(config.session_key.clone(), default_session)]);
        AppState {
            sessions: Arc::new(Mutex::new(sessions)),
            config,
        }
    }

    /// 新しいテーブルを開く前に、放置されたテーブルを片付ける
    pub async fn get_or_create_session(&self, key: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(key) {
            handle.clone()
        } else {
            self.sweep(&mut sessions, Utc::now());
            let handle = SessionHandle::spawn(key.to_string(), self.config.clone());
            sessions.insert(key.to_string(), handle.clone());
            handle
        }
    }

    /// `stale_after` より長く更新のないテーブルを一覧から外す。既定のテーブルは残す。
    /// 他にハンドルを持つ者がいなければセッションのタスクも終了する。
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions, now)
    }

    fn sweep(&self, sessions: &mut HashMap<String, SessionHandle>, now: DateTime<Utc>) -> usize {
        let before = sessions.len();
        sessions.retain(|key, handle| {
            *key == self.config.session_key
                || !handle.current().is_idle(now, self.config.stale_after)
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("放置されたセッションを{}件閉じました", evicted);
        }
        evicted
    }

    pub async fn session(&self, key: &str) -> Result<SessionHandle, GameError> {
        self.sessions
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| GameError::SessionNotFound(key.to_string()))
    }

    /// 参加。セッションがなければロビーとして作る。
    pub async fn join(&self, key: &str, name: &str) -> Result<PlayerId, GameError> {
        self.get_or_create_session(key).await.join(name).await
    }

    pub async fn set_ready(&self, key: &str, player_id: &str, ready: bool) -> Result<(), GameError> {
        self.session(key).await?.set_ready(player_id, ready).await
    }

    pub async fn leave(&self, key: &str, player_id: &str) -> Result<(), GameError> {
        self.session(key).await?.leave(player_id).await
    }

    pub async fn configure_settings(
        &self,
        key: &str,
        player_id: &str,
        killer_count: usize,
        action_time_seconds: u64,
    ) -> Result<Settings, GameError> {
        self.session(key)
            .await?
            .configure(player_id, killer_count, action_time_seconds)
            .await
    }

    pub async fn submit_night_action(
        &self,
        key: &str,
        player_id: &str,
        kind: NightActionKind,
        target_id: &str,
    ) -> Result<Submission, GameError> {
        self.session(key)
            .await?
            .submit_night_action(player_id, kind, target_id)
            .await
    }

    pub async fn submit_vote(
        &self,
        key: &str,
        player_id: &str,
        vote: Vote,
    ) -> Result<Submission, GameError> {
        self.session(key).await?.submit_vote(player_id, vote).await
    }

    pub async fn force_reset(&self, key: &str, player_id: &str) -> Result<(), GameError> {
        self.session(key).await?.force_reset(player_id).await
    }

    pub async fn snapshot(
        &self,
        key: &str,
        viewer: Option<&str>,
    ) -> Result<SessionSnapshot, GameError> {
        Ok(self.session(key).await?.snapshot(viewer))
    }

    pub async fn subscribe(
        &self,
        key: &str,
        viewer: Option<PlayerId>,
    ) -> Result<SnapshotStream, GameError> {
        Ok(self.session(key).await?.subscribe(viewer))
    }

    pub async fn events(&self, key: &str) -> Result<broadcast::Receiver<SessionEvent>, GameError> {
        Ok(self.session(key).await?.events())
    }
}
