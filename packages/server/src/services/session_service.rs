//! セッションごとに一つのタスクが状態を所有し、受け取った命令を順番に処理する。
//! タイマーも同じキューに命令として戻ってくるので、遅れて届いた行動と締め切りが競合しない。

use chrono::{DateTime, Utc};
use futures::Stream;
use log::{debug, warn};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use uuid::Uuid;

use crate::error::GameError;
use crate::models::{
    config::GameConfig,
    event::SessionEvent,
    night::{NightActionKind, Submission},
    player::PlayerId,
    rule::Settings,
    session::{Phase, Session, SessionStatus, TimerToken, Vote},
    snapshot::SessionSnapshot,
};
use crate::services::{phase_engine, random::RandomSource};

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

pub type SnapshotStream = Pin<Box<dyn Stream<Item = SessionSnapshot> + Send>>;

#[derive(Debug)]
pub enum Command {
    Join {
        name: String,
        reply: Reply<PlayerId>,
    },
    SetReady {
        player_id: PlayerId,
        ready: bool,
        reply: Reply<()>,
    },
    Leave {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Configure {
        player_id: PlayerId,
        killer_count: usize,
        action_time_seconds: u64,
        reply: Reply<Settings>,
    },
    NightAction {
        player_id: PlayerId,
        kind: NightActionKind,
        target_id: PlayerId,
        reply: Reply<Submission>,
    },
    Vote {
        player_id: PlayerId,
        vote: Vote,
        reply: Reply<Submission>,
    },
    ForceReset {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Timer(TimerToken),
}

/// セッションへの窓口。複製して複数の呼び出し元から使える。
#[derive(Clone)]
pub struct SessionHandle {
    key: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<Arc<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn spawn(key: String, config: Arc<GameConfig>) -> Self {
        let now = Utc::now();
        let session = Session::new(key.clone(), config.default_settings, now);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(Arc::new(session.clone()));
        let (events_tx, _) = broadcast::channel(1000);

        let actor = SessionActor {
            session,
            commands: commands_rx,
            loopback: commands_tx.downgrade(),
            state: state_tx,
            events: events_tx.clone(),
            rng: RandomSource::new(config.rng_seed),
            config,
            timer: None,
        };
        tokio::spawn(actor.run());

        SessionHandle {
            key,
            commands: commands_tx,
            state: state_rx,
            events: events_tx,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, GameError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)?
    }

    pub async fn join(&self, name: impl Into<String>) -> Result<PlayerId, GameError> {
        let name = name.into();
        self.request(|reply| Command::Join { name, reply }).await
    }

    pub async fn set_ready(&self, player_id: &str, ready: bool) -> Result<(), GameError> {
        let player_id = player_id.to_string();
        self.request(|reply| Command::SetReady {
            player_id,
            ready,
            reply,
        })
        .await
    }

    pub async fn leave(&self, player_id: &str) -> Result<(), GameError> {
        let player_id = player_id.to_string();
        self.request(|reply| Command::Leave { player_id, reply })
            .await
    }

    pub async fn configure(
        &self,
        player_id: &str,
        killer_count: usize,
        action_time_seconds: u64,
    ) -> Result<Settings, GameError> {
        let player_id = player_id.to_string();
        self.request(|reply| Command::Configure {
            player_id,
            killer_count,
            action_time_seconds,
            reply,
        })
        .await
    }

    pub async fn submit_night_action(
        &self,
        player_id: &str,
        kind: NightActionKind,
        target_id: &str,
    ) -> Result<Submission, GameError> {
        let (player_id, target_id) = (player_id.to_string(), target_id.to_string());
        self.request(|reply| Command::NightAction {
            player_id,
            kind,
            target_id,
            reply,
        })
        .await
    }

    pub async fn submit_vote(&self, player_id: &str, vote: Vote) -> Result<Submission, GameError> {
        let player_id = player_id.to_string();
        self.request(|reply| Command::Vote {
            player_id,
            vote,
            reply,
        })
        .await
    }

    pub async fn force_reset(&self, player_id: &str) -> Result<(), GameError> {
        let player_id = player_id.to_string();
        self.request(|reply| Command::ForceReset { player_id, reply })
            .await
    }

    /// 最後に確定した状態
    pub fn current(&self) -> Arc<Session> {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self, viewer: Option<&str>) -> SessionSnapshot {
        SessionSnapshot::for_viewer(&self.current(), viewer)
    }

    /// 確定した遷移ごとの閲覧者向けスナップショット。最初の要素は現在の状態。
    pub fn subscribe(&self, viewer: Option<PlayerId>) -> SnapshotStream {
        Box::pin(
            WatchStream::new(self.state.clone())
                .map(move |session| SessionSnapshot::for_viewer(&session, viewer.as_deref())),
        )
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

struct SessionActor {
    session: Session,
    commands: mpsc::UnboundedReceiver<Command>,
    loopback: mpsc::WeakUnboundedSender<Command>,
    state: watch::Sender<Arc<Session>>,
    events: broadcast::Sender<SessionEvent>,
    rng: RandomSource,
    config: Arc<GameConfig>,
    timer: Option<(TimerToken, JoinHandle<()>)>,
}

fn respond<T>(key: &str, reply: Reply<T>, result: Result<T, GameError>) -> bool {
    let ok = result.is_ok();
    if let Err(e) = &result {
        debug!("{}: 要求を拒否しました: {}", key, e);
    }
    let _ = reply.send(result);
    ok
}

fn respond_submission(
    key: &str,
    reply: Reply<Submission>,
    result: Result<Submission, GameError>,
) -> bool {
    let accepted = matches!(result, Ok(Submission::Accepted));
    respond(key, reply, result) && accepted
}

impl SessionActor {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            let now = Utc::now();
            if self.handle(command, now) {
                self.publish();
            }
            self.reschedule(now);
        }
        if let Some((_, timer)) = self.timer.take() {
            timer.abort();
        }
        debug!("{}: セッションタスクを終了します", self.session.key);
    }

    /// 命令を一つ処理する。状態が変わったら true
    fn handle(&mut self, command: Command, now: DateTime<Utc>) -> bool {
        let session = &mut self.session;
        let key = session.key.clone();
        match command {
            Command::Join { name, reply } => {
                let player_id = Uuid::new_v4().to_string();
                let result =
                    phase_engine::join(session, player_id, &name, self.config.stale_after, now);
                respond(&key, reply, result)
            }
            Command::SetReady {
                player_id,
                ready,
                reply,
            } => respond(
                &key,
                reply,
                phase_engine::set_ready(session, &player_id, ready, now),
            ),
            Command::Leave { player_id, reply } => {
                respond(&key, reply, phase_engine::leave(session, &player_id, now))
            }
            Command::Configure {
                player_id,
                killer_count,
                action_time_seconds,
                reply,
            } => respond(
                &key,
                reply,
                phase_engine::configure(
                    session,
                    &player_id,
                    killer_count,
                    action_time_seconds,
                    now,
                ),
            ),
            Command::NightAction {
                player_id,
                kind,
                target_id,
                reply,
            } => respond_submission(
                &key,
                reply,
                phase_engine::submit_night_action(session, &player_id, kind, &target_id, now),
            ),
            Command::Vote {
                player_id,
                vote,
                reply,
            } => respond_submission(
                &key,
                reply,
                phase_engine::submit_vote(session, &player_id, vote, now),
            ),
            Command::ForceReset { player_id, reply } => respond(
                &key,
                reply,
                phase_engine::force_reset(session, &player_id, now),
            ),
            Command::Timer(token) => {
                match phase_engine::on_timer(session, token, &mut self.rng, now) {
                    Ok(changed) => changed,
                    Err(e) => {
                        warn!("{}: タイマー処理に失敗しました: {}", key, e);
                        false
                    }
                }
            }
        }
    }

    fn publish(&mut self) {
        for event in self.session.drain_events() {
            // 購読者がいなくてもエラーにしない
            let _ = self.events.send(event);
        }
        self.state.send_replace(Arc::new(self.session.clone()));
    }

    /// 現在の状態に必要なタイマーを一つだけ予約する。世代が変わっていなければ既存のものを残す。
    fn reschedule(&mut self, now: DateTime<Utc>) {
        let token = self.session.timer_token();
        if self.timer.as_ref().is_some_and(|(t, _)| *t == token) {
            return;
        }
        if let Some((_, timer)) = self.timer.take() {
            timer.abort();
        }

        let delay = match (self.session.status, self.session.phase) {
            (SessionStatus::Lobby, _) if self.session.lobby_quorum() => {
                Some(self.config.start_grace)
            }
            (SessionStatus::Playing, Phase::Night) => self
                .session
                .step_deadline()
                .map(|deadline| deadline.signed_duration_since(now).to_std().unwrap_or_default()),
            _ => None,
        };
        let Some(delay) = delay else {
            return;
        };

        let loopback = self.loopback.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = loopback.upgrade() {
                let _ = commands.send(Command::Timer(token));
            }
        });
        self.timer = Some((token, timer));
    }
}
