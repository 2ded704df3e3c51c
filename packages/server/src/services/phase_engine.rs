//! ロビー → 夜（小ステップ）→ 昼（投票）→ 夜 | 終了 の状態遷移。
//!
//! すべての関数は現在時刻を引数で受け取り、`Session` だけを変更する。
//! 前提条件の検証は変更の前に行うので、エラー時に状態が中途半端になることはない。

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::time::Duration;

use crate::error::GameError;
use crate::models::{
    event::SessionEvent,
    night::{NightAction, NightActionKind, NightStep, Submission},
    player::PlayerId,
    role::Winner,
    rule::Settings,
    session::{Phase, Session, SessionStatus, TimerToken, Vote},
};
use crate::services::{
    random::RandomSource,
    resolution::{self, DayOutcome},
    role_assignment, win,
};

/// 参加。放置されたセッションは先にリセットしてから参加させる。
pub fn join(
    session: &mut Session,
    player_id: PlayerId,
    name: &str,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Result<PlayerId, GameError> {
    if name.trim().is_empty() {
        return Err(GameError::InvalidName);
    }
    if session.is_stale(now, stale_after) {
        info!("放置されたセッション {} をリセットします", session.key);
        session.reset(now);
    } else if session.status != SessionStatus::Lobby {
        return Err(GameError::GameInProgress);
    }
    let player_id = session.add_player(player_id, name, now)?;
    debug!("{} が {} に参加しました", player_id, session.key);
    Ok(player_id)
}

pub fn set_ready(
    session: &mut Session,
    player_id: &str,
    ready: bool,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    session.require_player(player_id)?;
    if session.status != SessionStatus::Lobby {
        return Err(GameError::not_eligible("準備状態はロビーでのみ変更できます"));
    }
    if let Some(player) = session.player_mut(player_id) {
        player.ready = ready;
    }
    session.bump(now);
    Ok(())
}

/// 退出。進行中なら生死の判定には関与せず、投票の締め切りだけ再確認する。
pub fn leave(session: &mut Session, player_id: &str, now: DateTime<Utc>) -> Result<(), GameError> {
    let removed = session.remove_player(player_id, now)?;
    info!("{} が {} から退出しました", removed.name, session.key);
    if session.status == SessionStatus::Playing && session.phase == Phase::Day {
        close_day_if_complete(session, now);
    }
    Ok(())
}

pub fn configure(
    session: &mut Session,
    player_id: &str,
    killer_count: usize,
    action_time_seconds: u64,
    now: DateTime<Utc>,
) -> Result<Settings, GameError> {
    session.require_player(player_id)?;
    if !session.is_admin(player_id) {
        return Err(GameError::NotAuthorized);
    }
    let settings = Settings::new(killer_count, action_time_seconds)?;
    if session.status != SessionStatus::Lobby {
        return Err(GameError::GameInProgress);
    }
    session.settings = settings;
    session.bump(now);
    info!("{} の設定を更新しました: {:?}", session.key, settings);
    Ok(settings)
}

/// 管理者による緊急リセット。どのフェーズからでもロビーに戻る。
pub fn force_reset(
    session: &mut Session,
    player_id: &str,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    session.require_player(player_id)?;
    if !session.is_admin(player_id) {
        return Err(GameError::NotAuthorized);
    }
    info!("{} を強制リセットします", session.key);
    session.reset(now);
    Ok(())
}

/// ロビーから夜へ。役職の配布はゲームごとに一度だけ行う。
pub fn start_game(
    session: &mut Session,
    rng: &mut RandomSource,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    session.start_check()?;

    let ids: Vec<PlayerId> = session.players.iter().map(|p| p.id.clone()).collect();
    let roles = role_assignment::assign_roles(ids.len(), session.settings.killer_count)?;
    let dealt = role_assignment::deal_roles(roles, &ids, rng)?;
    let god = role_assignment::pick_god(&ids, rng);

    for (player_id, role) in dealt {
        if let Some(player) = session.player_mut(&player_id) {
            player.role = Some(role);
            player.alive = true;
        }
    }
    session.god = god;
    session.status = SessionStatus::Playing;
    session.day_count = 0;
    session.night_count = 0;
    session.votes.clear();
    session.last_night_result = None;
    session.last_day_result = None;
    session.detective_results.clear();
    session.winner = None;

    info!(
        "{} でゲームを開始しました（{}人、人狼{}人）",
        session.key,
        ids.len(),
        session.settings.killer_count
    );
    enter_night(session, now);
    Ok(())
}

fn change_phase(session: &mut Session, to: Phase, now: DateTime<Utc>) {
    let from = session.phase;
    session.phase = to;
    session.emit(SessionEvent::PhaseChanged { from, to, at: now });
}

fn start_step(session: &mut Session, step: NightStep, now: DateTime<Utc>) {
    session.night_step = Some(step);
    session.night_step_started_at = Some(now);
    session.bump(now);
    if let Some(deadline) = session.step_deadline() {
        session.emit(SessionEvent::NightStepChanged {
            night: session.night_count,
            step,
            deadline,
        });
    }
}

fn enter_night(session: &mut Session, now: DateTime<Utc>) {
    session.night_actions.clear();
    session.night_count += 1;
    change_phase(session, Phase::Night, now);
    start_step(session, NightStep::FIRST, now);
    info!("{}: Night {}", session.key, session.night_count);
}

fn enter_day(session: &mut Session, now: DateTime<Utc>) {
    session.votes.clear();
    session.day_count += 1;
    session.night_step = None;
    session.night_step_started_at = None;
    change_phase(session, Phase::Day, now);
    session.bump(now);
    info!("{}: Day {}", session.key, session.day_count);
}

fn finish(session: &mut Session, winner: Winner, now: DateTime<Utc>) {
    session.status = SessionStatus::Finished;
    session.winner = Some(winner);
    session.night_step = None;
    session.night_step_started_at = None;
    change_phase(session, Phase::GameOver, now);
    session.emit(SessionEvent::GameOver { winner });
    session.bump(now);
    info!("{}: {} win", session.key, winner);
}

/// 夜のステップを一つ進める。最後のステップの後は夜を解決する。
pub fn advance_step(session: &mut Session, now: DateTime<Utc>) -> Result<(), GameError> {
    if session.status != SessionStatus::Playing || session.phase != Phase::Night {
        return Err(GameError::not_eligible("夜フェーズではありません"));
    }
    match session.night_step.and_then(NightStep::next) {
        Some(next) => start_step(session, next, now),
        None => {
            resolution::resolve_night(session);
            match win::evaluate(&session.players) {
                Some(winner) => finish(session, winner, now),
                None => enter_day(session, now),
            }
        }
    }
    Ok(())
}

/// 締め切りを過ぎていれば一つ進める。何度呼んでも同じ時刻で二重に進むことはない。
pub fn advance_due(session: &mut Session, now: DateTime<Utc>) -> bool {
    let due = session.status == SessionStatus::Playing
        && session.phase == Phase::Night
        && session.step_deadline().is_some_and(|deadline| deadline <= now);
    due && advance_step(session, now).is_ok()
}

/// 予約されたタイマーの処理。予約後にリセットや遷移があった場合は何もしない。
pub fn on_timer(
    session: &mut Session,
    token: TimerToken,
    rng: &mut RandomSource,
    now: DateTime<Utc>,
) -> Result<bool, GameError> {
    if !session.is_current(token) {
        debug!("{}: 古いタイマーを無視します {:?}", session.key, token);
        return Ok(false);
    }
    match (session.status, session.phase) {
        (SessionStatus::Lobby, _) if session.lobby_quorum() => {
            start_game(session, rng, now)?;
            Ok(true)
        }
        (SessionStatus::Playing, Phase::Night) => {
            advance_step(session, now)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub fn submit_night_action(
    session: &mut Session,
    actor_id: &str,
    kind: NightActionKind,
    target_id: &str,
    now: DateTime<Utc>,
) -> Result<Submission, GameError> {
    let actor = session.require_player(actor_id)?;
    if session.status != SessionStatus::Playing || session.phase != Phase::Night {
        return Err(GameError::not_eligible("夜フェーズではありません"));
    }
    if !actor.alive {
        return Err(GameError::not_eligible("死亡したプレイヤーは行動できません"));
    }
    let Some((role, window_kind)) = session.night_step.and_then(NightStep::action_window) else {
        return Err(GameError::not_eligible("今は行動できるステップではありません"));
    };
    if !actor.has_role(role) || window_kind != kind {
        return Err(GameError::not_eligible("このステップで行動できる役職ではありません"));
    }
    validate_target(session, actor_id, target_id)?;

    let submission = session.night_actions.record(NightAction {
        actor: actor_id.to_string(),
        kind,
        target: target_id.to_string(),
    });
    if submission == Submission::Duplicate {
        return Ok(submission);
    }
    debug!("{}: {:?} を受け付けました（{}）", session.key, kind, actor_id);
    session.touch(now);

    // 生存している対象役職が全員行動したら次のステップへ
    let eligible: Vec<&str> = session
        .alive_players()
        .filter(|p| p.has_role(role))
        .map(|p| p.id.as_str())
        .collect();
    let all_acted = eligible
        .iter()
        .all(|id| session.night_actions.find(id, kind).is_some());
    if !eligible.is_empty() && all_acted {
        advance_step(session, now)?;
    }
    Ok(submission)
}

pub fn submit_vote(
    session: &mut Session,
    voter_id: &str,
    vote: Vote,
    now: DateTime<Utc>,
) -> Result<Submission, GameError> {
    let voter = session.require_player(voter_id)?;
    if session.status != SessionStatus::Playing || session.phase != Phase::Day {
        return Err(GameError::not_eligible("投票フェーズではありません"));
    }
    if !voter.alive {
        return Err(GameError::not_eligible("死亡したプレイヤーは投票できません"));
    }
    if session.votes.contains_key(voter_id) {
        return Ok(Submission::Duplicate);
    }
    if let Vote::Player(target_id) = &vote {
        validate_target(session, voter_id, target_id)?;
    }

    session.votes.insert(voter_id.to_string(), vote);
    session.touch(now);
    debug!("{}: {} が投票しました", session.key, voter_id);
    close_day_if_complete(session, now);
    Ok(Submission::Accepted)
}

/// 対象は自分以外の生存者
fn validate_target(session: &Session, actor_id: &str, target_id: &str) -> Result<(), GameError> {
    if actor_id == target_id {
        return Err(GameError::not_eligible("自分自身は対象にできません"));
    }
    match session.player(target_id) {
        Some(target) if target.alive => Ok(()),
        Some(_) => Err(GameError::not_eligible("対象は既に死亡しています")),
        None => Err(GameError::PlayerNotFound(target_id.to_string())),
    }
}

/// 生存者全員の票が揃っていれば昼を解決する
fn close_day_if_complete(session: &mut Session, now: DateTime<Utc>) {
    let complete = session
        .alive_players()
        .all(|p| session.votes.contains_key(&p.id));
    if !complete {
        return;
    }
    let outcome = resolution::resolve_day(session);
    if let DayOutcome::Eliminated(id) = &outcome {
        debug!("{}: {} が処刑されました", session.key, id);
    }
    match win::evaluate(&session.players) {
        Some(winner) => finish(session, winner, now),
        None => enter_night(session, now),
    }
}
