use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;

use mafia_server::{
    error::GameError,
    models::{
        config::GameConfig,
        event::SessionEvent,
        night::{NightActionKind, NightStep, Submission},
        role::{Role, Winner},
        session::{Phase, SessionStatus, Vote},
    },
    services::session_service::SessionHandle,
    state::AppState,
    utils::test_setup::setup_test_env,
};

fn test_config() -> GameConfig {
    GameConfig {
        rng_seed: Some(7),
        ..GameConfig::default()
    }
}

/// 条件を満たすイベントが届くまで待つ。止まった時計は待っている間に自動で進む。
async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut matches: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = events.recv().await.expect("イベントを受信できません");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("イベントが届きませんでした")
}

async fn wait_for_phase(events: &mut broadcast::Receiver<SessionEvent>, phase: Phase) {
    wait_for(events, |e| matches!(e, SessionEvent::PhaseChanged { to, .. } if *to == phase)).await;
}

async fn wait_for_step(events: &mut broadcast::Receiver<SessionEvent>, step: NightStep) {
    wait_for(events, |e| matches!(e, SessionEvent::NightStepChanged { step: s, .. } if *s == step))
        .await;
}

/// 全員参加・準備完了させて夜が始まるまで待つ
async fn start_game(
    handle: &SessionHandle,
    events: &mut broadcast::Receiver<SessionEvent>,
    names: &[&str],
) -> Vec<String> {
    let mut ids = Vec::new();
    for name in names {
        ids.push(handle.join(*name).await.unwrap());
    }
    for id in &ids {
        handle.set_ready(id, true).await.unwrap();
    }
    wait_for_phase(events, Phase::Night).await;
    ids
}

fn player_with_role(handle: &SessionHandle, role: Role) -> Vec<String> {
    handle
        .current()
        .players
        .iter()
        .filter(|p| p.role == Some(role))
        .map(|p| p.id.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_game_starts_after_everyone_is_ready() {
    setup_test_env();
    let handle = SessionHandle::spawn("start".to_string(), test_config().into());
    let mut events = handle.events();

    let ids = start_game(&handle, &mut events, &["Alice", "Bob", "Carol", "Dave"]).await;

    let session = handle.current();
    assert_eq!(session.status, SessionStatus::Playing);
    assert_eq!(session.night_count, 1);
    assert_eq!(session.admin.as_deref(), Some(ids[0].as_str()));
    assert_eq!(player_with_role(&handle, Role::Killer).len(), 1);
    assert_eq!(player_with_role(&handle, Role::Doctor).len(), 1);
    assert_eq!(player_with_role(&handle, Role::Detective).len(), 1);

    // 他人の役職は見えない
    let snapshot = handle.snapshot(Some(&ids[0]));
    let visible = snapshot.players.iter().filter(|p| p.role.is_some()).count();
    let viewer_is_god = snapshot.viewer.as_ref().is_some_and(|v| v.is_god);
    if viewer_is_god {
        assert_eq!(visible, 4);
    } else {
        assert_eq!(visible, 1);
    }

    assert_eq!(handle.join("Late").await, Err(GameError::GameInProgress));
}

#[tokio::test(start_paused = true)]
async fn test_night_runs_on_timers_without_actions() {
    setup_test_env();
    let handle = SessionHandle::spawn("timers".to_string(), test_config().into());
    let mut events = handle.events();
    start_game(&handle, &mut events, &["A", "B", "C"]).await;

    let mut steps = Vec::new();
    let event = wait_for(&mut events, |e| {
        if let SessionEvent::NightStepChanged { step, .. } = e {
            steps.push(*step);
        }
        matches!(e, SessionEvent::PhaseChanged { to: Phase::Day, .. })
    })
    .await;
    assert!(matches!(event, SessionEvent::PhaseChanged { from: Phase::Night, .. }));
    assert_eq!(steps.len(), 8, "夜は8ステップ: {:?}", steps);

    let session = handle.current();
    assert_eq!(session.day_count, 1);
    assert_eq!(session.alive_count(), 3);
    assert_eq!(
        session.last_night_result.as_deref(),
        Some("Night 1: No one was killed!")
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_game_until_villagers_win() {
    setup_test_env();
    let handle = SessionHandle::spawn("full".to_string(), test_config().into());
    let mut events = handle.events();
    start_game(&handle, &mut events, &["A", "B", "C", "D", "E"]).await;

    let killer = player_with_role(&handle, Role::Killer).remove(0);
    let doctor = player_with_role(&handle, Role::Doctor).remove(0);
    let detective = player_with_role(&handle, Role::Detective).remove(0);
    let villagers = player_with_role(&handle, Role::Villager);
    let (victim, survivor) = (villagers[0].clone(), villagers[1].clone());

    wait_for_step(&mut events, NightStep::KillerOpen).await;
    assert_eq!(
        handle
            .submit_night_action(&killer, NightActionKind::Kill, &victim)
            .await,
        Ok(Submission::Accepted)
    );
    assert_eq!(handle.current().night_step, Some(NightStep::KillerClose));

    wait_for_step(&mut events, NightStep::HealerOpen).await;
    handle
        .submit_night_action(&doctor, NightActionKind::Heal, &survivor)
        .await
        .unwrap();

    wait_for_step(&mut events, NightStep::DetectiveOpen).await;
    handle
        .submit_night_action(&detective, NightActionKind::Investigate, &killer)
        .await
        .unwrap();

    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::PlayerKilled { player_id, .. } if *player_id == victim)
    })
    .await;
    wait_for_phase(&mut events, Phase::Day).await;

    let session = handle.current();
    assert!(!session.player(&victim).unwrap().alive);
    let results = handle
        .snapshot(Some(&detective))
        .viewer
        .unwrap()
        .detective_results;
    assert_eq!(results.len(), 1);
    assert!(results[0].is_killer);
    assert!(handle
        .snapshot(Some(&doctor))
        .viewer
        .unwrap()
        .detective_results
        .is_empty());

    // 死者は投票できない
    assert!(matches!(
        handle.submit_vote(&victim, Vote::Skip).await,
        Err(GameError::NotEligible(_))
    ));
    for voter in [&doctor, &detective, &survivor] {
        handle
            .submit_vote(voter, Vote::Player(killer.clone()))
            .await
            .unwrap();
    }
    handle
        .submit_vote(&killer, Vote::Player(doctor.clone()))
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, SessionEvent::GameOver { .. })).await;
    assert_eq!(
        event,
        SessionEvent::GameOver {
            winner: Winner::Villagers
        }
    );
    let snapshot = handle.snapshot(None);
    assert_eq!(snapshot.phase, Phase::GameOver);
    assert!(snapshot.players.iter().all(|p| p.role.is_some()));
}

#[tokio::test(start_paused = true)]
async fn test_force_reset_discards_pending_timer() {
    setup_test_env();
    let handle = SessionHandle::spawn("reset".to_string(), test_config().into());
    let mut events = handle.events();
    let ids = start_game(&handle, &mut events, &["A", "B", "C"]).await;

    assert_eq!(handle.force_reset(&ids[1]).await, Err(GameError::NotAuthorized));
    handle.force_reset(&ids[0]).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;

    let session = handle.current();
    assert_eq!(session.phase, Phase::Lobby);
    assert!(session.players.is_empty());
    assert!(session.night_step.is_none());
    assert_eq!(session.epoch, 1);

    // リセット後は新しいロビーとして参加できる
    let id = handle.join("Again").await.unwrap();
    assert_eq!(handle.current().admin, Some(id));
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_starts_with_current_state() {
    setup_test_env();
    let handle = SessionHandle::spawn("watch".to_string(), test_config().into());
    let mut stream = handle.subscribe(None);

    let first = stream.next().await.unwrap();
    assert_eq!(first.phase, Phase::Lobby);
    assert!(first.players.is_empty());

    handle.join("Alice").await.unwrap();
    let second = stream.next().await.unwrap();
    assert_eq!(second.players.len(), 1);
    assert_eq!(second.players[0].name, "Alice");
}

#[tokio::test]
async fn test_app_state_sessions() {
    setup_test_env();
    let state = AppState::with_config(test_config());

    assert_eq!(
        state.snapshot("missing", None).await.err(),
        Some(GameError::SessionNotFound("missing".to_string()))
    );

    let id = state.join("table", "Alice").await.unwrap();
    let settings = state.configure_settings("table", &id, 1, 20).await.unwrap();
    assert_eq!(settings.action_time_seconds, 20);
    assert!(matches!(
        state.configure_settings("table", &id, 4, 20).await,
        Err(GameError::InvalidConfiguration(_))
    ));

    let snapshot = state.snapshot("table", Some(&id)).await.unwrap();
    assert_eq!(snapshot.players.len(), 1);
    assert!(snapshot.viewer.unwrap().is_admin);

    state.leave("table", &id).await.unwrap();
    assert!(state.snapshot("table", None).await.unwrap().players.is_empty());
    assert_eq!(
        state.set_ready("table", &id, true).await,
        Err(GameError::PlayerNotFound(id.clone()))
    );
}

#[tokio::test]
async fn test_default_table_is_open() {
    setup_test_env();
    let state = AppState::with_config(test_config());
    let snapshot = state.snapshot("global", None).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Lobby);
    assert!(state.subscribe("global", None).await.is_ok());
}

#[tokio::test]
async fn test_idle_tables_are_evicted() {
    setup_test_env();
    let state = AppState::with_config(test_config());
    state.join("table-a", "Alice").await.unwrap();
    state.join("table-b", "Bob").await.unwrap();

    assert_eq!(state.evict_idle(chrono::Utc::now()).await, 0);
    assert!(state.session("table-a").await.is_ok());

    let later = chrono::Utc::now() + chrono::Duration::hours(2);
    assert_eq!(state.evict_idle(later).await, 2);
    assert_eq!(
        state.session("table-a").await.err(),
        Some(GameError::SessionNotFound("table-a".to_string()))
    );
    assert!(state.session("global").await.is_ok(), "既定のテーブルは残る");
    assert_eq!(state.sessions.lock().await.len(), 1);

    // 同じキーで参加し直すと新しいロビーになる
    let id = state.join("table-a", "Carol").await.unwrap();
    let snapshot = state.snapshot("table-a", Some(&id)).await.unwrap();
    assert_eq!(snapshot.players.len(), 1);
    assert!(snapshot.viewer.unwrap().is_admin);
}

#[tokio::test(start_paused = true)]
async fn test_force_reset_cancels_pending_start() {
    setup_test_env();
    let handle = SessionHandle::spawn("grace".to_string(), test_config().into());
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        ids.push(handle.join(name).await.unwrap());
    }
    for id in &ids {
        handle.set_ready(id, true).await.unwrap();
    }
    assert!(handle.current().lobby_quorum(), "開始タイマーが予約されている");

    handle.force_reset(&ids[0]).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let session = handle.current();
    assert_eq!(session.status, SessionStatus::Lobby);
    assert!(session.players.is_empty());
    assert!(session.night_actions.is_empty());
    assert!(session.votes.is_empty());
    assert_eq!(session.night_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_force_reset_from_day_and_game_over() {
    setup_test_env();
    let handle = SessionHandle::spawn("day".to_string(), test_config().into());
    let mut events = handle.events();
    let ids = start_game(&handle, &mut events, &["A", "B", "C", "D"]).await;
    wait_for_phase(&mut events, Phase::Day).await;

    let killer = player_with_role(&handle, Role::Killer).remove(0);
    let voter = ids.iter().find(|id| **id != killer).unwrap();
    handle.submit_vote(voter, Vote::Skip).await.unwrap();
    assert_eq!(handle.current().votes.len(), 1);

    handle.force_reset(&ids[0]).await.unwrap();
    let session = handle.current();
    assert_eq!(session.phase, Phase::Lobby);
    assert!(session.players.is_empty());
    assert!(session.votes.is_empty());

    // 二回目のゲームを人狼の処刑で終わらせてからリセットする
    let ids = start_game(&handle, &mut events, &["A", "B", "C", "D"]).await;
    wait_for_phase(&mut events, Phase::Day).await;
    let killer = player_with_role(&handle, Role::Killer).remove(0);
    let alive: Vec<String> = handle
        .current()
        .alive_players()
        .map(|p| p.id.clone())
        .collect();
    for id in &alive {
        let vote = if *id == killer {
            Vote::Skip
        } else {
            Vote::Player(killer.clone())
        };
        handle.submit_vote(id, vote).await.unwrap();
    }
    wait_for(&mut events, |e| matches!(e, SessionEvent::GameOver { .. })).await;
    assert_eq!(handle.current().phase, Phase::GameOver);

    handle.force_reset(&ids[0]).await.unwrap();
    let session = handle.current();
    assert_eq!(session.status, SessionStatus::Lobby);
    assert!(session.players.is_empty());
    assert!(session.winner.is_none());
    assert_eq!(session.epoch, 2);
}
