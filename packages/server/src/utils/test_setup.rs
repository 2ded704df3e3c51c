use chrono::Utc;
use std::sync::Once;

use crate::models::{
    night::NightStep,
    role::Role,
    rule::Settings,
    session::{Phase, Session, SessionStatus},
};

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenvy::dotenv().ok();
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// 役職が配られて一晩目に入った直後のセッションを作る。
/// プレイヤーIDと名前は同じ文字列、最初のプレイヤーが管理者。
pub fn session_with_roles(roles: &[(&str, Role)]) -> Session {
    let now = Utc::now();
    let mut session = Session::new("test".to_string(), Settings::default(), now);
    for (id, role) in roles {
        session
            .add_player(id.to_string(), id, now)
            .expect("テスト用プレイヤーを追加できません");
        if let Some(player) = session.player_mut(id) {
            player.role = Some(*role);
            player.ready = true;
        }
    }
    session.settings.killer_count = roles.iter().filter(|(_, r)| r.is_killer()).count().max(1);
    session.status = SessionStatus::Playing;
    session.phase = Phase::Night;
    session.night_step = Some(NightStep::FIRST);
    session.night_step_started_at = Some(now);
    session.night_count = 1;
    session
}
