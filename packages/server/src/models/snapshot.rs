use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;

use super::{
    night::{Investigation, NightAction, NightStep},
    player::PlayerId,
    role::{Role, Winner},
    rule::Settings,
    session::{Phase, Session, SessionStatus, Vote},
};

/// 名簿の公開情報。役職は本人・神・ゲーム終了後にのみ見える。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub ready: bool,
    pub role: Option<Role>,
    pub is_admin: bool,
    pub is_god: bool,
}

/// 閲覧者本人だけに見える情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerInfo {
    pub player_id: PlayerId,
    pub role: Option<Role>,
    pub role_description: Option<String>,
    pub is_admin: bool,
    pub is_god: bool,
    pub can_act: bool,
    pub night_action: Option<NightAction>,
    pub vote: Option<Vote>,
    pub detective_results: Vec<Investigation>,
}

/// 神だけが見られる夜の行動一覧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GodView {
    pub night_actions: Vec<NightAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub key: String,
    pub epoch: u64,
    pub status: SessionStatus,
    pub phase: Phase,
    pub night_step: Option<NightStep>,
    pub announcement: Option<String>,
    pub step_deadline: Option<DateTime<Utc>>,
    pub day_count: u32,
    pub night_count: u32,
    pub settings: Settings,
    pub players: Vec<PlayerView>,
    pub votes_cast: usize,
    pub last_night_result: Option<String>,
    pub last_day_result: Option<String>,
    pub winner: Option<Winner>,
    // 全員準備完了でも開始できない理由（配役できない設定など）
    pub lobby_notice: Option<String>,
    pub viewer: Option<ViewerInfo>,
    pub god_view: Option<GodView>,
}

impl SessionSnapshot {
    pub fn for_viewer(session: &Session, viewer: Option<&str>) -> Self {
        let viewer_player = viewer.and_then(|id| session.player(id));
        let viewer_is_god = viewer_player.is_some_and(|p| session.is_god(&p.id));
        let reveal_all = session.phase == Phase::GameOver || viewer_is_god;

        let players = session
            .players
            .iter()
            .map(|p| {
                let own = viewer_player.is_some_and(|v| v.id == p.id);
                PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    alive: p.alive,
                    ready: p.ready,
                    role: if reveal_all || own { p.role } else { None },
                    is_admin: session.is_admin(&p.id),
                    is_god: session.is_god(&p.id),
                }
            })
            .collect();

        let viewer = viewer_player.map(|p| ViewerInfo {
            player_id: p.id.clone(),
            role: p.role,
            role_description: p.role.map(|r| r.description().to_string()),
            is_admin: session.is_admin(&p.id),
            is_god: viewer_is_god,
            can_act: can_act(session, &p.id),
            night_action: session
                .night_step
                .and_then(|step| step.action_window())
                .and_then(|(_, kind)| session.night_actions.find(&p.id, kind))
                .cloned(),
            vote: session.votes.get(&p.id).cloned(),
            detective_results: session
                .detective_results
                .get(&p.id)
                .cloned()
                .unwrap_or_default(),
        });

        let lobby_notice = match session.start_check() {
            Err(e @ GameError::InvalidConfiguration(_)) => Some(e.to_string()),
            _ => None,
        };

        let god_view = (viewer_is_god && session.phase == Phase::Night).then(|| GodView {
            night_actions: session.night_actions.all().to_vec(),
        });

        SessionSnapshot {
            key: session.key.clone(),
            epoch: session.epoch,
            status: session.status,
            phase: session.phase,
            night_step: session.night_step,
            announcement: session.night_step.map(|s| s.announcement().to_string()),
            step_deadline: session.step_deadline(),
            day_count: session.day_count,
            night_count: session.night_count,
            settings: session.settings,
            players,
            votes_cast: session.votes.len(),
            last_night_result: session.last_night_result.clone(),
            last_day_result: session.last_day_result.clone(),
            winner: session.winner,
            lobby_notice,
            viewer,
            god_view,
        }
    }
}

/// 現在のステップ・フェーズでこのプレイヤーが提出できるか
fn can_act(session: &Session, player_id: &str) -> bool {
    let Some(player) = session.player(player_id) else {
        return false;
    };
    if session.status != SessionStatus::Playing || !player.alive {
        return false;
    }
    match session.phase {
        Phase::Night => session
            .night_step
            .and_then(|step| step.action_window())
            .is_some_and(|(role, kind)| {
                player.has_role(role) && session.night_actions.find(player_id, kind).is_none()
            }),
        Phase::Day => !session.votes.contains_key(player_id),
        Phase::Lobby | Phase::GameOver => false,
    }
}
