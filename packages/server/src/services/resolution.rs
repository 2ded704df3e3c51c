use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

use crate::models::{
    event::SessionEvent,
    night::{Investigation, NightActionKind},
    player::PlayerId,
    session::{Session, Vote},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightOutcome {
    pub killed: Option<PlayerId>,
    // (探偵ID, 調査結果)
    pub investigations: Vec<(PlayerId, Investigation)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    AllSkipped,
    NoMajority,
    Eliminated(PlayerId),
}

fn is_live_actor(session: &Session, actor: &str, kind: NightActionKind) -> bool {
    session
        .player(actor)
        .is_some_and(|p| p.alive && p.has_role(kind.role()))
}

/// 夜の結果を計算する（状態は変更しない）
pub fn night_outcome(session: &Session) -> NightOutcome {
    let healed: HashSet<&str> = session
        .night_actions
        .of_kind(NightActionKind::Heal)
        .filter(|a| is_live_actor(session, &a.actor, a.kind))
        .map(|a| a.target.as_str())
        .collect();

    // 提出順で最初の、護衛されていない襲撃対象が死亡する
    let mut killed = None;
    for attack in session
        .night_actions
        .of_kind(NightActionKind::Kill)
        .filter(|a| is_live_actor(session, &a.actor, a.kind))
    {
        if healed.contains(attack.target.as_str()) {
            continue;
        }
        match session.player(&attack.target) {
            Some(target) if target.alive => {
                killed = Some(target.id.clone());
                break;
            }
            _ => warn!(
                "襲撃対象 {} が存在しないか既に死亡しています。無効として扱います",
                attack.target
            ),
        }
    }

    let investigations = session
        .night_actions
        .of_kind(NightActionKind::Investigate)
        .filter(|a| is_live_actor(session, &a.actor, a.kind))
        .filter_map(|a| match session.player(&a.target) {
            Some(target) => Some((
                a.actor.clone(),
                Investigation {
                    night: session.night_count,
                    target: target.id.clone(),
                    target_name: target.name.clone(),
                    is_killer: target.is_killer(),
                },
            )),
            None => {
                warn!("調査対象 {} が存在しません。無効として扱います", a.target);
                None
            }
        })
        .collect();

    NightOutcome {
        killed,
        investigations,
    }
}

/// 夜の結果を適用する。探偵の結果は本人のスロットにのみ保存し、公開の要約には含めない。
pub fn resolve_night(session: &mut Session) -> NightOutcome {
    let outcome = night_outcome(session);
    let night = session.night_count;

    let summary = match outcome
        .killed
        .as_deref()
        .and_then(|id| session.player_mut(id))
    {
        Some(victim) => {
            victim.alive = false;
            let (id, name) = (victim.id.clone(), victim.name.clone());
            info!("Night {}: {} was killed", night, name);
            session.emit(SessionEvent::PlayerKilled {
                night,
                player_id: id,
                name: name.clone(),
            });
            format!("Night {}: {} was killed!", night, name)
        }
        None => format!("Night {}: No one was killed!", night),
    };
    session.last_night_result = Some(summary);

    for (detective, investigation) in &outcome.investigations {
        session
            .detective_results
            .entry(detective.clone())
            .or_default()
            .push(investigation.clone());
    }

    session.night_actions.clear();
    outcome
}

/// 票を集計する。スキップは数えない。過半数（生存者の半数を切り上げた数）を
/// 厳密に上回った単独首位だけが処刑される。
pub fn tally_votes(votes: &BTreeMap<PlayerId, Vote>, alive_count: usize) -> DayOutcome {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for vote in votes.values() {
        if let Vote::Player(target) = vote {
            *counts.entry(target.as_str()).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return DayOutcome::AllSkipped;
    }

    let majority = alive_count.div_ceil(2);
    let max = counts.values().copied().max().unwrap_or(0);
    let mut leaders = counts.iter().filter(|(_, count)| **count == max);

    match (leaders.next(), leaders.next()) {
        (Some((target, count)), None) if *count > majority => {
            DayOutcome::Eliminated(target.to_string())
        }
        _ => DayOutcome::NoMajority,
    }
}

pub fn resolve_day(session: &mut Session) -> DayOutcome {
    let day = session.day_count;
    let outcome = match tally_votes(&session.votes, session.alive_count()) {
        DayOutcome::Eliminated(id) => eliminate(session, &id),
        other => other,
    };

    let summary = match &outcome {
        DayOutcome::AllSkipped => format!("Day {}: Everyone skipped. No one was eliminated.", day),
        DayOutcome::NoMajority => format!("Day {}: No one was eliminated (no majority).", day),
        DayOutcome::Eliminated(id) => {
            let player = session.player(id);
            let name = player.map(|p| p.name.as_str()).unwrap_or(id.as_str());
            match player.and_then(|p| p.role) {
                Some(role) => format!("Day {}: {} was eliminated! They were a {}.", day, name, role),
                None => format!("Day {}: {} was eliminated!", day, name),
            }
        }
    };
    session.last_day_result = Some(summary);
    session.votes.clear();
    outcome
}

/// 処刑を適用し、役職を公開する
fn eliminate(session: &mut Session, player_id: &str) -> DayOutcome {
    let day = session.day_count;
    let Some(player) = session.player_mut(player_id).filter(|p| p.alive) else {
        warn!("処刑対象 {} が存在しないか既に死亡しています", player_id);
        return DayOutcome::NoMajority;
    };
    player.alive = false;
    let (id, name, role) = (player.id.clone(), player.name.clone(), player.role);
    info!("Day {}: {} was eliminated", day, name);

    match role {
        Some(role) => session.emit(SessionEvent::PlayerEliminated {
            day,
            player_id: id.clone(),
            name,
            role,
        }),
        None => warn!("処刑されたプレイヤー {} に役職がありません", name),
    }
    DayOutcome::Eliminated(id)
}
