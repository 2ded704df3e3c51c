use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    player::PlayerId,
    role::Role,
    rule::{self, Settings},
};

/// 夜フェーズの小ステップ。全員が目を閉じ、役職ごとに一つずつ行動する。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NightStep {
    EveryoneClose,
    KillerOpen,
    KillerClose,
    HealerOpen,
    HealerClose,
    DetectiveOpen,
    DetectiveClose,
    EveryoneOpen,
}

impl NightStep {
    pub const FIRST: NightStep = NightStep::EveryoneClose;

    /// 次のステップ。`EveryoneOpen` の後は夜の解決に入るため `None`
    pub fn next(self) -> Option<NightStep> {
        match self {
            NightStep::EveryoneClose => Some(NightStep::KillerOpen),
            NightStep::KillerOpen => Some(NightStep::KillerClose),
            NightStep::KillerClose => Some(NightStep::HealerOpen),
            NightStep::HealerOpen => Some(NightStep::HealerClose),
            NightStep::HealerClose => Some(NightStep::DetectiveOpen),
            NightStep::DetectiveOpen => Some(NightStep::DetectiveClose),
            NightStep::DetectiveClose => Some(NightStep::EveryoneOpen),
            NightStep::EveryoneOpen => None,
        }
    }

    pub fn duration(self, settings: &Settings) -> Duration {
        match self {
            NightStep::EveryoneClose => rule::EVERYONE_CLOSE,
            NightStep::KillerOpen | NightStep::HealerOpen | NightStep::DetectiveOpen => {
                settings.action_time()
            }
            NightStep::KillerClose | NightStep::HealerClose | NightStep::DetectiveClose => {
                rule::ROLE_CLOSE
            }
            NightStep::EveryoneOpen => rule::EVERYONE_OPEN,
        }
    }

    /// このステップで行動できる役職と行動の種類
    pub fn action_window(self) -> Option<(Role, NightActionKind)> {
        match self {
            NightStep::KillerOpen => Some((Role::Killer, NightActionKind::Kill)),
            NightStep::HealerOpen => Some((Role::Doctor, NightActionKind::Heal)),
            NightStep::DetectiveOpen => Some((Role::Detective, NightActionKind::Investigate)),
            _ => None,
        }
    }

    pub fn announcement(self) -> &'static str {
        match self {
            NightStep::EveryoneClose => "Night falls. Everyone, close your eyes.",
            NightStep::KillerOpen => "Killers, open your eyes and choose a victim.",
            NightStep::KillerClose => "Killers, close your eyes.",
            NightStep::HealerOpen => "Doctor, open your eyes and choose someone to save.",
            NightStep::HealerClose => "Doctor, close your eyes.",
            NightStep::DetectiveOpen => "Detective, open your eyes and choose someone to investigate.",
            NightStep::DetectiveClose => "Detective, close your eyes.",
            NightStep::EveryoneOpen => "Everyone, open your eyes.",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightActionKind {
    Kill,
    Heal,
    Investigate,
}

impl NightActionKind {
    /// この行動を行える役職
    pub fn role(self) -> Role {
        match self {
            NightActionKind::Kill => Role::Killer,
            NightActionKind::Heal => Role::Doctor,
            NightActionKind::Investigate => Role::Detective,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightAction {
    pub actor: PlayerId,
    pub kind: NightActionKind,
    pub target: PlayerId,
}

/// 提出の結果。二回目以降の提出は状態を変えない
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Submission {
    Accepted,
    Duplicate,
}

/// 一晩分の行動。(種類, 行動者) ごとに一度だけ書き込める。提出順を保持する。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NightActions {
    submissions: Vec<NightAction>,
}

impl NightActions {
    pub fn record(&mut self, action: NightAction) -> Submission {
        if self.find(&action.actor, action.kind).is_some() {
            return Submission::Duplicate;
        }
        self.submissions.push(action);
        Submission::Accepted
    }

    pub fn find(&self, actor: &str, kind: NightActionKind) -> Option<&NightAction> {
        self.submissions
            .iter()
            .find(|a| a.actor == actor && a.kind == kind)
    }

    pub fn of_kind(&self, kind: NightActionKind) -> impl Iterator<Item = &NightAction> {
        self.submissions.iter().filter(move |a| a.kind == kind)
    }

    pub fn all(&self) -> &[NightAction] {
        &self.submissions
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn clear(&mut self) {
        self.submissions.clear();
    }
}

/// 探偵の調査結果。調べた探偵本人にしか公開されない
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigation {
    pub night: u32,
    pub target: PlayerId,
    pub target_name: String,
    pub is_killer: bool,
}

impl Investigation {
    pub fn summary(&self) -> String {
        if self.is_killer {
            format!("{} is the Killer", self.target_name)
        } else {
            format!("{} is not the Killer", self.target_name)
        }
    }
}
