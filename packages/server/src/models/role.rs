use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Killer,    // 人狼
    Doctor,    // 医者
    Detective, // 探偵
    Villager,  // 村人
}

impl Role {
    pub fn is_killer(&self) -> bool {
        matches!(self, Role::Killer)
    }

    /// プレイヤーに表示する役職説明
    pub fn description(&self) -> &'static str {
        match self {
            Role::Killer => {
                "Your goal is to eliminate all villagers. Each night, you can kill one player."
            }
            Role::Doctor => {
                "You can save one player each night from being killed. You cannot save yourself."
            }
            Role::Detective => {
                "Each night, you can investigate one player to find out if they are the killer."
            }
            Role::Villager => {
                "You are a regular villager. Work with others to find and eliminate the killer."
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Killer => write!(f, "Killer"),
            Role::Doctor => write!(f, "Doctor"),
            Role::Detective => write!(f, "Detective"),
            Role::Villager => write!(f, "Villager"),
        }
    }
}

/// 勝利陣営
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Villagers,
    Killer,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Villagers => write!(f, "Villagers"),
            Winner::Killer => write!(f, "Killer"),
        }
    }
}
