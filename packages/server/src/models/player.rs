use serde::{Deserialize, Serialize};

use super::role::Role;

pub type PlayerId = String;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<Role>, // ゲーム開始まで未設定
    pub alive: bool,
    pub ready: bool, // ロビーでのみ使用
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            role: None,
            alive: true,
            ready: false,
        }
    }

    pub fn is_killer(&self) -> bool {
        self.role.is_some_and(|role| role.is_killer())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}
