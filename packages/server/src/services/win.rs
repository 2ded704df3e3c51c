use crate::models::{player::Player, role::Winner};

/// 生存者の陣営数から勝敗を判定する。決着がつかなければ `None`
pub fn evaluate<'a>(players: impl IntoIterator<Item = &'a Player>) -> Option<Winner> {
    let (killers, others) = players
        .into_iter()
        .filter(|p| p.alive)
        .fold((0usize, 0usize), |(k, o), p| {
            if p.is_killer() {
                (k + 1, o)
            } else {
                (k, o + 1)
            }
        });

    if killers == 0 {
        Some(Winner::Villagers)
    } else if killers >= others {
        Some(Winner::Killer)
    } else {
        None
    }
}
