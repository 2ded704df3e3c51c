use crate::error::GameError;
use crate::models::{player::PlayerId, role::Role, rule};
use crate::services::random::RandomSource;

/// 人数から役職の組を決める。並びは固定（人狼、医者、探偵、村人）。
pub fn assign_roles(player_count: usize, killer_count: usize) -> Result<Vec<Role>, GameError> {
    rule::validate_roles(player_count, killer_count)?;

    let mut roles = Vec::with_capacity(player_count);
    roles.extend(std::iter::repeat(Role::Killer).take(killer_count));
    roles.push(Role::Doctor);
    roles.push(Role::Detective);
    roles.extend(std::iter::repeat(Role::Villager).take(player_count - killer_count - 2));
    Ok(roles)
}

/// 役職をシャッフルしてプレイヤーに配る
pub fn deal_roles(
    mut roles: Vec<Role>,
    players: &[PlayerId],
    rng: &mut RandomSource,
) -> Result<Vec<(PlayerId, Role)>, GameError> {
    if roles.len() != players.len() {
        return Err(GameError::InvalidConfiguration(format!(
            "役職数({})とプレイヤー数({})が一致しません",
            roles.len(),
            players.len()
        )));
    }
    rng.shuffle(&mut roles);
    Ok(players.iter().cloned().zip(roles).collect())
}

/// 神（観察者）を役職と無関係に一人選ぶ
pub fn pick_god(players: &[PlayerId], rng: &mut RandomSource) -> Option<PlayerId> {
    rng.pick(players).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::{MAX_KILLERS, MAX_PLAYERS, MIN_KILLERS, MIN_PLAYERS};
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<PlayerId> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_role_counts_for_all_valid_configurations() {
        for player_count in MIN_PLAYERS..=MAX_PLAYERS {
            for killer_count in MIN_KILLERS..=MAX_KILLERS {
                if player_count < killer_count + 2 {
                    continue;
                }
                let roles = assign_roles(player_count, killer_count).unwrap();
                let count = |role: Role| roles.iter().filter(|r| **r == role).count();

                assert_eq!(roles.len(), player_count);
                assert_eq!(count(Role::Killer), killer_count);
                assert_eq!(count(Role::Doctor), 1);
                assert_eq!(count(Role::Detective), 1);
                assert_eq!(count(Role::Villager), player_count - killer_count - 2);
            }
        }
    }

    #[test]
    fn test_invalid_configurations() {
        for (players, killers) in [(2, 1), (11, 1), (4, 0), (4, 4), (4, 3)] {
            assert!(
                matches!(
                    assign_roles(players, killers),
                    Err(GameError::InvalidConfiguration(_))
                ),
                "{} players / {} killers should be rejected",
                players,
                killers
            );
        }
        assert!(assign_roles(5, 3).is_ok());
    }

    #[test]
    fn test_deal_is_bijection() {
        let players = ids(7);
        let mut rng = RandomSource::from_seed(3);
        let dealt = deal_roles(assign_roles(7, 2).unwrap(), &players, &mut rng).unwrap();

        let dealt_players: HashSet<_> = dealt.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(dealt_players.len(), 7);
        assert_eq!(dealt.iter().filter(|(_, r)| r.is_killer()).count(), 2);
    }

    #[test]
    fn test_deal_rejects_mismatched_lengths() {
        let mut rng = RandomSource::from_seed(3);
        assert!(deal_roles(assign_roles(4, 1).unwrap(), &ids(5), &mut rng).is_err());
    }

    #[test]
    fn test_killer_position_is_uniform() {
        // 各席が人狼になる回数がほぼ均等であること
        let players = ids(5);
        let trials = 20_000;
        let mut hits = [0usize; 5];
        let mut rng = RandomSource::from_seed(2024);
        for _ in 0..trials {
            let dealt = deal_roles(assign_roles(5, 1).unwrap(), &players, &mut rng).unwrap();
            let seat = dealt.iter().position(|(_, r)| r.is_killer()).unwrap();
            hits[seat] += 1;
        }
        let expected = trials as f64 / 5.0;
        for count in hits {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "偏りが大きすぎます: {:?}", hits);
        }
    }

    #[test]
    fn test_pick_god_from_roster() {
        let players = ids(4);
        let mut rng = RandomSource::from_seed(11);
        let god = pick_god(&players, &mut rng).unwrap();
        assert!(players.contains(&god));
        assert!(pick_god(&[], &mut rng).is_none());
    }
}
