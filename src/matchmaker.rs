use crate::error::MatchmakingError;
use crate::roster::Roster;
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

/// The match generation engine. Stateless apart from its config: it reads
/// the roster and match list and never mutates player state.
pub struct Matchmaker {
    config: MatchmakingConfig,
}

impl Matchmaker {
    pub fn new(config: MatchmakingConfig) -> Self {
        Self { config }
    }

    /// Build the candidate pool for the next match.
    ///
    /// Players in a pending match are skipped. When anyone has played, the
    /// most-played players sit out unless that leaves too few to fill a
    /// match, in which case every free player is considered. The pool is
    /// sorted by times-played, ties in roster order.
    pub fn eligible_candidates<'a>(
        &self,
        roster: &'a Roster,
        busy: &HashSet<PlayerId>,
    ) -> Result<Vec<&'a Player>, MatchmakingError> {
        let required = self.config.format.required_players();

        let free: Vec<&Player> = roster
            .iter()
            .filter(|p| !p.name.trim().is_empty() && !busy.contains(&p.id))
            .collect();

        let max_times_played = roster.max_times_played().unwrap_or(0);

        let mut candidates = if max_times_played == 0 {
            free
        } else {
            let below_max: Vec<&Player> = free
                .iter()
                .copied()
                .filter(|p| p.times_played < max_times_played)
                .collect();

            if below_max.len() < required {
                debug!(
                    below_max = below_max.len(),
                    free = free.len(),
                    "too few players below max times played, using all free players"
                );
                free
            } else {
                below_max
            }
        };

        // Stable sort keeps roster order among ties
        candidates.sort_by_key(|p| p.times_played);

        if candidates.len() < required {
            return Err(MatchmakingError::InsufficientPlayers {
                required,
                available: candidates.len(),
            });
        }

        Ok(candidates)
    }

    /// Neither has the other among their recent teammates
    pub fn can_be_teammates(&self, a: &Player, b: &Player) -> bool {
        a.id != b.id && !a.has_recent_teammate(b.id) && !b.has_recent_teammate(a.id)
    }

    /// Disjoint teams, close enough in average skill, and no cross-team
    /// pair that met recently (checked in both directions)
    pub fn can_teams_play(&self, team1: &Team<'_>, team2: &Team<'_>) -> bool {
        if team1.shares_player_with(team2) {
            return false;
        }

        if (team1.skill - team2.skill).abs() >= self.config.max_team_skill_gap {
            return false;
        }

        team1.members.iter().all(|p1| {
            team2
                .members
                .iter()
                .all(|p2| !p1.has_recent_opponent(p2.id) && !p2.has_recent_opponent(p1.id))
        })
    }

    /// 1v1 pairing rule
    pub fn can_face(&self, a: &Player, b: &Player) -> bool {
        a.id != b.id
            && a.skill.abs_diff(b.skill) <= self.config.max_pair_skill_gap
            && !a.has_recent_opponent(b.id)
            && !b.has_recent_opponent(a.id)
    }

    /// Every valid 2v2 team from the pool, weighted against the pool's
    /// minimum times-played
    pub fn possible_teams<'a>(&self, candidates: &[&'a Player]) -> Vec<Team<'a>> {
        let min_times_played = min_times_played(candidates);
        let mut teams = Vec::new();

        for (i, &first) in candidates.iter().enumerate() {
            for &second in &candidates[i + 1..] {
                if first.times_played.abs_diff(second.times_played) > self.config.max_teammate_play_gap {
                    continue;
                }
                if !self.can_be_teammates(first, second) {
                    continue;
                }

                let weight = self.config.weight(first.times_played, min_times_played)
                    + self.config.weight(second.times_played, min_times_played);
                teams.push(Team::new(first, second, weight));
            }
        }

        teams
    }

    /// Pick two opposing teams.
    ///
    /// Team 1 is drawn by weight from the teams holding at least one
    /// least-played candidate; team 2 uniformly from the teams compatible
    /// with it. Team 1 is redrawn up to `max_attempts` times.
    pub fn select_teams<'a>(
        &self,
        candidates: &[&'a Player],
        rng: &mut impl Rng,
    ) -> Result<(Team<'a>, Team<'a>), MatchmakingError> {
        let teams = self.possible_teams(candidates);
        if teams.len() < 2 {
            return Err(MatchmakingError::NoValidTeams { found: teams.len() });
        }

        let min_times_played = min_times_played(candidates);
        let must_include: HashSet<PlayerId> = candidates
            .iter()
            .filter(|p| p.times_played == min_times_played)
            .map(|p| p.id)
            .collect();

        let seed_teams: Vec<Team<'a>> = teams
            .iter()
            .filter(|t| t.members.iter().any(|p| must_include.contains(&p.id)))
            .copied()
            .collect();

        if seed_teams.is_empty() {
            return Err(MatchmakingError::NoEligibleTeamForLeastPlayed);
        }

        for attempt in 1..=self.config.max_attempts {
            let team1 = match weighted_pick(&seed_teams, |t| t.weight, rng) {
                Some(&team) => team,
                None => break,
            };

            let compatible: Vec<&Team<'a>> = teams
                .iter()
                .filter(|t| !t.shares_player_with(&team1) && self.can_teams_play(&team1, t))
                .collect();

            if !compatible.is_empty() {
                let team2 = *compatible[rng.gen_range(0..compatible.len())];
                debug!(attempt, options = compatible.len(), "paired teams");
                return Ok((team1, team2));
            }

            debug!(
                attempt,
                team = ?[team1.members[0].id, team1.members[1].id],
                "no compatible opponents for drawn team, retrying"
            );
        }

        Err(MatchmakingError::NoCompatibleTeams {
            attempts: self.config.max_attempts,
        })
    }

    pub fn compatible_opponents<'a>(&self, player: &Player, candidates: &[&'a Player]) -> Vec<&'a Player> {
        candidates
            .iter()
            .copied()
            .filter(|opponent| self.can_face(player, opponent))
            .collect()
    }

    /// Pick a 1v1 pairing: both players drawn by weight, the second only
    /// from those compatible with the first. Single shot, no retries.
    pub fn select_pair<'a>(
        &self,
        candidates: &[&'a Player],
        rng: &mut impl Rng,
    ) -> Result<(&'a Player, &'a Player), MatchmakingError> {
        let min_times_played = min_times_played(candidates);
        let weight = |p: &&Player| self.config.weight(p.times_played, min_times_played);

        let first = match weighted_pick(candidates, weight, rng) {
            Some(&player) => player,
            None => {
                return Err(MatchmakingError::InsufficientPlayers {
                    required: MatchFormat::Singles.required_players(),
                    available: 0,
                })
            }
        };

        let opponents = self.compatible_opponents(first, candidates);
        match weighted_pick(&opponents, weight, rng) {
            Some(&second) => Ok((first, second)),
            None => Err(MatchmakingError::NoCompatibleOpponents { player: first.id }),
        }
    }

    /// Generate one pending match from the current roster and match list
    pub fn generate(
        &self,
        roster: &Roster,
        matches: &[Match],
        match_id: MatchId,
        created_at: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Result<Match, MatchmakingError> {
        let busy = busy_players(matches);
        let candidates = self.eligible_candidates(roster, &busy)?;

        let (first, second) = match self.config.format {
            MatchFormat::Doubles => {
                let (team1, team2) = self.select_teams(&candidates, rng)?;
                (team1.snapshot(), team2.snapshot())
            }
            MatchFormat::Singles => {
                let (player1, player2) = self.select_pair(&candidates, rng)?;
                (
                    SideSnapshot::from_players(&[player1]),
                    SideSnapshot::from_players(&[player2]),
                )
            }
        };

        let game_match = Match::new(match_id, self.config.format, first, second, created_at);
        info!(
            match_id,
            first = ?game_match.first.names,
            second = ?game_match.second.names,
            skill_difference = game_match.skill_difference,
            "match generated"
        );
        Ok(game_match)
    }
}

/// Everyone currently in a pending match
pub fn busy_players(matches: &[Match]) -> HashSet<PlayerId> {
    matches
        .iter()
        .filter(|m| m.is_pending())
        .flat_map(|m| m.participants())
        .collect()
}

/// Cumulative-weight draw: take a uniform value in `[0, total)` and subtract
/// each item's weight in order until the remainder is `<= 0`.
pub fn weighted_pick<'t, T>(
    items: &'t [T],
    weight: impl Fn(&T) -> f64,
    rng: &mut impl Rng,
) -> Option<&'t T> {
    if items.is_empty() {
        return None;
    }

    let total: f64 = items.iter().map(&weight).sum();
    if !total.is_finite() || total <= 0.0 {
        return items.get(rng.gen_range(0..items.len()));
    }

    let mut remaining = rng.gen_range(0.0..total);
    for item in items {
        remaining -= weight(item);
        if remaining <= 0.0 {
            return Some(item);
        }
    }

    // Float rounding can leave a sliver above zero
    items.last()
}

fn min_times_played(players: &[&Player]) -> u32 {
    players.iter().map(|p| p.times_played).min().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Roster from (name, skill, times played)
    fn roster_of(entries: &[(&str, i64, i64)]) -> Roster {
        let mut roster = Roster::new();
        let range = MatchmakingConfig::default().skill_range;
        for &(name, skill, times) in entries {
            let id = roster.add(name, skill, range).unwrap();
            roster.set_times_played(id, times);
        }
        roster
    }

    fn doubles() -> Matchmaker {
        Matchmaker::new(MatchmakingConfig::default())
    }

    fn singles() -> Matchmaker {
        Matchmaker::new(MatchmakingConfig::singles())
    }

    fn ids(players: &[&Player]) -> Vec<PlayerId> {
        players.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_all_zero_pool_includes_everyone_free() {
        let roster = roster_of(&[("A", 5, 0), ("B", 5, 0), ("C", 5, 0), ("D", 5, 0), ("E", 5, 0)]);
        let candidates = doubles().eligible_candidates(&roster, &HashSet::new()).unwrap();
        assert_eq!(ids(&candidates), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_most_played_sit_out() {
        let roster = roster_of(&[
            ("A", 5, 2),
            ("B", 5, 1),
            ("C", 5, 1),
            ("D", 5, 0),
            ("E", 5, 1),
            ("F", 5, 2),
        ]);
        let candidates = doubles().eligible_candidates(&roster, &HashSet::new()).unwrap();
        // Sorted by times played, roster order among ties
        assert_eq!(ids(&candidates), vec![4, 2, 3, 5]);
    }

    #[test]
    fn test_falls_back_to_all_free_players() {
        let roster = roster_of(&[("A", 5, 1), ("B", 5, 1), ("C", 5, 0), ("D", 5, 1), ("E", 5, 1)]);
        let candidates = doubles().eligible_candidates(&roster, &HashSet::new()).unwrap();
        assert_eq!(ids(&candidates), vec![3, 1, 2, 4, 5]);
    }

    #[test]
    fn test_busy_players_excluded() {
        let roster = roster_of(&[("A", 5, 0), ("B", 5, 0), ("C", 5, 0), ("D", 5, 0), ("E", 5, 0)]);
        let busy: HashSet<PlayerId> = [2].into_iter().collect();
        let candidates = doubles().eligible_candidates(&roster, &busy).unwrap();
        assert_eq!(ids(&candidates), vec![1, 3, 4, 5]);

        let busy: HashSet<PlayerId> = [1, 2].into_iter().collect();
        let err = doubles().eligible_candidates(&roster, &busy).unwrap_err();
        assert_eq!(err, MatchmakingError::InsufficientPlayers { required: 4, available: 3 });
    }

    #[test]
    fn test_singles_needs_two() {
        let roster = roster_of(&[("A", 5, 0)]);
        let err = singles().eligible_candidates(&roster, &HashSet::new()).unwrap_err();
        assert_eq!(err, MatchmakingError::InsufficientPlayers { required: 2, available: 1 });

        let roster = roster_of(&[("A", 5, 0), ("B", 5, 0)]);
        assert!(singles().eligible_candidates(&roster, &HashSet::new()).is_ok());
    }

    #[test]
    fn test_teammate_recency_is_symmetric() {
        let mm = doubles();
        let a = Player::new(1, "A", 5);
        let mut b = Player::new(2, "B", 5);
        assert!(mm.can_be_teammates(&a, &b));
        assert!(!mm.can_be_teammates(&a, &a));

        // Only one side remembers
        b.remember_teammate(1, 2);
        assert!(!mm.can_be_teammates(&a, &b));
        assert!(!mm.can_be_teammates(&b, &a));
    }

    #[test]
    fn test_team_skill_gap_is_strict() {
        let mm = doubles();
        let players: Vec<Player> = [(1, 6), (2, 6), (3, 4), (4, 4), (5, 5)]
            .iter()
            .map(|&(id, skill)| Player::new(id, "P", skill))
            .collect();

        let strong = Team::new(&players[0], &players[1], 2.0);
        let weak = Team::new(&players[2], &players[3], 2.0);
        // 6.0 vs 4.0: gap of exactly 2.0 is rejected
        assert!(!mm.can_teams_play(&strong, &weak));

        let mixed = Team::new(&players[2], &players[4], 2.0);
        // 6.0 vs 4.5
        assert!(mm.can_teams_play(&strong, &mixed));
        // Overlapping teams never play
        assert!(!mm.can_teams_play(&weak, &mixed));
    }

    #[test]
    fn test_recent_opponents_block_team_pairing() {
        let mm = doubles();
        let a = Player::new(1, "A", 5);
        let b = Player::new(2, "B", 5);
        let c = Player::new(3, "C", 5);
        let mut d = Player::new(4, "D", 5);
        d.remember_opponent(1, 3);

        let t1 = Team::new(&a, &b, 2.0);
        let t2 = Team::new(&c, &d, 2.0);
        assert!(!mm.can_teams_play(&t1, &t2));
        assert!(!mm.can_teams_play(&t2, &t1));
    }

    #[test]
    fn test_pair_excludes_recent_opponents() {
        let mm = singles();
        let mut a = Player::new(1, "A", 5);
        let mut b = Player::new(2, "B", 5);
        let c = Player::new(3, "C", 6);
        a.remember_opponent(2, 2);
        b.remember_opponent(1, 2);

        let candidates = vec![&a, &b, &c];
        let opponents = mm.compatible_opponents(&a, &candidates);
        assert_eq!(ids(&opponents), vec![3]);
    }

    #[test]
    fn test_pair_skill_gap_is_inclusive() {
        let mm = singles();
        let a = Player::new(1, "A", 5);
        let b = Player::new(2, "B", 7);
        let c = Player::new(3, "C", 8);
        assert!(mm.can_face(&a, &b));
        assert!(!mm.can_face(&a, &c));
        assert!(!mm.can_face(&a, &a));
    }

    #[test]
    fn test_possible_teams_weights_and_play_gap() {
        let roster = roster_of(&[("A", 5, 0), ("B", 5, 2), ("C", 5, 3)]);
        let candidates: Vec<&Player> = roster.iter().collect();
        let teams = doubles().possible_teams(&candidates);

        // A+C differ by 3 games and are skipped
        assert_eq!(teams.len(), 2);
        let ab = teams.iter().find(|t| t.contains(1) && t.contains(2)).unwrap();
        assert_eq!(ab.weight, 1.0 + 0.25);
        let bc = teams.iter().find(|t| t.contains(2) && t.contains(3)).unwrap();
        assert_eq!(bc.weight, 0.25 + 0.125);
    }

    #[test]
    fn test_no_valid_teams() {
        let mut roster = roster_of(&[("A", 5, 0), ("B", 5, 0), ("C", 5, 0), ("D", 5, 0)]);
        for id in 1..=4 {
            let player = roster.get_mut(id).unwrap();
            for other in (1..=4).filter(|&o| o != id) {
                player.remember_teammate(other, 3);
            }
        }
        let candidates: Vec<&Player> = roster.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        let err = doubles().select_teams(&candidates, &mut rng).unwrap_err();
        assert_eq!(err, MatchmakingError::NoValidTeams { found: 0 });
    }

    #[test]
    fn test_no_team_for_least_played() {
        let roster = roster_of(&[("A", 5, 0), ("B", 5, 3), ("C", 5, 3), ("D", 5, 3), ("E", 5, 3)]);
        let mm = doubles();
        let candidates = mm.eligible_candidates(&roster, &HashSet::new()).unwrap();
        assert_eq!(candidates.len(), 5);

        let mut rng = StdRng::seed_from_u64(1);
        let err = mm.select_teams(&candidates, &mut rng).unwrap_err();
        assert_eq!(err, MatchmakingError::NoEligibleTeamForLeastPlayed);
    }

    #[test]
    fn test_no_compatible_teams_after_retries() {
        let mut roster = roster_of(&[("A", 5, 0), ("B", 5, 0), ("C", 5, 0), ("D", 5, 0)]);
        for id in 1..=4 {
            let player = roster.get_mut(id).unwrap();
            for other in (1..=4).filter(|&o| o != id) {
                player.remember_opponent(other, 3);
            }
        }
        let candidates: Vec<&Player> = roster.iter().collect();
        let mut rng = StdRng::seed_from_u64(9);
        let err = doubles().select_teams(&candidates, &mut rng).unwrap_err();
        assert_eq!(err, MatchmakingError::NoCompatibleTeams { attempts: 100 });
    }

    #[test]
    fn test_first_team_always_has_least_played() {
        let roster = roster_of(&[("A", 5, 0), ("B", 5, 1), ("C", 5, 1), ("D", 5, 1), ("E", 5, 1)]);
        let mm = doubles();
        let candidates = mm.eligible_candidates(&roster, &HashSet::new()).unwrap();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (team1, team2) = mm.select_teams(&candidates, &mut rng).unwrap();
            assert!(team1.contains(1));
            assert!(!team1.shares_player_with(&team2));
        }
    }

    #[test]
    fn test_generation_is_deterministic_for_a_seed() {
        let roster = roster_of(&[
            ("A", 3, 0),
            ("B", 4, 0),
            ("C", 5, 0),
            ("D", 6, 0),
            ("E", 5, 0),
            ("F", 4, 0),
        ]);
        let mm = doubles();
        let now = Utc::now();

        let a = mm.generate(&roster, &[], 1, now, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = mm.generate(&roster, &[], 1, now, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_weighted_pick_favours_heavier_items() {
        let items = [("light", 0.25), ("heavy", 1.0)];
        let mut rng = StdRng::seed_from_u64(3);
        let mut heavy = 0;
        for _ in 0..2_000 {
            if weighted_pick(&items, |i| i.1, &mut rng).unwrap().0 == "heavy" {
                heavy += 1;
            }
        }
        // Expect ~80%
        assert!(heavy > 1_400 && heavy < 1_800, "heavy picked {} times", heavy);
    }

    #[test]
    fn test_weighted_pick_empty() {
        let items: [f64; 0] = [];
        let mut rng = StdRng::seed_from_u64(3);
        assert!(weighted_pick(&items, |w| *w, &mut rng).is_none());
    }

    #[test]
    fn test_select_pair_produces_compatible_players() {
        let roster = roster_of(&[("A", 3, 0), ("B", 4, 0), ("C", 8, 0)]);
        let mm = singles();
        let candidates = mm.eligible_candidates(&roster, &HashSet::new()).unwrap();

        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            match mm.select_pair(&candidates, &mut rng) {
                Ok((p1, p2)) => assert!(mm.can_face(p1, p2)),
                // C has nobody within two skill levels
                Err(err) => assert_eq!(err, MatchmakingError::NoCompatibleOpponents { player: 3 }),
            }
        }
    }

    #[test]
    fn test_busy_players_only_from_pending_matches() {
        let a = Player::new(1, "A", 5);
        let b = Player::new(2, "B", 5);
        let c = Player::new(3, "C", 5);
        let d = Player::new(4, "D", 5);
        let now = Utc::now();

        let pending = Match::new(
            1,
            MatchFormat::Singles,
            SideSnapshot::from_players(&[&a]),
            SideSnapshot::from_players(&[&b]),
            now,
        );
        let mut done = Match::new(
            2,
            MatchFormat::Singles,
            SideSnapshot::from_players(&[&c]),
            SideSnapshot::from_players(&[&d]),
            now,
        );
        done.completed = true;

        let expected: HashSet<PlayerId> = [1, 2].into_iter().collect();
        assert_eq!(busy_players(&[pending, done]), expected);
    }
}
