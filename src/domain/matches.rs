use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinningSide {
    Team1,
    Team2,
}

/// One side of a match
///
/// Either slot may be empty: singles leave `player2` empty, a bye leaves the whole side empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub player1: Option<Uuid>,
    pub player2: Option<Uuid>,
}

impl Team {
    pub fn new(player1: Uuid, player2: Option<Uuid>) -> Self {
        Self {
            player1: Some(player1),
            player2,
        }
    }

    pub fn players(&self) -> impl Iterator<Item = Uuid> {
        self.player1.into_iter().chain(self.player2)
    }

    pub fn is_empty(&self) -> bool {
        self.player1.is_none() && self.player2.is_none()
    }

    pub fn contains(&self, member_id: Uuid) -> bool {
        self.players().any(|player| player == member_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: Uuid,
    /// `None` for friendly matches
    pub tournament_id: Option<Uuid>,
    pub round_name: Option<String>,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub team1: Team,
    pub team2: Team,
    pub score1: u32,
    pub score2: u32,
    /// Per-set scores, e.g. `11-9, 5-11, 11-8`
    pub details: Option<String>,
    pub winning_side: Option<WinningSide>,
    /// Ranked matches move the players' rank level when they finish
    pub ranked: bool,
    pub status: MatchStatus,
}

impl Match {
    /// Every player taking part, deduplicated, in slot order
    pub fn players(&self) -> Vec<Uuid> {
        let mut players: Vec<Uuid> = Vec::with_capacity(4);
        for player in self.team1.players().chain(self.team2.players()) {
            if !players.contains(&player) {
                players.push(player);
            }
        }
        players
    }

    /// Players on the winning and the losing side, in that order
    pub fn sides(&self, winner: WinningSide) -> (&Team, &Team) {
        match winner {
            WinningSide::Team1 => (&self.team1, &self.team2),
            WinningSide::Team2 => (&self.team2, &self.team1),
        }
    }
}
