use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MAX_PARTICIPANTS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentFormat {
    RoundRobin,
    Knockout,
    Hybrid,
}

/// Tournament lifecycle
///
/// Variants are declared in lifecycle order, so the derived ordering tells forward transitions
/// from backward ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TournamentStatus {
    Open,
    Registering,
    DrawCompleted,
    Ongoing,
    Finished,
}

impl TournamentStatus {
    pub fn accepts_registrations(&self) -> bool {
        matches!(self, TournamentStatus::Open | TournamentStatus::Registering)
    }

    /// The draw can be (re)generated any number of times until play starts.
    pub fn allows_draw(&self) -> bool {
        *self <= TournamentStatus::DrawCompleted
    }

    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        next > *self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub tournament_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub format: TournamentFormat,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub status: TournamentStatus,
    /// Free-form JSON settings, e.g. `{"maxParticipants": 32}`
    pub settings: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TournamentSettings {
    max_participants: Option<usize>,
}

impl Tournament {
    /// Participant cap read from the settings blob
    ///
    /// Missing or malformed settings fall back to 16.
    pub fn max_participants(&self) -> usize {
        self.settings
            .as_deref()
            .and_then(|raw| serde_json::from_str::<TournamentSettings>(raw).ok())
            .and_then(|settings| settings.max_participants)
            .unwrap_or(DEFAULT_MAX_PARTICIPANTS)
    }
}

/// A member's registration in a tournament
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentParticipant {
    pub participant_id: Uuid,
    pub tournament_id: Uuid,
    pub member_id: Uuid,
    /// Doubles partner, if any
    pub partner_id: Option<Uuid>,
    pub team_name: Option<String>,
    /// Bracket seed; lower seeds are placed first, unseeded participants last
    pub seed: Option<u32>,
    pub paid: bool,
    pub registered_at: DateTime<Utc>,
}
