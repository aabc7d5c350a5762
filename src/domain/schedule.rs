//! Match schedule generation for knockout and round-robin tournaments.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use super::matches::{Match, MatchStatus, Team};
use super::tournament::{Tournament, TournamentParticipant};

const ROUND_NAMES: [&str; 5] = [
    "Final",
    "Semi Final",
    "Quarter Final",
    "Round of 16",
    "Round of 32",
];
const GROUP_STAGE: &str = "Group Stage";

/// Matches played on one day, two hours apart from 9:00
const MATCHES_PER_DAY: usize = 4;
const FIRST_MATCH_HOUR: i64 = 9;
const HOURS_BETWEEN_MATCHES: i64 = 2;

/// Order participants for the draw
///
/// Lower seeds come first and unseeded participants last. Participants are expected in
/// registration order, and the stable sort keeps that order among equal seeds.
pub fn draw_order(participants: &[TournamentParticipant]) -> Vec<Team> {
    let mut ordered: Vec<&TournamentParticipant> = participants.iter().collect();
    ordered.sort_by_key(|participant| (participant.seed.is_none(), participant.seed));
    ordered
        .into_iter()
        .map(|participant| Team::new(participant.member_id, participant.partner_id))
        .collect()
}

/// Smallest power of two that fits `entrants`
pub fn bracket_size(entrants: usize) -> usize {
    entrants.max(1).next_power_of_two()
}

/// Name of the first round of a bracket of `bracket_size` slots
pub fn round_name(bracket_size: usize) -> String {
    let rounds = bracket_size.trailing_zeros() as usize;
    match rounds.checked_sub(1).and_then(|index| ROUND_NAMES.get(index)) {
        Some(name) => name.to_string(),
        None => format!("Round {rounds}"),
    }
}

/// First round of a seeded knockout bracket
///
/// Entrant `i` meets entrant `bracket_size - 1 - i`. Slots past the last entrant are byes and
/// leave `team2` empty. Later rounds are not generated here.
pub fn knockout_first_round(tournament: &Tournament, entrants: &[Team]) -> Vec<Match> {
    let size = bracket_size(entrants.len());
    let round = round_name(size);

    (0..size / 2)
        .filter_map(|i| {
            let team1 = entrants.get(i).copied().unwrap_or_default();
            let team2 = entrants.get(size - 1 - i).copied().unwrap_or_default();
            (!team1.is_empty() || !team2.is_empty()).then_some((team1, team2))
        })
        .enumerate()
        .map(|(index, (team1, team2))| {
            scheduled_match(
                tournament,
                &round,
                tournament.start_date,
                slot_start(tournament.start_date, index),
                team1,
                team2,
            )
        })
        .collect()
}

/// One match for every unordered pair of entrants, four a day
pub fn round_robin(tournament: &Tournament, entrants: &[Team]) -> Vec<Match> {
    let mut matches = Vec::with_capacity(entrants.len() * entrants.len().saturating_sub(1) / 2);
    for (i, team1) in entrants.iter().enumerate() {
        for team2 in &entrants[i + 1..] {
            let index = matches.len();
            let date = tournament.start_date + Duration::days((index / MATCHES_PER_DAY) as i64);
            matches.push(scheduled_match(
                tournament,
                GROUP_STAGE,
                date,
                slot_start(date, index),
                *team1,
                *team2,
            ));
        }
    }
    matches
}

fn slot_start(date: NaiveDate, index: usize) -> DateTime<Utc> {
    let offset = FIRST_MATCH_HOUR + (index % MATCHES_PER_DAY) as i64 * HOURS_BETWEEN_MATCHES;
    (date.and_time(NaiveTime::MIN) + Duration::hours(offset)).and_utc()
}

fn scheduled_match(
    tournament: &Tournament,
    round: &str,
    date: NaiveDate,
    start_time: DateTime<Utc>,
    team1: Team,
    team2: Team,
) -> Match {
    Match {
        match_id: Uuid::new_v4(),
        tournament_id: Some(tournament.tournament_id),
        round_name: Some(round.to_string()),
        date,
        start_time,
        team1,
        team2,
        score1: 0,
        score2: 0,
        details: None,
        winning_side: None,
        ranked: true,
        status: MatchStatus::Scheduled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tournament::{TournamentFormat, TournamentStatus};
    use chrono::{TimeZone, Timelike};
    use rust_decimal::Decimal;
    use rstest::*;
    use speculoos::prelude::*;
    use std::collections::HashSet;

    #[fixture]
    fn tournament() -> Tournament {
        Tournament {
            tournament_id: Uuid::new_v4(),
            name: "Club Open".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 5, 9).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 5, 12).unwrap(),
            format: TournamentFormat::Knockout,
            entry_fee: Decimal::ZERO,
            prize_pool: Decimal::ZERO,
            status: TournamentStatus::Registering,
            settings: None,
        }
    }

    fn singles(count: usize) -> Vec<Team> {
        (0..count).map(|_| Team::new(Uuid::new_v4(), None)).collect()
    }

    fn participant(seed: Option<u32>) -> TournamentParticipant {
        TournamentParticipant {
            participant_id: Uuid::new_v4(),
            tournament_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            partner_id: None,
            team_name: None,
            seed,
            paid: true,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_draw_order_puts_unseeded_last() {
        // GIVEN participants in registration order
        let participants = vec![
            participant(None),
            participant(Some(2)),
            participant(None),
            participant(Some(1)),
        ];

        // WHEN ordering them for the draw
        let order: Vec<Option<Uuid>> = draw_order(&participants)
            .into_iter()
            .map(|team| team.player1)
            .collect();

        // THEN seeds come first, then unseeded participants in registration order
        let expected: Vec<Option<Uuid>> = [3, 1, 0, 2]
            .iter()
            .map(|&i| Some(participants[i].member_id))
            .collect();
        assert_that!(order).is_equal_to(expected);
    }

    #[rstest]
    #[case(2, 2, "Final")]
    #[case(3, 4, "Semi Final")]
    #[case(5, 8, "Quarter Final")]
    #[case(16, 16, "Round of 16")]
    #[case(17, 32, "Round of 32")]
    #[case(40, 64, "Round 6")]
    fn test_bracket_size_and_round_name(
        #[case] entrants: usize,
        #[case] size: usize,
        #[case] name: &str,
    ) {
        assert_that!(bracket_size(entrants)).is_equal_to(size);
        assert_that!(round_name(size).as_str()).is_equal_to(name);
    }

    #[rstest]
    fn test_knockout_five_entrants(tournament: Tournament) {
        // GIVEN five entrants, so a bracket of eight
        let entrants = singles(5);

        // WHEN generating the first round
        let matches = knockout_first_round(&tournament, &entrants);

        // THEN there are four matches and the top seeds get the byes
        assert_that!(matches).has_length(4);
        let byes = matches.iter().filter(|m| m.team2.is_empty()).count();
        assert_that!(byes).is_equal_to(3);
        assert_that!(matches[0].team1).is_equal_to(entrants[0]);
        assert_that!(matches[0].team2.is_empty()).is_true();
        assert_that!(matches[3].team1).is_equal_to(entrants[3]);
        assert_that!(matches[3].team2).is_equal_to(entrants[4]);
        for m in &matches {
            assert_that!(m.round_name.as_deref()).is_equal_to(Some("Quarter Final"));
            assert_that!(m.ranked).is_true();
            assert_that!(m.status).is_equal_to(MatchStatus::Scheduled);
            assert_that!(m.date).is_equal_to(tournament.start_date);
        }
    }

    #[rstest]
    fn test_knockout_slots_are_two_hours_apart(tournament: Tournament) {
        let matches = knockout_first_round(&tournament, &singles(8));

        let hours: Vec<u32> = matches.iter().map(|m| m.start_time.hour()).collect();
        assert_that!(hours).is_equal_to(vec![9, 11, 13, 15]);
    }

    #[rstest]
    fn test_round_robin_completeness(
        tournament: Tournament,
        #[values(2, 3, 4, 5, 8)] entrants: usize,
    ) {
        let teams = singles(entrants);

        let matches = round_robin(&tournament, &teams);

        // Every unordered pair appears exactly once
        assert_that!(matches).has_length(entrants * (entrants - 1) / 2);
        let pairs: HashSet<(Uuid, Uuid)> = matches
            .iter()
            .map(|m| {
                let a = m.team1.player1.unwrap();
                let b = m.team2.player1.unwrap();
                (a.min(b), a.max(b))
            })
            .collect();
        assert_that!(pairs.len()).is_equal_to(matches.len());
        assert_that!(matches.iter().all(|m| m.team1 != m.team2)).is_true();
    }

    #[rstest]
    fn test_round_robin_rotates_days(tournament: Tournament) {
        // GIVEN four entrants, so six matches
        let matches = round_robin(&tournament, &singles(4));

        // THEN the first four are on day one and the rest roll over to day two
        let day_one = tournament.start_date;
        let day_two = day_one + Duration::days(1);
        let dates: Vec<NaiveDate> = matches.iter().map(|m| m.date).collect();
        assert_that!(dates).is_equal_to(vec![day_one, day_one, day_one, day_one, day_two, day_two]);
        assert_that!(matches[4].start_time)
            .is_equal_to(Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap());
        assert_that!(matches[5].start_time)
            .is_equal_to(Utc.with_ymd_and_hms(2026, 5, 10, 11, 0, 0).unwrap());
        assert_that!(matches.iter().all(|m| m.round_name.as_deref() == Some("Group Stage")))
            .is_true();
    }

    #[rstest]
    fn test_doubles_partner_fills_second_slot(tournament: Tournament) {
        let mut first = participant(Some(1));
        first.partner_id = Some(Uuid::new_v4());
        let second = participant(Some(2));

        let entrants = draw_order(&[first.clone(), second.clone()]);
        let matches = knockout_first_round(&tournament, &entrants);

        assert_that!(matches).has_length(1);
        assert_that!(matches[0].team1.player2).is_equal_to(first.partner_id);
        assert_that!(matches[0].team2.player1).is_equal_to(Some(second.member_id));
        assert_that!(matches[0].round_name.as_deref()).is_equal_to(Some("Final"));
    }
}
