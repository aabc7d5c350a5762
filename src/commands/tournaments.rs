use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        notification::match_link, schedule, tournament::DEFAULT_MAX_PARTICIPANTS, Match,
        MatchStatus, Notification, NotificationType, RelatedEntity, Tournament, TournamentFormat,
        TournamentParticipant, TournamentStatus, TransactionType, WinningSide,
    },
    ports::{
        clock::ClockPort,
        database::{DatabasePort, Transaction},
        push::PushPort,
    },
};

use super::{broadcast, deliver, ledger, DomainLogic, Error};

const SCORE_EVENT: &str = "UpdateMatchScore";

/// Open a new tournament for registration
///
/// Without explicit `settings` the blob is written as `{"maxParticipants": n}`.
#[derive(Clone, Debug)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub format: TournamentFormat,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub max_participants: Option<usize>,
    pub settings: Option<String>,
}

impl<D, P, C> Service<CreateTournamentRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = Tournament;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateTournamentRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let name = req.name.trim();
            if name.is_empty() {
                return Err(Error::InvalidInput("tournament name is empty".into()));
            }
            if req.end_date < req.start_date {
                return Err(Error::InvalidInput("tournament ends before it starts".into()));
            }
            if req.entry_fee.is_sign_negative() || req.prize_pool.is_sign_negative() {
                return Err(Error::InvalidInput(
                    "entry fee and prize pool cannot be negative".into(),
                ));
            }
            let max_participants = req.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
            if max_participants < 2 {
                return Err(Error::InvalidInput(
                    "a tournament needs room for at least two participants".into(),
                ));
            }
            let settings = req.settings.unwrap_or_else(|| {
                serde_json::json!({ "maxParticipants": max_participants }).to_string()
            });

            let tournament = Tournament {
                tournament_id: Uuid::new_v4(),
                name: name.to_string(),
                start_date: req.start_date,
                end_date: req.end_date,
                format: req.format,
                entry_fee: req.entry_fee,
                prize_pool: req.prize_pool,
                status: TournamentStatus::Open,
                settings: Some(settings),
            };
            let mut tx = database.begin().await?;
            tx.save_tournament(&tournament).await?;
            tx.commit().await?;
            tracing::info!(
                tournament_id = %tournament.tournament_id,
                format = ?tournament.format,
                "tournament created"
            );
            Ok(tournament)
        })
    }
}

/// Register a member, and optionally their doubles partner, in a tournament
#[derive(Clone, Debug)]
pub struct JoinTournamentRequest {
    pub tournament_id: Uuid,
    pub member_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub team_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinTournamentResponse {
    pub participant: TournamentParticipant,
    pub balance: Decimal,
}

impl<D, P, C> Service<JoinTournamentRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = JoinTournamentResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: JoinTournamentRequest) -> Self::Future {
        let database = self.database.clone();
        let now = self.clock.now();
        Box::pin(async move {
            if req.partner_id == Some(req.member_id) {
                return Err(Error::InvalidInput("a member cannot partner themselves".into()));
            }
            let mut tx = database.begin().await?;
            if tx.member(req.member_id).await?.is_none() {
                return Err(Error::not_found("member", req.member_id));
            }
            let mut tournament = load_tournament(tx.as_mut(), req.tournament_id).await?;
            if !tournament.status.accepts_registrations() {
                return Err(Error::InvalidState(
                    format!("tournament is {:?}, registrations are closed", tournament.status)
                        .into(),
                ));
            }

            let participants = tx.participants(tournament.tournament_id).await?;
            let max = tournament.max_participants();
            if participants.len() >= max {
                return Err(Error::TournamentFull(max));
            }
            let newcomers = std::iter::once(req.member_id).chain(req.partner_id);
            for member_id in newcomers {
                let taken = participants
                    .iter()
                    .any(|p| p.member_id == member_id || p.partner_id == Some(member_id));
                if taken {
                    return Err(Error::AlreadyRegistered { member_id });
                }
            }

            if tournament.entry_fee > Decimal::ZERO {
                ledger::debit(
                    tx.as_mut(),
                    req.member_id,
                    tournament.entry_fee,
                    TransactionType::Payment,
                    Some(RelatedEntity::Tournament(tournament.tournament_id)),
                    format!("Entry fee for {}", tournament.name),
                    now,
                )
                .await?;
            }

            let participant = TournamentParticipant {
                participant_id: Uuid::new_v4(),
                tournament_id: tournament.tournament_id,
                member_id: req.member_id,
                partner_id: req.partner_id,
                team_name: req.team_name,
                seed: None,
                paid: true,
                registered_at: now,
            };
            tx.save_participant(&participant).await?;
            if tournament.status == TournamentStatus::Open {
                tournament.status = TournamentStatus::Registering;
                tx.save_tournament(&tournament).await?;
            }
            let member = tx
                .member(req.member_id)
                .await?
                .ok_or(Error::not_found("member", req.member_id))?;
            tx.commit().await?;

            tracing::info!(
                tournament_id = %tournament.tournament_id,
                member_id = %req.member_id,
                "tournament registration"
            );
            Ok(JoinTournamentResponse {
                participant,
                balance: member.balance(),
            })
        })
    }
}

/// Draw the tournament, replacing any previous draw
#[derive(Clone, Debug)]
pub struct GenerateScheduleRequest {
    pub tournament_id: Uuid,
}

impl<D, P, C> Service<GenerateScheduleRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = Vec<Match>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GenerateScheduleRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut tournament = load_tournament(tx.as_mut(), req.tournament_id).await?;
            if !tournament.status.allows_draw() {
                return Err(Error::InvalidState(
                    format!("tournament is {:?}, the draw is locked", tournament.status).into(),
                ));
            }
            let participants = tx.participants(tournament.tournament_id).await?;
            if participants.len() < 2 {
                return Err(Error::InsufficientParticipants(participants.len()));
            }

            let entrants = schedule::draw_order(&participants);
            let matches = match tournament.format {
                TournamentFormat::Knockout => {
                    schedule::knockout_first_round(&tournament, &entrants)
                }
                TournamentFormat::RoundRobin => schedule::round_robin(&tournament, &entrants),
                TournamentFormat::Hybrid => {
                    return Err(Error::InvalidState(
                        "hybrid tournaments have no automatic draw".into(),
                    ))
                }
            };

            let replaced = tx
                .delete_matches_for_tournament(tournament.tournament_id)
                .await?;
            for game in &matches {
                tx.save_match(game).await?;
            }
            tournament.status = TournamentStatus::DrawCompleted;
            tx.save_tournament(&tournament).await?;
            tx.commit().await?;

            tracing::info!(
                tournament_id = %tournament.tournament_id,
                matches = matches.len(),
                replaced,
                "schedule generated"
            );
            Ok(matches)
        })
    }
}

/// Move a drawn tournament into play or close it
#[derive(Clone, Debug)]
pub struct AdvanceTournamentRequest {
    pub tournament_id: Uuid,
    pub to: TournamentStatus,
}

impl<D, P, C> Service<AdvanceTournamentRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = Tournament;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: AdvanceTournamentRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            // Earlier statuses are reached through registration and the draw
            if !matches!(req.to, TournamentStatus::Ongoing | TournamentStatus::Finished) {
                return Err(Error::InvalidInput(
                    format!("cannot move a tournament to {:?} directly", req.to).into(),
                ));
            }
            let mut tx = database.begin().await?;
            let mut tournament = load_tournament(tx.as_mut(), req.tournament_id).await?;
            if !tournament.status.can_transition_to(req.to) {
                return Err(Error::InvalidState(
                    format!("tournament cannot go from {:?} to {:?}", tournament.status, req.to)
                        .into(),
                ));
            }
            tournament.status = req.to;
            tx.save_tournament(&tournament).await?;
            tx.commit().await?;
            Ok(tournament)
        })
    }
}

/// Record the final score of a match
///
/// Ranked matches move every present player's rank level, once.
#[derive(Clone, Debug)]
pub struct RecordResultRequest {
    pub match_id: Uuid,
    pub score1: u32,
    pub score2: u32,
    pub details: Option<String>,
    pub winning_side: WinningSide,
}

impl<D, P, C> Service<RecordResultRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = Match;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RecordResultRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut game = tx
                .find_match(req.match_id)
                .await?
                .ok_or(Error::not_found("match", req.match_id))?;
            if game.status == MatchStatus::Finished {
                return Err(Error::InvalidState("match is already finished".into()));
            }

            game.score1 = req.score1;
            game.score2 = req.score2;
            game.details = req.details;
            game.winning_side = Some(req.winning_side);
            game.status = MatchStatus::Finished;
            tx.save_match(&game).await?;

            let (winners, _) = game.sides(req.winning_side);
            let mut notifications = Vec::new();
            for player_id in game.players() {
                let Some(mut member) = tx.member(player_id).await? else {
                    tracing::warn!(
                        match_id = %game.match_id,
                        %player_id,
                        "unknown player in match"
                    );
                    continue;
                };
                let won = winners.contains(player_id);
                if game.ranked {
                    if won {
                        member.record_win();
                    } else {
                        member.record_loss();
                    }
                    tx.save_member(&member).await?;
                }
                let notification = if won {
                    Notification::new(
                        player_id,
                        format!("Congratulations! You won {}-{}", game.score1, game.score2),
                        NotificationType::Success,
                        Some(match_link(game.match_id)),
                        now,
                    )
                } else {
                    Notification::new(
                        player_id,
                        format!("Match finished: {}-{}", game.score1, game.score2),
                        NotificationType::Info,
                        Some(match_link(game.match_id)),
                        now,
                    )
                };
                tx.save_notification(&notification).await?;
                notifications.push(notification);
            }
            tx.commit().await?;

            let payload = serde_json::json!({
                "matchId": game.match_id,
                "score1": game.score1,
                "score2": game.score2,
            });
            broadcast(push.as_ref(), SCORE_EVENT, &payload.to_string()).await;
            deliver(push.as_ref(), &notifications).await;
            Ok(game)
        })
    }
}

async fn load_tournament(
    tx: &mut dyn Transaction,
    tournament_id: Uuid,
) -> Result<Tournament, Error> {
    tx.tournament(tournament_id)
        .await?
        .ok_or(Error::not_found("tournament", tournament_id))
}
