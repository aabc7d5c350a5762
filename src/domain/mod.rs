pub mod booking;
pub mod matches;
pub mod member;
pub mod notification;
pub mod schedule;
pub mod tournament;
pub mod wallet;

pub use booking::{Booking, BookingStatus, Court, TimeRange};
pub use matches::{Match, MatchStatus, Team, WinningSide};
pub use member::{Member, Tier};
pub use notification::{Notification, NotificationType};
pub use tournament::{Tournament, TournamentFormat, TournamentParticipant, TournamentStatus};
pub use wallet::{RelatedEntity, TransactionStatus, TransactionType, WalletTransaction};
