use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SILVER_THRESHOLD: Decimal = dec!(5000000);
const GOLD_THRESHOLD: Decimal = dec!(10000000);
const DIAMOND_THRESHOLD: Decimal = dec!(20000000);

const RANK_CEILING: f64 = 8.0;
const RANK_FLOOR: f64 = 2.0;
const RANK_WIN_STEP: f64 = 0.05;
const RANK_LOSS_STEP: f64 = 0.03;

/// A club member and their wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier for the `Member`
    pub member_id: Uuid,
    pub display_name: String,
    /// Current wallet balance
    ///
    /// Only the ledger writes this field, always together with a wallet transaction record.
    pub(crate) balance: Decimal,
    /// Cumulative amount debited from the wallet
    ///
    /// Credits never decrease it, so it only grows. The membership tier is derived from it.
    pub(crate) total_spent: Decimal,
    /// Skill rating, kept between 2.0 and 8.0 by ranked match results
    pub rank_level: f64,
    /// Members are soft-deactivated instead of deleted so history stays intact.
    pub active: bool,
}

impl Member {
    pub fn new(member_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            member_id,
            display_name: display_name.into(),
            balance: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            rank_level: 3.0,
            active: true,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn total_spent(&self) -> Decimal {
        self.total_spent
    }

    pub fn tier(&self) -> Tier {
        Tier::for_total_spent(self.total_spent)
    }

    pub(crate) fn record_win(&mut self) {
        self.rank_level = (self.rank_level + RANK_WIN_STEP).min(RANK_CEILING);
    }

    pub(crate) fn record_loss(&mut self) {
        self.rank_level = (self.rank_level - RANK_LOSS_STEP).max(RANK_FLOOR);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Standard,
    Silver,
    Gold,
    Diamond,
}

impl Tier {
    /// Tier reached by a member who has spent `total_spent` in total
    pub fn for_total_spent(total_spent: Decimal) -> Self {
        if total_spent >= DIAMOND_THRESHOLD {
            Tier::Diamond
        } else if total_spent >= GOLD_THRESHOLD {
            Tier::Gold
        } else if total_spent >= SILVER_THRESHOLD {
            Tier::Silver
        } else {
            Tier::Standard
        }
    }

    /// Recurring bookings are reserved to Gold members and above.
    pub fn can_book_recurring(&self) -> bool {
        *self >= Tier::Gold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;

    #[rstest]
    #[case(dec!(0), Tier::Standard)]
    #[case(dec!(4999999), Tier::Standard)]
    #[case(dec!(5000000), Tier::Silver)]
    #[case(dec!(9999999), Tier::Silver)]
    #[case(dec!(10000000), Tier::Gold)]
    #[case(dec!(19999999), Tier::Gold)]
    #[case(dec!(20000000), Tier::Diamond)]
    fn test_tier_for_total_spent(#[case] total_spent: Decimal, #[case] expected: Tier) {
        assert_that!(Tier::for_total_spent(total_spent)).is_equal_to(expected);
    }

    #[test]
    fn test_recurring_gate() {
        assert_that!(Tier::Silver.can_book_recurring()).is_false();
        assert_that!(Tier::Gold.can_book_recurring()).is_true();
        assert_that!(Tier::Diamond.can_book_recurring()).is_true();
    }

    #[test]
    fn test_rank_is_clamped() {
        let mut member = Member::new(Uuid::new_v4(), "Linh");
        member.rank_level = 7.98;
        member.record_win();
        assert_that!(member.rank_level).is_equal_to(8.0);

        member.rank_level = 2.01;
        member.record_loss();
        assert_that!(member.rank_level).is_equal_to(2.0);
    }
}
