//! The Bidding Arbiter (C4, §4.4): pure validation of one bid attempt against the three pieces of
//! state it needs (auction, the live player, the bidding team). Deliberately has no knowledge of
//! persistence or broadcast — the coordinator fetches state, calls [`evaluate`], and is
//! responsible for committing an accepted bid or recording a rejected one.

use crate::errors::BidRejectionReason;
use crate::ids::TeamId;
use crate::model::{Auction, AuctionPlayer, AuctionStatus, AuctionTeam};

#[derive(Debug, Clone, Copy)]
pub struct BidAttempt {
    pub team_id: TeamId,
    pub attempted_amount: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptedBid {
    pub bidder_team_id: TeamId,
    pub amount: i64,
}

pub enum BidOutcome {
    Accepted(AcceptedBid),
    Rejected(BidRejectionReason),
}

/// Runs the eight preconditions of §4.4 in order, short-circuiting on the first failure — the
/// order is load-bearing for §8's testable properties, not incidental.
pub fn evaluate(auction: &Auction, player: &AuctionPlayer, team: &AuctionTeam, attempt: &BidAttempt) -> BidOutcome {
    use BidRejectionReason::*;

    if auction.status != AuctionStatus::Live {
        return BidOutcome::Rejected(AuctionNotLive);
    }
    if auction.current_player_id != Some(player.id) {
        return BidOutcome::Rejected(NoPlayerLive);
    }
    if !team.is_active || team.auction_id != auction.id {
        return BidOutcome::Rejected(TeamInactiveOrForeign);
    }
    if auction.current_bidder_team_id == Some(attempt.team_id) {
        return BidOutcome::Rejected(AlreadyHighestBidder);
    }
    if team.squad_size() >= auction.config.max_squad_size {
        return BidOutcome::Rejected(SquadFull);
    }

    let expected = auction.config.expected_next_bid(auction.current_bid_amount);
    if attempt.attempted_amount != expected {
        return BidOutcome::Rejected(BidNotNextIncrement);
    }

    let remaining_slots_after_this = auction
        .config
        .min_squad_size
        .saturating_sub(team.squad_size() + 1);
    let reserve_needed = auction.config.base_price * i64::from(remaining_slots_after_this);
    if team.purse_remaining - attempt.attempted_amount < reserve_needed {
        return BidOutcome::Rejected(InsufficientPurseForMinSquad);
    }

    if attempt.attempted_amount > team.purse_remaining {
        return BidOutcome::Rejected(InsufficientPurse);
    }

    BidOutcome::Accepted(AcceptedBid {
        bidder_team_id: attempt.team_id,
        amount: attempt.attempted_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuctionConfig, AuctionPlayer, AuctionTeam, BidIncrementTier, PlayerOrderPolicy, RequeuePolicy};

    fn config() -> AuctionConfig {
        AuctionConfig {
            base_price: 100,
            purse_value: 1000,
            bid_increment_tiers: vec![BidIncrementTier { threshold: 0, increment: 50 }],
            timer_duration_secs: 10,
            bid_reset_timer_secs: 5,
            going_once_timer_secs: 3,
            going_twice_timer_secs: 3,
            min_squad_size: 2,
            max_squad_size: 5,
            retention_enabled: false,
            max_retentions: 0,
            retention_cost: 0,
            trade_window_hours: 24,
            max_trades_per_team: 3,
            trade_settlement_enabled: true,
            max_undo_actions: 5,
            player_order_policy: PlayerOrderPolicy::Sequential,
            requeue_policy: RequeuePolicy::Head,
        }
    }

    fn live_auction_with_player(player: &AuctionPlayer) -> Auction {
        let mut auction = Auction::new("s1", config());
        auction.status = AuctionStatus::Live;
        auction.current_player_id = Some(player.id);
        auction
    }

    #[test]
    fn first_bid_must_equal_base_price() {
        let player = AuctionPlayer::new(crate::ids::AuctionId::new(), 1, "P", "BAT");
        let auction = live_auction_with_player(&player);
        let team = AuctionTeam::new(auction.id, "A", "A", 1000);

        let attempt = BidAttempt { team_id: team.id, attempted_amount: 100 };
        match evaluate(&auction, &player, &team, &attempt) {
            BidOutcome::Accepted(accepted) => assert_eq!(accepted.amount, 100),
            BidOutcome::Rejected(reason) => panic!("unexpected rejection: {reason}"),
        }
    }

    #[test]
    fn wrong_increment_is_rejected() {
        let player = AuctionPlayer::new(crate::ids::AuctionId::new(), 1, "P", "BAT");
        let auction = live_auction_with_player(&player);
        let team = AuctionTeam::new(auction.id, "A", "A", 1000);

        let attempt = BidAttempt { team_id: team.id, attempted_amount: 120 };
        assert!(matches!(
            evaluate(&auction, &player, &team, &attempt),
            BidOutcome::Rejected(BidRejectionReason::BidNotNextIncrement)
        ));
    }

    #[test]
    fn already_highest_bidder_is_rejected() {
        let player = AuctionPlayer::new(crate::ids::AuctionId::new(), 1, "P", "BAT");
        let mut auction = live_auction_with_player(&player);
        let team = AuctionTeam::new(auction.id, "A", "A", 1000);
        auction.current_bid_amount = Some(100);
        auction.current_bidder_team_id = Some(team.id);

        let attempt = BidAttempt { team_id: team.id, attempted_amount: 150 };
        assert!(matches!(
            evaluate(&auction, &player, &team, &attempt),
            BidOutcome::Rejected(BidRejectionReason::AlreadyHighestBidder)
        ));
    }

    #[test]
    fn insufficient_purse_for_min_squad_blocks_bid_that_would_exhaust_reserve() {
        let player = AuctionPlayer::new(crate::ids::AuctionId::new(), 1, "P", "BAT");
        let auction = live_auction_with_player(&player);
        let mut team = AuctionTeam::new(auction.id, "A", "A", 500);
        team.purse_remaining = 500;

        // min_squad_size=2, team has 0 players: after this bid, 1 more required slot at
        // base_price=100 must still be affordable.
        let attempt = BidAttempt { team_id: team.id, attempted_amount: 450 };
        assert!(matches!(
            evaluate(&auction, &player, &team, &attempt),
            BidOutcome::Rejected(BidRejectionReason::InsufficientPurseForMinSquad)
        ));
    }
}
