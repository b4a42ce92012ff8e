//! Fix-seat auction: sealed bids for a hard cap of fixed-price seats.
//!
//! Discriminatory pricing: every allocated team pays its own bid. Bids are
//! served in descending price tiers; the first tier that does not fit the
//! remaining capacity is pro-rated by largest remainder, and every lower
//! tier gets nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::apportion::largest_remainder;
use super::team::TeamId;

/// One sealed bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSeatBid {
    pub team_id: TeamId,
    pub requested: u32,
    pub bid_price: f64,
}

/// Auction constraints for one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuctionRules {
    /// Seats available to the auction.
    pub capacity_cap: u32,
    /// Bids strictly below this are disqualified.
    pub min_bid: f64,
    /// Spend cap per team, applied in round 0 only.
    pub budget_cap: Option<f64>,
}

/// Per-team auction outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub team_id: TeamId,
    pub requested_original: u32,
    /// Request after the round-0 budget cap.
    pub requested_effective: u32,
    pub bid_price: f64,
    pub allocated: u32,
    pub clearing_price: Option<f64>,
    pub disqualified_for_low_bid: bool,
}

/// Auction result, one line per bid in team-id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub capacity_cap: u32,
    pub lines: Vec<AllocationLine>,
}

impl AuctionOutcome {
    /// Sum of original requests, saturating at `u32::MAX`.
    pub fn total_requested(&self) -> u32 {
        saturating_total(self.lines.iter().map(|l| l.requested_original))
    }

    pub fn total_allocated(&self) -> u32 {
        saturating_total(self.lines.iter().map(|l| l.allocated))
    }

    /// Lowest bid that still received seats.
    pub fn min_qualifying_bid(&self) -> Option<f64> {
        self.lines
            .iter()
            .filter(|l| l.allocated > 0)
            .map(|l| l.bid_price)
            .min_by(f64::total_cmp)
    }

    pub fn line(&self, team_id: &str) -> Option<&AllocationLine> {
        self.lines.iter().find(|l| l.team_id == team_id)
    }
}

/// Market-wide view of an auction, published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub round: u32,
    pub capacity_cap: u32,
    pub reserve_ratio: f64,
    pub total_requested: u32,
    pub total_allocated: u32,
    /// Seats left for the pooling market: `total seats − Σ allocated`.
    pub pooling_reserve_capacity: u32,
    pub min_qualifying_bid: Option<f64>,
    pub allocations: Vec<AllocationLine>,
}

impl AllocationSummary {
    pub fn from_outcome(
        round: u32,
        outcome: AuctionOutcome,
        reserve_ratio: f64,
        total_seats: u32,
    ) -> Self {
        let total_allocated = outcome.total_allocated();
        Self {
            round,
            capacity_cap: outcome.capacity_cap,
            reserve_ratio,
            total_requested: outcome.total_requested(),
            total_allocated,
            pooling_reserve_capacity: total_seats.saturating_sub(total_allocated),
            min_qualifying_bid: outcome.min_qualifying_bid(),
            allocations: outcome.lines,
        }
    }
}

fn saturating_total(values: impl Iterator<Item = u32>) -> u32 {
    let total: u64 = values.map(u64::from).sum();
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// `floor(budget / bid)`; a non-positive bid buys nothing.
pub fn budget_capped_quantity(requested: u32, bid_price: f64, budget: f64) -> u32 {
    if bid_price <= 0.0 || !bid_price.is_finite() {
        return 0;
    }
    let affordable = (budget / bid_price).floor();
    if affordable >= f64::from(requested) {
        requested
    } else {
        affordable.max(0.0) as u32
    }
}

/// `floor(total_seats × (1 − reserve_ratio))`.
pub fn capacity_cap(total_seats: u32, reserve_ratio: f64) -> u32 {
    (f64::from(total_seats) * (1.0 - reserve_ratio)).floor().max(0.0) as u32
}

/// Run the auction.
pub fn allocate(bids: &[FixSeatBid], rules: &AuctionRules) -> AuctionOutcome {
    let mut lines: Vec<AllocationLine> = bids
        .iter()
        .map(|b| {
            let requested_effective = rules
                .budget_cap
                .map_or(b.requested, |budget| {
                    budget_capped_quantity(b.requested, b.bid_price, budget)
                });
            AllocationLine {
                team_id: b.team_id.clone(),
                requested_original: b.requested,
                requested_effective,
                bid_price: b.bid_price,
                allocated: 0,
                clearing_price: None,
                disqualified_for_low_bid: b.bid_price < rules.min_bid,
            }
        })
        .collect();
    lines.sort_by(|a, b| a.team_id.cmp(&b.team_id));

    for line in lines.iter().filter(|l| l.disqualified_for_low_bid) {
        debug!(
            team = %line.team_id,
            bid = line.bid_price,
            min_bid = rules.min_bid,
            "Fix-seat bid below minimum, disqualified"
        );
    }

    // Qualified bidders, highest price first, team id within a tier.
    let mut order: Vec<usize> = (0..lines.len())
        .filter(|&i| !lines[i].disqualified_for_low_bid && lines[i].requested_effective > 0)
        .collect();
    order.sort_by(|&a, &b| {
        lines[b]
            .bid_price
            .total_cmp(&lines[a].bid_price)
            .then_with(|| lines[a].team_id.cmp(&lines[b].team_id))
    });

    let mut remaining = rules.capacity_cap;
    let mut start = 0;
    while start < order.len() && remaining > 0 {
        let price = lines[order[start]].bid_price;
        let end = order[start..]
            .iter()
            .position(|&i| lines[i].bid_price.total_cmp(&price).is_ne())
            .map_or(order.len(), |offset| start + offset);
        let tier = &order[start..end];

        let tier_requested: u64 = tier
            .iter()
            .map(|&i| u64::from(lines[i].requested_effective))
            .sum();
        if tier_requested <= u64::from(remaining) {
            for &i in tier {
                lines[i].allocated = lines[i].requested_effective;
                remaining -= lines[i].requested_effective;
            }
        } else {
            let claims: Vec<(&str, f64)> = tier
                .iter()
                .map(|&i| (lines[i].team_id.as_str(), f64::from(lines[i].requested_effective)))
                .collect();
            let grants = largest_remainder(remaining, &claims);
            for (&i, grant) in tier.iter().zip(grants) {
                lines[i].allocated = grant.min(lines[i].requested_effective);
            }
            debug!(
                price,
                tier_requested,
                capacity = remaining,
                "Fix-seat tier pro-rated"
            );
            remaining = 0;
        }
        start = end;
    }

    for line in &mut lines {
        if line.allocated > 0 {
            line.clearing_price = Some(line.bid_price);
        }
    }

    AuctionOutcome {
        capacity_cap: rules.capacity_cap,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(id: &str, requested: u32, price: f64) -> FixSeatBid {
        FixSeatBid {
            team_id: id.to_string(),
            requested,
            bid_price: price,
        }
    }

    fn rules(cap: u32) -> AuctionRules {
        AuctionRules {
            capacity_cap: cap,
            min_bid: 50.0,
            budget_cap: None,
        }
    }

    #[test]
    fn test_equal_bids_split_evenly() {
        let out = allocate(&[bid("a", 100, 50.0), bid("b", 100, 50.0)], &rules(100));
        assert_eq!(out.line("a").unwrap().allocated, 50);
        assert_eq!(out.line("b").unwrap().allocated, 50);
        assert_eq!(out.line("a").unwrap().clearing_price, Some(50.0));
    }

    #[test]
    fn test_higher_tier_served_first() {
        let out = allocate(&[bid("low", 80, 55.0), bid("high", 80, 70.0)], &rules(100));
        assert_eq!(out.line("high").unwrap().allocated, 80);
        assert_eq!(out.line("low").unwrap().allocated, 20);
        assert_eq!(out.line("low").unwrap().clearing_price, Some(55.0));
        assert_eq!(out.line("high").unwrap().clearing_price, Some(70.0));
    }

    #[test]
    fn test_low_bid_disqualified() {
        let out = allocate(&[bid("cheap", 50, 40.0), bid("ok", 50, 60.0)], &rules(500));
        let cheap = out.line("cheap").unwrap();
        assert!(cheap.disqualified_for_low_bid);
        assert_eq!(cheap.allocated, 0);
        assert_eq!(cheap.clearing_price, None);
        assert_eq!(out.line("ok").unwrap().allocated, 50);
        assert_eq!(out.min_qualifying_bid(), Some(60.0));
    }

    #[test]
    fn test_bid_equal_to_minimum_qualifies() {
        let out = allocate(&[bid("edge", 10, 50.0)], &rules(100));
        assert!(!out.line("edge").unwrap().disqualified_for_low_bid);
        assert_eq!(out.line("edge").unwrap().allocated, 10);
    }

    #[test]
    fn test_leftover_seat_tie_break_by_team_id() {
        // 3 x 10 requested, 10 seats: quotas 3.33 each, leftover to "a".
        let out = allocate(
            &[bid("c", 10, 60.0), bid("b", 10, 60.0), bid("a", 10, 60.0)],
            &rules(10),
        );
        assert_eq!(out.line("a").unwrap().allocated, 4);
        assert_eq!(out.line("b").unwrap().allocated, 3);
        assert_eq!(out.line("c").unwrap().allocated, 3);
        assert_eq!(out.total_allocated(), 10);
    }

    #[test]
    fn test_budget_cap_round_zero() {
        let r = AuctionRules {
            budget_cap: Some(1000.0),
            ..rules(500)
        };
        let out = allocate(&[bid("a", 100, 60.0)], &r);
        let a = out.line("a").unwrap();
        assert_eq!(a.requested_original, 100);
        assert_eq!(a.requested_effective, 16);
        assert_eq!(a.allocated, 16);
    }

    #[test]
    fn test_zero_bid_under_budget_cap_gets_nothing() {
        assert_eq!(budget_capped_quantity(100, 0.0, 5000.0), 0);
        assert_eq!(budget_capped_quantity(100, -3.0, 5000.0), 0);
        assert_eq!(budget_capped_quantity(100, 10.0, 5000.0), 100);
    }

    #[test]
    fn test_huge_requests_do_not_overflow() {
        let out = allocate(
            &[bid("a", 3_000_000_000, 60.0), bid("b", 3_000_000_000, 60.0)],
            &rules(700),
        );
        assert_eq!(out.total_requested(), u32::MAX);
        assert_eq!(out.total_allocated(), 700);
        assert_eq!(out.line("a").unwrap().allocated, 350);
        assert_eq!(out.line("b").unwrap().allocated, 350);

        let summary = AllocationSummary::from_outcome(0, out, 0.3, 1000);
        assert_eq!(summary.pooling_reserve_capacity, 300);
    }

    #[test]
    fn test_capacity_cap() {
        assert_eq!(capacity_cap(1000, 0.3), 700);
        assert_eq!(capacity_cap(999, 0.25), 749);
    }

    #[test]
    fn test_lower_tier_starved_when_cap_exhausted() {
        let out = allocate(
            &[bid("a", 60, 80.0), bid("b", 60, 80.0), bid("c", 60, 65.0)],
            &rules(100),
        );
        assert_eq!(out.line("a").unwrap().allocated, 50);
        assert_eq!(out.line("b").unwrap().allocated, 50);
        let c = out.line("c").unwrap();
        assert_eq!(c.allocated, 0);
        assert_eq!(c.clearing_price, None);
        assert!(!c.disqualified_for_low_bid);
    }
}
