//! Per-team tick ledger and the finalized round result.
//!
//! A [`TickLedger`] lives for one round only. It is opened by the auction,
//! mutated by every tick and consumed by the round aggregator.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::team::TeamId;

/// Convert an `f64` amount to money, rounded to cents.
pub fn money(amount: f64) -> Decimal {
    Decimal::from_f64(amount)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

/// Running state of one team inside a round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickLedger {
    pub fix_allocated: u32,
    pub fix_remaining: u32,
    /// Pooled seats the team may still draw.
    pub pool_remaining: u32,
    pub pool_entitlement: u32,
    pub sold: u32,
    pub pool_used: u32,
    /// Cumulative demand routed to the team.
    pub demand: u32,
    pub revenue: Decimal,
    /// Includes the fix-seat cost booked when the ledger is opened.
    pub cost: Decimal,
    pub insolvent: bool,
    pub insolvent_at_tick: Option<u32>,
}

impl TickLedger {
    /// Open a ledger after the auction and book the fix-seat cost upfront.
    pub fn open(fix_allocated: u32, clearing_price: Option<f64>, pool_entitlement: u32) -> Self {
        let unit = clearing_price.unwrap_or(0.0);
        Self {
            fix_allocated,
            fix_remaining: fix_allocated,
            pool_remaining: pool_entitlement,
            pool_entitlement,
            cost: money(f64::from(fix_allocated) * unit),
            ..Self::default()
        }
    }

    /// Seats the team could offer this round.
    pub fn capacity(&self) -> u32 {
        self.fix_allocated.saturating_add(self.pool_entitlement)
    }

    pub fn profit(&self) -> Decimal {
        self.revenue - self.cost
    }

    /// Record incoming demand and serve what fix inventory covers.
    ///
    /// Returns the part of `demand` left for the pool.
    pub fn serve_fixed(&mut self, demand: u32) -> u32 {
        self.demand = self.demand.saturating_add(demand);
        let served = demand.min(self.fix_remaining);
        self.fix_remaining -= served;
        self.sold = self.sold.saturating_add(served);
        demand - served
    }

    /// Seats drawn from the shared pool at `unit_cost` each.
    pub fn serve_pooled(&mut self, seats: u32, unit_cost: f64) {
        let seats = seats.min(self.pool_remaining);
        self.pool_remaining -= seats;
        self.pool_used += seats;
        self.sold = self.sold.saturating_add(seats);
        self.cost += money(f64::from(seats) * unit_cost);
    }

    /// Book revenue for `seats` sold at `price`.
    pub fn book_sale(&mut self, seats: u32, price: f64) {
        self.revenue += money(f64::from(seats) * price);
    }

    /// `profit < 0 && |profit| > budget`.
    pub fn exceeds_budget(&self, budget: f64) -> bool {
        let profit = self.profit();
        profit.is_sign_negative() && -profit > money(budget)
    }

    /// Flag the team insolvent. Returns `false` if it already was.
    pub fn mark_insolvent(&mut self, tick: u32) -> bool {
        if self.insolvent {
            return false;
        }
        self.insolvent = true;
        self.insolvent_at_tick = Some(tick);
        true
    }
}

/// Finalized outcome of one team for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub team_id: TeamId,
    pub round_number: u32,
    pub sold: u32,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub unsold: u32,
    /// `sold / Σ sold` across the round's teams.
    pub market_share: f64,
    pub demand: u32,
    pub avg_price: f64,
    pub capacity: u32,
    pub insolvent: bool,
}

impl RoundResult {
    /// Result from a ledger; `market_share` is filled in by
    /// [`assign_market_shares`].
    pub fn from_ledger(
        team_id: &str,
        round_number: u32,
        ledger: &TickLedger,
        retail_price: f64,
        insolvent: bool,
    ) -> Self {
        Self {
            team_id: team_id.to_string(),
            round_number,
            sold: ledger.sold,
            revenue: ledger.revenue,
            cost: ledger.cost,
            profit: ledger.profit(),
            unsold: ledger.demand.saturating_sub(ledger.sold),
            market_share: 0.0,
            demand: ledger.demand,
            avg_price: average_price(ledger.revenue, ledger.sold, retail_price),
            capacity: ledger.capacity(),
            insolvent,
        }
    }
}

/// Realized revenue per seat, or `fallback` when nothing sold.
pub fn average_price(revenue: Decimal, sold: u32, fallback: f64) -> f64 {
    if sold == 0 {
        return fallback;
    }
    (revenue / Decimal::from(sold)).to_f64().unwrap_or(fallback)
}

/// Set each result's share of total seats sold.
pub fn assign_market_shares(results: &mut [RoundResult]) {
    let total: u64 = results.iter().map(|r| u64::from(r.sold)).sum();
    for r in results.iter_mut() {
        r.market_share = if total == 0 {
            0.0
        } else {
            f64::from(r.sold) / total as f64
        };
    }
}
