//! Teams (airlines) and their round decisions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::SimError;
use super::params::SessionParams;

/// Team identifier, unique within a session.
pub type TeamId = String;

/// What a team submits during pre-purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDecisions {
    /// Retail ticket price.
    pub retail_price: f64,
    /// Fix seats the team asks for in the auction.
    pub fix_seats_requested: u32,
    /// Unit bid for fix seats; `None` bids the session's `fix_seat_price`.
    pub fix_seat_bid_price: Option<f64>,
    /// Percentage (0-100) of the aircraft backed by pooled inventory.
    pub pooling_allocation_pct: f64,
}

impl Default for TeamDecisions {
    fn default() -> Self {
        Self {
            retail_price: 199.0,
            fix_seats_requested: 0,
            fix_seat_bid_price: None,
            pooling_allocation_pct: 0.0,
        }
    }
}

impl TeamDecisions {
    /// Effective unit bid.
    pub fn bid_price(&self, params: &SessionParams) -> f64 {
        self.fix_seat_bid_price.unwrap_or(params.fix_seat_price)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// [`SimError::InvalidDecision`] naming the offending field.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.retail_price.is_finite() || self.retail_price <= 0.0 {
            return Err(SimError::InvalidDecision {
                field: "retail_price",
                reason: format!("must be positive, got {}", self.retail_price),
            });
        }
        if let Some(bid) = self.fix_seat_bid_price {
            if !bid.is_finite() || bid < 0.0 {
                return Err(SimError::InvalidDecision {
                    field: "fix_seat_bid_price",
                    reason: format!("must be non-negative, got {bid}"),
                });
            }
        }
        if !(0.0..=100.0).contains(&self.pooling_allocation_pct) {
            return Err(SimError::InvalidDecision {
                field: "pooling_allocation_pct",
                reason: format!("must be in [0, 100], got {}", self.pooling_allocation_pct),
            });
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus a request no larger than the aircraft.
    ///
    /// # Errors
    /// [`SimError::InvalidDecision`] naming the offending field.
    pub fn validate_for(&self, params: &SessionParams) -> Result<(), SimError> {
        self.validate()?;
        if self.fix_seats_requested > params.total_aircraft_seats {
            return Err(SimError::InvalidDecision {
                field: "fix_seats_requested",
                reason: format!(
                    "must not exceed {} aircraft seats, got {}",
                    params.total_aircraft_seats, self.fix_seats_requested
                ),
            });
        }
        Ok(())
    }
}

/// Partial update of a team's decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionsPatch {
    pub retail_price: Option<f64>,
    pub fix_seats_requested: Option<u32>,
    pub fix_seat_bid_price: Option<f64>,
    pub pooling_allocation_pct: Option<f64>,
}

impl DecisionsPatch {
    /// Merge into a copy of `current`.
    pub fn applied_to(&self, current: &TeamDecisions) -> TeamDecisions {
        TeamDecisions {
            retail_price: self.retail_price.unwrap_or(current.retail_price),
            fix_seats_requested: self
                .fix_seats_requested
                .unwrap_or(current.fix_seats_requested),
            fix_seat_bid_price: self.fix_seat_bid_price.or(current.fix_seat_bid_price),
            pooling_allocation_pct: self
                .pooling_allocation_pct
                .unwrap_or(current.pooling_allocation_pct),
        }
    }
}

/// Outcome of the fix-seat auction written back onto a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSeatAward {
    pub requested_original: u32,
    pub allocated: u32,
    /// Unit price paid; `None` when nothing was allocated.
    pub clearing_price: Option<f64>,
    pub disqualified_for_low_bid: bool,
}

/// Running totals across rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamTotals {
    pub profit: Decimal,
    pub revenue: Decimal,
    pub rounds_played: u32,
}

/// One competing airline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub decisions: TeamDecisions,
    /// Set by the auction, cleared when the round is finalized.
    pub award: Option<FixSeatAward>,
    pub totals: TeamTotals,
}

impl Team {
    pub fn new(id: impl Into<TeamId>, name: impl Into<String>, decisions: TeamDecisions) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            decisions,
            award: None,
            totals: TeamTotals::default(),
        }
    }

    /// Fix seats held: the award once the auction ran, the request before.
    pub fn fix_seats(&self) -> u32 {
        self.award
            .as_ref()
            .map_or(self.decisions.fix_seats_requested, |a| a.allocated)
    }

    /// Allocated fix seats (zero before the auction).
    pub fn fix_seats_allocated(&self) -> u32 {
        self.award.as_ref().map_or(0, |a| a.allocated)
    }

    /// Unit price paid for fix seats.
    pub fn clearing_price(&self) -> Option<f64> {
        self.award.as_ref().and_then(|a| a.clearing_price)
    }

    /// Pooled seats the team declared, `floor(pct / 100 × seats)`.
    pub fn pool_entitlement(&self, total_seats: u32) -> u32 {
        (self.decisions.pooling_allocation_pct / 100.0 * f64::from(total_seats)).floor() as u32
    }

    /// Capacity used by the demand model: fix seats plus declared pool.
    pub fn capacity(&self, total_seats: u32) -> u32 {
        self.fix_seats()
            .saturating_add(self.pool_entitlement(total_seats))
    }
}
