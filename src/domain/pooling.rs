//! Pooling (secondary) market state and price dynamics.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::params::SessionParams;
use super::rng::MarketRng;

/// Observations kept in the price history.
pub const HISTORY_LIMIT: usize = 30;

const MAX_ADJUSTMENT: f64 = 20.0;
const ADJUSTMENT_WEIGHT: f64 = 0.35;
const SHORTAGE_RATIO: f64 = 0.9;
const SURPLUS_RATIO: f64 = 1.1;
const MEAN_REVERSION_RATE: f64 = 0.02;
const TARGET_MARKUP: f64 = 1.2;
const NOISE_AMPLITUDE: f64 = 1.0;

/// One price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub tick: u32,
    /// Simulated day of the round at which the price was set.
    pub day: u32,
    pub price: f64,
    /// Tick demand that produced this price.
    pub demand: u32,
}

/// Market-wide pool of flexible capacity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolingMarket {
    pub price: f64,
    /// Capacity reserved for pooling at round open.
    pub total_capacity: u32,
    /// Capacity not yet drawn.
    pub available_capacity: u32,
    /// Pool still claimable by solvent teams.
    pub offered_capacity: u32,
    pub history: VecDeque<PricePoint>,
}

impl PoolingMarket {
    /// Fresh market for a round; the opening price is the first observation.
    pub fn open(capacity: u32, offered: u32, start_price: f64) -> Self {
        let mut market = Self {
            price: start_price,
            total_capacity: capacity,
            available_capacity: capacity,
            offered_capacity: offered.min(capacity),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        };
        market.record(PricePoint {
            tick: 0,
            day: 0,
            price: start_price,
            demand: 0,
        });
        market
    }

    /// Set the current price and append it, dropping the oldest entry
    /// beyond [`HISTORY_LIMIT`].
    pub fn record(&mut self, point: PricePoint) {
        self.price = point.price;
        self.history.push_back(point);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Mean of the recorded prices, or the current price with no history.
    pub fn average_price(&self) -> f64 {
        if self.history.is_empty() {
            return self.price;
        }
        self.history.iter().map(|p| p.price).sum::<f64>() / self.history.len() as f64
    }

    /// Take up to `quantity` seats from the pool; returns what was taken.
    pub fn draw(&mut self, quantity: u32) -> u32 {
        let taken = quantity.min(self.available_capacity);
        self.available_capacity -= taken;
        taken
    }
}

/// Supply/demand driven price rule with mean reversion and noise.
#[derive(Debug, Clone, Copy)]
pub struct PriceDynamics {
    pooling_cost: f64,
    min: f64,
    max: f64,
}

impl PriceDynamics {
    pub fn from_params(params: &SessionParams) -> Self {
        Self {
            pooling_cost: params.pooling_cost,
            min: params.pool_price_min,
            max: params.pool_price_max,
        }
    }

    /// Raw adjustment in `[-20, 20]` from the supply/demand ratio.
    ///
    /// Below 0.9 the price rises by `20 × min(1, 1 − ratio)`; above 1.1 it
    /// falls by `20 × min(1, ratio − 1)`; in between it holds.
    pub fn adjustment(supply: u32, pooling_demand: u32) -> f64 {
        let ratio = f64::from(supply) / f64::from(pooling_demand.max(1));
        if ratio < SHORTAGE_RATIO {
            MAX_ADJUSTMENT * (1.0 - ratio).min(1.0)
        } else if ratio > SURPLUS_RATIO {
            -MAX_ADJUSTMENT * (ratio - 1.0).min(1.0)
        } else {
            0.0
        }
    }

    /// Next integer price inside the band. Draws one noise sample.
    pub fn next_price(
        &self,
        current: f64,
        supply: u32,
        pooling_demand: u32,
        rng: &mut dyn MarketRng,
    ) -> f64 {
        let pressure = ADJUSTMENT_WEIGHT * Self::adjustment(supply, pooling_demand);
        let reversion = MEAN_REVERSION_RATE * (TARGET_MARKUP * self.pooling_cost - current);
        let noise = rng.uniform(-NOISE_AMPLITUDE, NOISE_AMPLITUDE);
        (current + pressure + reversion + noise)
            .clamp(self.min, self.max)
            .round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rng::seeded_rng;

    #[test]
    fn test_history_is_bounded() {
        let mut market = PoolingMarket::open(300, 300, 150.0);
        for tick in 1..=45 {
            market.record(PricePoint {
                tick,
                day: tick,
                price: 150.0 + f64::from(tick),
                demand: 10,
            });
        }
        assert_eq!(market.history.len(), HISTORY_LIMIT);
        assert_eq!(market.history.front().unwrap().tick, 16);
        assert_eq!(market.price, 195.0);
    }

    #[test]
    fn test_draw_never_exceeds_available() {
        let mut market = PoolingMarket::open(10, 10, 150.0);
        assert_eq!(market.draw(4), 4);
        assert_eq!(market.draw(20), 6);
        assert_eq!(market.draw(1), 0);
        assert_eq!(market.available_capacity, 0);
    }

    #[test]
    fn test_adjustment_direction() {
        assert!(PriceDynamics::adjustment(10, 100) > 0.0);
        assert!(PriceDynamics::adjustment(300, 100) < 0.0);
        assert_eq!(PriceDynamics::adjustment(100, 100), 0.0);
        assert_eq!(PriceDynamics::adjustment(0, 100), MAX_ADJUSTMENT);
        assert_eq!(PriceDynamics::adjustment(1000, 0), -MAX_ADJUSTMENT);
    }

    #[test]
    fn test_price_stays_in_band() {
        let dynamics = PriceDynamics::from_params(&SessionParams::default());
        let mut rng = seeded_rng(21);
        let mut price = 150.0;
        for i in 0..500 {
            let (supply, demand) = if i % 2 == 0 { (0, 5000) } else { (5000, 0) };
            price = dynamics.next_price(price, supply, demand, &mut rng);
            assert!((80.0..=300.0).contains(&price), "price {price}");
            assert_eq!(price, price.round());
        }
    }

    #[test]
    fn test_sustained_shortage_hits_ceiling() {
        let dynamics = PriceDynamics::from_params(&SessionParams {
            pooling_cost: 250.0,
            ..SessionParams::default()
        });
        let mut rng = seeded_rng(8);
        let mut price = 150.0;
        for _ in 0..200 {
            price = dynamics.next_price(price, 0, 1000, &mut rng);
        }
        assert_eq!(price, 300.0);
    }

    #[test]
    fn test_average_price() {
        let mut market = PoolingMarket::open(100, 100, 100.0);
        market.record(PricePoint {
            tick: 1,
            day: 1,
            price: 200.0,
            demand: 0,
        });
        assert!((market.average_price() - 150.0).abs() < 1e-12);
    }
}
