//! Domain layer - Market and allocation core.
//!
//! Pure, synchronous logic for the airline market: demand model, fix-seat
//! auction, pooling market, ledgers and the session value they act on.
//! No I/O here (hexagonal architecture inner ring); randomness comes in
//! through [`rng::MarketRng`].

pub mod apportion;
pub mod auction;
pub mod demand;
pub mod error;
pub mod ledger;
pub mod legacy;
pub mod params;
pub mod pooling;
pub mod rng;
pub mod session;
pub mod team;

// Re-export core types for convenience
pub use auction::{AllocationLine, AllocationSummary, AuctionOutcome, AuctionRules, FixSeatBid};
pub use demand::{compute_market_shares, DemandModel};
pub use error::{ConfigError, SimError};
pub use ledger::{RoundResult, TickLedger};
pub use params::{ParamsPatch, ReservePolicy, SessionParams, VersionedParams};
pub use pooling::{PoolingMarket, PriceDynamics, PricePoint};
pub use rng::{entropy_rng, seeded_rng, MarketRng};
pub use session::{Phase, Session, SessionSnapshot};
pub use team::{DecisionsPatch, FixSeatAward, Team, TeamDecisions, TeamId, TeamTotals};
