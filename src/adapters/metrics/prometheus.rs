//! Prometheus Metrics Registry - Market Observability
//!
//! Registers and exposes Prometheus metrics for the market simulation:
//! auction volume, tick throughput, pool price and capacity, insolvencies
//! and per-team cumulative profit. Implements the `MarketObserver` port
//! so the scheduler can feed it directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::auction::AllocationSummary;
use crate::domain::ledger::RoundResult;
use crate::domain::pooling::PoolingMarket;
use crate::ports::observer::MarketObserver;
use crate::usecases::tick_engine::TickReport;

/// Centralized Prometheus metrics for the market simulation.
///
/// All metrics follow the naming convention `airline_market_*` and carry
/// a `session` label.
pub struct MetricsRegistry {
    registry: Registry,
    /// Fix-seat auctions run.
    pub auctions: IntCounterVec,
    /// Fix seats allocated across all auctions.
    pub fix_seats_allocated: IntCounterVec,
    /// Ticks advanced.
    pub ticks: IntCounterVec,
    /// Seats sold per tick.
    pub tick_served: HistogramVec,
    /// Teams flagged insolvent.
    pub insolvencies: IntCounterVec,
    /// Rounds finalized.
    pub rounds_finalized: IntCounterVec,
    /// Current pool price.
    pub pool_price: GaugeVec,
    /// Pool capacity not yet drawn.
    pub pool_available: GaugeVec,
    /// Cumulative profit per team across finalized rounds.
    pub team_profit: GaugeVec,
    /// Running profit totals backing `team_profit`.
    profit_totals: Mutex<HashMap<(String, String), Decimal>>,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let auctions = IntCounterVec::new(
            Opts::new("airline_market_auctions_total", "Fix-seat auctions run"),
            &["session"],
        )?;

        let fix_seats_allocated = IntCounterVec::new(
            Opts::new(
                "airline_market_fix_seats_allocated_total",
                "Fix seats allocated by auctions",
            ),
            &["session"],
        )?;

        let ticks = IntCounterVec::new(
            Opts::new("airline_market_ticks_total", "Simulation ticks advanced"),
            &["session"],
        )?;

        let tick_served = HistogramVec::new(
            HistogramOpts::new("airline_market_tick_served_seats", "Seats sold per tick")
                .buckets(vec![0.0, 10.0, 25.0, 50.0, 100.0, 200.0, 500.0]),
            &["session"],
        )?;

        let insolvencies = IntCounterVec::new(
            Opts::new(
                "airline_market_insolvencies_total",
                "Teams flagged insolvent during a round",
            ),
            &["session"],
        )?;

        let rounds_finalized = IntCounterVec::new(
            Opts::new("airline_market_rounds_finalized_total", "Rounds finalized"),
            &["session"],
        )?;

        let pool_price = GaugeVec::new(
            Opts::new("airline_market_pool_price", "Current pooling market price"),
            &["session"],
        )?;

        let pool_available = GaugeVec::new(
            Opts::new(
                "airline_market_pool_available_seats",
                "Pooling capacity not yet drawn",
            ),
            &["session"],
        )?;

        let team_profit = GaugeVec::new(
            Opts::new(
                "airline_market_team_profit",
                "Cumulative team profit across finalized rounds",
            ),
            &["session", "team"],
        )?;

        // Register all metrics
        registry.register(Box::new(auctions.clone()))?;
        registry.register(Box::new(fix_seats_allocated.clone()))?;
        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(tick_served.clone()))?;
        registry.register(Box::new(insolvencies.clone()))?;
        registry.register(Box::new(rounds_finalized.clone()))?;
        registry.register(Box::new(pool_price.clone()))?;
        registry.register(Box::new(pool_available.clone()))?;
        registry.register(Box::new(team_profit.clone()))?;

        Ok(Self {
            registry,
            auctions,
            fix_seats_allocated,
            ticks,
            tick_served,
            insolvencies,
            rounds_finalized,
            pool_price,
            pool_available,
            team_profit,
            profit_totals: Mutex::new(HashMap::new()),
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move { metrics.render() }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl MarketObserver for MetricsRegistry {
    fn on_auction(&self, session_id: &str, summary: &AllocationSummary) {
        self.auctions.with_label_values(&[session_id]).inc();
        self.fix_seats_allocated
            .with_label_values(&[session_id])
            .inc_by(u64::from(summary.total_allocated));
        self.pool_available
            .with_label_values(&[session_id])
            .set(f64::from(summary.pooling_reserve_capacity));
    }

    fn on_tick(&self, session_id: &str, report: &TickReport, market: &PoolingMarket) {
        self.ticks.with_label_values(&[session_id]).inc();
        self.tick_served
            .with_label_values(&[session_id])
            .observe(f64::from(report.served));
        self.insolvencies
            .with_label_values(&[session_id])
            .inc_by(report.newly_insolvent.len() as u64);
        self.pool_price
            .with_label_values(&[session_id])
            .set(market.price);
        self.pool_available
            .with_label_values(&[session_id])
            .set(f64::from(market.available_capacity));
    }

    fn on_round(&self, session_id: &str, results: &[RoundResult]) {
        self.rounds_finalized.with_label_values(&[session_id]).inc();
        let Ok(mut totals) = self.profit_totals.lock() else {
            return;
        };
        for r in results {
            let total = totals
                .entry((session_id.to_string(), r.team_id.clone()))
                .or_default();
            *total += r.profit;
            self.team_profit
                .with_label_values(&[session_id, r.team_id.as_str()])
                .set(total.to_f64().unwrap_or(0.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn result(team: &str, profit: Decimal) -> RoundResult {
        RoundResult {
            team_id: team.to_string(),
            round_number: 0,
            sold: 10,
            revenue: profit,
            cost: Decimal::ZERO,
            profit,
            unsold: 0,
            market_share: 1.0,
            demand: 10,
            avg_price: 199.0,
            capacity: 10,
            insolvent: false,
        }
    }

    #[test]
    fn test_round_profit_accumulates() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.on_round("s", &[result("a", dec!(100.5))]);
        metrics.on_round("s", &[result("a", dec!(-20.5))]);

        let profit = metrics.team_profit.with_label_values(&["s", "a"]).get();
        assert!((profit - 80.0).abs() < 1e-9);
        assert_eq!(metrics.rounds_finalized.with_label_values(&["s"]).get(), 2);
    }

    #[test]
    fn test_render_contains_metric_names() {
        let metrics = MetricsRegistry::new().unwrap();
        let market = PoolingMarket::open(100, 50, 150.0);
        let report = TickReport {
            tick: 1,
            remaining_days: 29,
            price: 151.0,
            tick_demand: 90,
            returned_demand_injected: 0,
            pooling_demand: 40,
            served: 88,
            newly_insolvent: vec!["z".into()],
            phase_completed: false,
        };
        metrics.on_tick("s", &report, &market);

        let text = metrics.render();
        assert!(text.contains("airline_market_ticks_total"));
        assert!(text.contains("airline_market_pool_price"));
        assert_eq!(metrics.insolvencies.with_label_values(&["s"]).get(), 1);
    }
}
