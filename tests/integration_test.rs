//! End-to-end tests over the analysis pipeline.
//!
//! Tests cover:
//! - The worked example through metrics, optimal selection, pivot and optimizer
//! - Custom metrics plugged into the registry
//! - CSV trade logs on disk through the session into CSV reports
//! - Filters that eliminate every record

mod common;

use btlens::adapters::csv_adapter::CsvTradeAdapter;
use btlens::adapters::csv_report_adapter::CsvReportAdapter;
use btlens::domain::aggregation::{
    AggregationEngine, Dimension, Grouping, KeyValue, ListFilter, RecordFilter,
};
use btlens::domain::analyzer::BacktestAnalyzer;
use btlens::domain::error::BtlensError;
use btlens::domain::metrics::{
    Metric, MetricRegistry, AVG_LOSS_ON_LOSING, MAX_DRAWDOWN, REWARD_TO_RISK_RATIO,
    TOTAL_PROFIT, WIN_PERCENTAGE,
};
use btlens::domain::monte_carlo::MonteCarloConfig;
use btlens::domain::optimizer::{DaySetup, SearchMode, SetupOptimizer};
use btlens::domain::trade::{DayOfWeek, TradeRecord};
use btlens::ports::report_port::ReportPort;
use common::*;
use std::fs;
use tempfile::TempDir;

fn key(day: DayOfWeek, sl: &str, strategy: &str) -> Vec<KeyValue> {
    vec![
        KeyValue::Day(day),
        KeyValue::Label(sl.into()),
        KeyValue::Label(strategy.into()),
    ]
}

mod worked_example {
    use super::*;

    #[test]
    fn metrics_per_group() {
        let engine = AggregationEngine::new(MetricRegistry::with_builtins(0.0));
        let table = engine.metrics_table(
            &worked_example_set(),
            &Grouping::default(),
            &RecordFilter::default(),
        );
        assert_eq!(table.len(), 2);

        let monday = table.find(&key(DayOfWeek::Monday, "10%", "StratA")).unwrap();
        assert_eq!(monday.metrics.get(TOTAL_PROFIT), Some(50.0));
        assert_eq!(monday.metrics.get(WIN_PERCENTAGE), Some(50.0));
        assert_eq!(monday.metrics.get(AVG_LOSS_ON_LOSING), Some(-50.0));
        assert_eq!(monday.metrics.get(MAX_DRAWDOWN), Some(50.0));

        let tuesday = table.find(&key(DayOfWeek::Tuesday, "20%", "StratA")).unwrap();
        assert_eq!(tuesday.metrics.get(REWARD_TO_RISK_RATIO), Some(f64::INFINITY));
    }

    #[test]
    fn optimizer_excludes_days_without_trades() {
        for mode in [
            SearchMode::PerDay,
            SearchMode::Exhaustive {
                max_assignments: 1_000,
            },
        ] {
            let setup = SetupOptimizer::new(mode)
                .optimize(&worked_example_set())
                .unwrap();
            assert_eq!(setup.total_profit, 80.0);
            assert_eq!(
                setup.configuration.get(DayOfWeek::Monday),
                &DaySetup::configured("10%", "StratA")
            );
            assert_eq!(
                setup.configuration.get(DayOfWeek::Tuesday),
                &DaySetup::configured("20%", "StratA")
            );
            assert!(setup.configuration.get(DayOfWeek::Wednesday).is_excluded());
            assert!(setup.configuration.get(DayOfWeek::Thursday).is_excluded());
            assert!(setup.configuration.get(DayOfWeek::Friday).is_excluded());
        }
    }

    #[test]
    fn pivot_zero_fills_absent_days() {
        let engine = AggregationEngine::new(MetricRegistry::with_builtins(0.0));
        let view = engine.pivot_view(&worked_example_set(), &RecordFilter::default());

        assert_eq!(
            view.columns,
            vec![
                ("StratA".to_string(), "10%".to_string()),
                ("StratA".to_string(), "20%".to_string()),
            ]
        );
        let monday = view.row(DayOfWeek::Monday).unwrap();
        assert_eq!(monday.values, vec![25.0, 0.0]);
        let friday = view.row(DayOfWeek::Friday).unwrap();
        assert_eq!(friday.values, vec![0.0, 0.0]);
        assert_eq!(friday.best, Some(0));
    }
}

mod custom_metrics {
    use super::*;

    struct TradeCount;

    impl Metric for TradeCount {
        fn calculate(&self, records: &[&TradeRecord]) -> f64 {
            records.len() as f64
        }
    }

    #[test]
    fn registered_metric_is_selectable() {
        let mut registry = MetricRegistry::with_builtins(0.0);
        registry.register("Trade Count", TradeCount);

        let mut analyzer = BacktestAnalyzer::new(registry);
        analyzer
            .load(&MockTradeSource::new().with_trades(worked_example()))
            .unwrap();

        let table = analyzer
            .analyze(&RecordFilter::default(), "Trade Count")
            .unwrap();
        assert_eq!(table.metric_names.last().map(String::as_str), Some("Trade Count"));
        assert_eq!(table.rows[0].metrics.get("Trade Count"), Some(2.0));
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let mut analyzer = BacktestAnalyzer::with_builtins(0.0);
        analyzer
            .load(&MockTradeSource::new().with_trades(worked_example()))
            .unwrap();
        let err = analyzer
            .analyze(&RecordFilter::default(), "Omega Ratio")
            .unwrap_err();
        assert!(matches!(err, BtlensError::UnknownMetric { name } if name == "Omega Ratio"));
    }

    #[test]
    fn selection_needs_day_dimension() {
        let mut analyzer = BacktestAnalyzer::with_builtins(0.0);
        analyzer
            .load(&MockTradeSource::new().with_trades(worked_example()))
            .unwrap();
        let table = analyzer
            .grouped(vec![Dimension::StopLoss], &RecordFilter::default())
            .unwrap();
        let err = analyzer
            .engine()
            .optimal_selection(&table, TOTAL_PROFIT)
            .unwrap_err();
        assert!(matches!(err, BtlensError::MissingDimension { .. }));
    }
}

mod csv_pipeline {
    use super::*;

    fn load_two_runs(dir: &TempDir) -> BacktestAnalyzer {
        // 01-01-24 Mon, 02-01-24 Tue, 03-01-24 Wed, 08-01-24 Mon
        let ten = write_trade_log(
            dir.path(),
            "nifty_atm_920_10p.csv",
            &[("01-01-24", 100.0), ("02-01-24", -20.0), ("08-01-24", -50.0)],
        );
        let twenty = write_trade_log(
            dir.path(),
            "nifty_atm_920_20p.csv",
            &[("01-01-24", 40.0), ("02-01-24", 15.0), ("03-01-24", -5.0)],
        );
        let mut analyzer = BacktestAnalyzer::with_builtins(0.0);
        analyzer
            .load(&CsvTradeAdapter::new(vec![ten, twenty], "%d-%m-%y"))
            .unwrap();
        analyzer
    }

    #[test]
    fn loads_and_optimizes() {
        let dir = TempDir::new().unwrap();
        let analyzer = load_two_runs(&dir);
        assert_eq!(analyzer.records().unwrap().len(), 6);
        assert_eq!(analyzer.total_days().unwrap(), 4);

        let setup = analyzer.optimize(None, SearchMode::PerDay).unwrap();
        // Mon: 10p = 50, 20p = 40; Tue: 10p = -20, 20p = 15; Wed: 10p = 0, 20p = -5
        assert_eq!(
            setup.configuration.get(DayOfWeek::Monday),
            &DaySetup::configured("10p", "atm")
        );
        assert_eq!(
            setup.configuration.get(DayOfWeek::Tuesday),
            &DaySetup::configured("20p", "atm")
        );
        // break-even day stays configured
        assert_eq!(
            setup.configuration.get(DayOfWeek::Wednesday),
            &DaySetup::configured("10p", "atm")
        );
        assert!(setup.configuration.get(DayOfWeek::Thursday).is_excluded());
        assert_eq!(setup.total_profit, 65.0);
    }

    #[test]
    fn window_changes_optimum() {
        let dir = TempDir::new().unwrap();
        let analyzer = load_two_runs(&dir);
        // latest is 08-01-24; a 2-day window keeps only that Monday loss
        let setup = analyzer.optimize(Some(2), SearchMode::PerDay).unwrap();
        assert!(setup.configuration.get(DayOfWeek::Monday).is_excluded());
        assert_eq!(setup.total_profit, 0.0);
    }

    #[test]
    fn window_wider_than_the_calendar_keeps_every_trade() {
        let dir = TempDir::new().unwrap();
        let analyzer = load_two_runs(&dir);
        let all = analyzer.optimize(None, SearchMode::PerDay).unwrap();
        let widest = analyzer.optimize(Some(u32::MAX), SearchMode::PerDay).unwrap();
        assert_eq!(widest, all);
    }

    #[test]
    fn reports_are_written_as_csv() {
        let dir = TempDir::new().unwrap();
        let analyzer = load_two_runs(&dir);
        let out = dir.path().join("out");
        let report = CsvReportAdapter::new(Some(out.clone()));

        let table = analyzer.summary(None, Some("10p")).unwrap();
        report.write_table("summary", &table.to_table()).unwrap();
        let run = analyzer
            .simulate(MonteCarloConfig {
                simulations: 20,
                days: 10,
                confidence_level: 0.95,
                seed: Some(7),
            })
            .unwrap();
        report.write_records("monte_carlo_trials", &run.trials).unwrap();

        let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
        let mut lines = summary.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("Day of Week,Stop Loss %,Strategy Type,Trades,Total Profit"));
        assert!(lines.next().unwrap().starts_with("Monday,10p,atm,2,50"));

        let trials = fs::read_to_string(out.join("monte_carlo_trials.csv")).unwrap();
        assert_eq!(trials.lines().count(), 21);
    }
}

mod empty_results {
    use super::*;

    #[test]
    fn filters_can_eliminate_everything() {
        let mut analyzer = BacktestAnalyzer::with_builtins(0.0);
        analyzer
            .load(&MockTradeSource::new().with_trades(worked_example()))
            .unwrap();
        let filter =
            RecordFilter::default().strategies(ListFilter::Exclude(vec!["StratA".into()]));

        assert!(analyzer.analyze(&filter, TOTAL_PROFIT).unwrap().is_empty());
        let view = analyzer.pivot(&filter).unwrap();
        assert!(view.rows.is_empty());
        assert!(view.columns.is_empty());
    }

    #[test]
    fn failed_load_keeps_session_not_ready() {
        let mut analyzer = BacktestAnalyzer::with_builtins(0.0);
        assert!(analyzer
            .load(&MockTradeSource::new().with_error("disk on fire"))
            .is_err());
        assert!(matches!(
            analyzer.optimize(None, SearchMode::PerDay),
            Err(BtlensError::NotReady)
        ));
    }

    #[test]
    fn empty_source_cannot_be_simulated() {
        let mut analyzer = BacktestAnalyzer::with_builtins(0.0);
        analyzer.load(&MockTradeSource::new()).unwrap();
        assert!(matches!(
            analyzer.simulate(MonteCarloConfig::default()),
            Err(BtlensError::InsufficientData { .. })
        ));
    }
}
