//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{labels_from_file_name, CsvTradeAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::logging::LoggingConfig;
use crate::domain::aggregation::{ListFilter, RecordFilter};
use crate::domain::analyzer::BacktestAnalyzer;
use crate::domain::config_validation::{
    read_date_format, read_day_filter, read_files, read_label_filter, read_last_days,
    read_max_assignments, read_metric, read_monte_carlo, read_period, read_risk_free_rate,
    read_search_mode, validate_analysis_config,
};
use crate::domain::error::BtlensError;
use crate::domain::metrics::TOTAL_PROFIT;
use crate::domain::monte_carlo::MonteCarloConfig;
use crate::domain::optimizer::SearchMode;
use crate::domain::trade::PeriodGranularity;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "btlens", about = "Backtest results analyzer for options strategies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Directory for CSV output; overrides `[report] output_dir`
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Best stop loss and strategy per day by a metric
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(short, long)]
        metric: Option<String>,
        #[arg(long)]
        last_days: Option<u32>,
    },
    /// Full metrics table per day, stop loss and strategy
    Summary {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        last_days: Option<u32>,
        #[arg(long)]
        stop_loss: Option<String>,
        /// Break down by month, quarter or year
        #[arg(long)]
        period: Option<PeriodGranularity>,
    },
    /// Mean P/L by day and strategy/stop-loss pair
    Pivot {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Most profitable per-day configuration
    Optimize {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        last_days: Option<u32>,
        /// Enumerate every assignment instead of per-day argmax
        #[arg(long)]
        exhaustive: bool,
    },
    /// Bootstrap Monte Carlo over the historical P/L
    Simulate {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        days: Option<usize>,
        #[arg(long)]
        simulations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Also write every trial result
        #[arg(long)]
        trials: bool,
    },
    /// Check a configuration file without loading trades
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    pub fn config_path(&self) -> &Path {
        match self {
            Command::Analyze { common, .. }
            | Command::Summary { common, .. }
            | Command::Pivot { common }
            | Command::Optimize { common, .. }
            | Command::Simulate { common, .. } => &common.config,
            Command::Validate { config } => config,
        }
    }
}

/// Installs the tracing subscriber from the config's `[logging]` section, if readable.
pub fn init_logging(cli: &Cli) {
    let logging = FileConfigAdapter::from_file(cli.command.config_path())
        .map(|adapter| LoggingConfig::from_config(&adapter))
        .unwrap_or_default();
    logging.init();
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(command: Command) -> Result<(), BtlensError> {
    match command {
        Command::Analyze {
            common,
            metric,
            last_days,
        } => run_analyze(&common, metric.as_deref(), last_days),
        Command::Summary {
            common,
            last_days,
            stop_loss,
            period,
        } => run_summary(&common, last_days, stop_loss.as_deref(), period),
        Command::Pivot { common } => run_pivot(&common),
        Command::Optimize {
            common,
            last_days,
            exhaustive,
        } => run_optimize(&common, last_days, exhaustive),
        Command::Simulate {
            common,
            days,
            simulations,
            seed,
            trials,
        } => run_simulate(&common, days, simulations, seed, trials),
        Command::Validate { config } => run_validate(&config),
    }
}

/// A validated config with its trades loaded.
pub struct Session {
    pub config: FileConfigAdapter,
    pub analyzer: BacktestAnalyzer,
    pub report: CsvReportAdapter,
}

impl Session {
    pub fn open(common: &CommonArgs) -> Result<Self, BtlensError> {
        eprintln!("Loading config from {}", common.config.display());
        let config = FileConfigAdapter::from_file(&common.config)?;
        validate_analysis_config(&config)?;

        let source = build_trade_source(&config)?;
        let mut analyzer = BacktestAnalyzer::with_builtins(read_risk_free_rate(&config)?);
        let count = analyzer.load(&source)?;
        eprintln!(
            "Loaded {count} trades over {} trading days",
            analyzer.total_days()?
        );

        let report = build_report_adapter(&config, common.output.clone());
        Ok(Self {
            config,
            analyzer,
            report,
        })
    }
}

pub fn build_trade_source(config: &FileConfigAdapter) -> Result<CsvTradeAdapter, BtlensError> {
    let paths = read_files(config)?
        .iter()
        .map(|f| config.resolve_path(f))
        .collect();
    Ok(CsvTradeAdapter::new(paths, read_date_format(config)?))
}

pub fn build_report_adapter(
    config: &FileConfigAdapter,
    output_override: Option<PathBuf>,
) -> CsvReportAdapter {
    let output_dir = output_override.or_else(|| {
        config
            .get_string("report", "output_dir")
            .filter(|s| !s.trim().is_empty())
            .map(|s| config.resolve_path(s.trim()))
    });
    CsvReportAdapter::new(output_dir)
}

/// Pre-grouping filter from `[analysis]`; `last_days` overrides the configured window.
pub fn build_record_filter(
    config: &dyn ConfigPort,
    last_days: Option<u32>,
) -> Result<RecordFilter, BtlensError> {
    Ok(RecordFilter {
        last_days: last_days.or(read_last_days(config)?),
        days: read_day_filter(config)?,
        stop_losses: read_label_filter(config, "stop_losses")?,
        strategies: read_label_filter(config, "strategies")?,
    })
}

pub fn build_search_mode(config: &dyn ConfigPort, exhaustive: bool) -> Result<SearchMode, BtlensError> {
    if exhaustive {
        Ok(SearchMode::Exhaustive {
            max_assignments: read_max_assignments(config)?,
        })
    } else {
        read_search_mode(config)
    }
}

pub fn build_monte_carlo_config(
    config: &dyn ConfigPort,
    days: Option<usize>,
    simulations: Option<usize>,
    seed: Option<u64>,
) -> Result<MonteCarloConfig, BtlensError> {
    let base = read_monte_carlo(config)?;
    Ok(MonteCarloConfig {
        simulations: simulations.unwrap_or(base.simulations),
        days: days.unwrap_or(base.days),
        confidence_level: base.confidence_level,
        seed: seed.or(base.seed),
    })
}

fn run_analyze(
    common: &CommonArgs,
    metric: Option<&str>,
    last_days: Option<u32>,
) -> Result<(), BtlensError> {
    let session = Session::open(common)?;
    let metric = match metric {
        Some(m) => m.to_string(),
        None => read_metric(&session.config)?.unwrap_or_else(|| TOTAL_PROFIT.to_string()),
    };
    let filter = build_record_filter(&session.config, last_days)?;

    eprintln!("Selecting best setup per day by {metric}");
    let table = session.analyzer.analyze(&filter, &metric)?;
    if table.is_empty() {
        eprintln!("warning: no trades left after filtering");
    }
    session.report.write_table("optimal_selection", &table.to_table())
}

fn run_summary(
    common: &CommonArgs,
    last_days: Option<u32>,
    stop_loss: Option<&str>,
    period: Option<PeriodGranularity>,
) -> Result<(), BtlensError> {
    let session = Session::open(common)?;
    let last_days = last_days.or(read_last_days(&session.config)?);

    match period.or(read_period(&session.config)?) {
        Some(granularity) => {
            let mut filter = RecordFilter::default();
            filter.last_days = last_days;
            if let Some(sl) = stop_loss {
                filter = filter.stop_losses(ListFilter::Include(vec![sl.to_string()]));
            }
            let table = session.analyzer.time_breakdown(granularity, &filter)?;
            session.report.write_table("time_breakdown", &table.to_table())
        }
        None => {
            let table = session.analyzer.summary(last_days, stop_loss)?;
            session.report.write_table("summary", &table.to_table())
        }
    }
}

fn run_pivot(common: &CommonArgs) -> Result<(), BtlensError> {
    let session = Session::open(common)?;
    let filter = build_record_filter(&session.config, None)?;
    let view = session.analyzer.pivot(&filter)?;
    session.report.write_table("pivot", &view.to_table())
}

fn run_optimize(
    common: &CommonArgs,
    last_days: Option<u32>,
    exhaustive: bool,
) -> Result<(), BtlensError> {
    let session = Session::open(common)?;
    let last_days = last_days.or(read_last_days(&session.config)?);
    let mode = build_search_mode(&session.config, exhaustive)?;

    let setup = session.analyzer.optimize(last_days, mode)?;
    eprintln!("\n=== Optimal Setup ===");
    for (day, choice) in setup.configuration.iter() {
        eprintln!("  {day:<10} {choice}");
    }
    eprintln!("Total Profit:     {:.2}", setup.total_profit);
    session.report.write_table("optimal_setup", &setup.to_table())
}

fn run_simulate(
    common: &CommonArgs,
    days: Option<usize>,
    simulations: Option<usize>,
    seed: Option<u64>,
    trials: bool,
) -> Result<(), BtlensError> {
    let session = Session::open(common)?;
    let mc_config = build_monte_carlo_config(&session.config, days, simulations, seed)?;
    eprintln!(
        "Running {} simulations of {} days",
        mc_config.simulations, mc_config.days
    );

    let run = session.analyzer.simulate(mc_config)?;
    session
        .report
        .write_table("monte_carlo_summary", &run.summary.to_table())?;
    if trials {
        session
            .report
            .write_records("monte_carlo_trials", &run.trials)?;
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), BtlensError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;
    validate_analysis_config(&config)?;

    let files = read_files(&config)?;
    for file in &files {
        let (strategy, stop_loss) =
            labels_from_file_name(Path::new(file)).map_err(|reason| BtlensError::Load {
                file: file.clone(),
                reason,
            })?;
        eprintln!("  {file}: strategy {strategy}, stop loss {stop_loss}");
    }
    eprintln!("Config OK ({} trade logs)", files.len());
    Ok(())
}
