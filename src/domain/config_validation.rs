//! Configuration validation.
//!
//! Every INI value is checked before any analysis runs. The typed readers below are
//! shared with the CLI, which builds its filters and engine settings from them.

use crate::domain::aggregation::ListFilter;
use crate::domain::error::BtlensError;
use crate::domain::metrics::MetricRegistry;
use crate::domain::monte_carlo::MonteCarloConfig;
use crate::domain::optimizer::{SearchMode, DEFAULT_MAX_ASSIGNMENTS};
use crate::domain::trade::{DayOfWeek, PeriodGranularity};
use crate::ports::config_port::ConfigPort;
use chrono::format::{Item, StrftimeItems};
use std::str::FromStr;

pub const DEFAULT_DATE_FORMAT: &str = "%d-%m-%y";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), BtlensError> {
    read_files(config)?;
    read_date_format(config)?;
    read_last_days(config)?;
    read_metric(config)?;
    read_risk_free_rate(config)?;
    read_day_filter(config)?;
    read_label_filter(config, "stop_losses")?;
    read_label_filter(config, "strategies")?;
    read_period(config)?;
    read_search_mode(config)?;
    read_monte_carlo(config)?;
    validate_logging(config)?;
    Ok(())
}

/// `[data] files`, at least one.
pub fn read_files(config: &dyn ConfigPort) -> Result<Vec<String>, BtlensError> {
    let files = config.get_list("data", "files");
    if files.is_empty() {
        return Err(BtlensError::ConfigMissing {
            section: "data".into(),
            key: "files".into(),
        });
    }
    Ok(files)
}

pub fn read_date_format(config: &dyn ConfigPort) -> Result<String, BtlensError> {
    let format = config
        .get_string("data", "date_format")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    if format.is_empty() || StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        return Err(invalid("data", "date_format", "not a valid strftime format"));
    }
    Ok(format)
}

pub fn read_last_days(config: &dyn ConfigPort) -> Result<Option<u32>, BtlensError> {
    parse_optional(config, "analysis", "last_days", "expected a non-negative integer")
}

/// `[analysis] metric`, checked against the built-in metric names.
pub fn read_metric(config: &dyn ConfigPort) -> Result<Option<String>, BtlensError> {
    let Some(name) = non_empty(config, "analysis", "metric") else {
        return Ok(None);
    };
    MetricRegistry::with_builtins(0.0)
        .get(&name)
        .map_err(|e| invalid("analysis", "metric", &e.to_string()))?;
    Ok(Some(name))
}

pub fn read_risk_free_rate(config: &dyn ConfigPort) -> Result<f64, BtlensError> {
    let rate: f64 = parse_optional(config, "analysis", "risk_free_rate", "expected a number")?
        .unwrap_or(0.0);
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid(
            "analysis",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(rate)
}

/// `include_days` / `exclude_days`; at most one of the two may be set.
pub fn read_day_filter(
    config: &dyn ConfigPort,
) -> Result<Option<ListFilter<DayOfWeek>>, BtlensError> {
    let Some(filter) = read_list_pair(config, "days")? else {
        return Ok(None);
    };
    let key = match &filter {
        ListFilter::Include(_) => "include_days",
        ListFilter::Exclude(_) => "exclude_days",
    };
    let parse = |names: Vec<String>| -> Result<Vec<DayOfWeek>, BtlensError> {
        names
            .iter()
            .map(|n| DayOfWeek::from_str(n).map_err(|e| invalid("analysis", key, &e.to_string())))
            .collect()
    };
    Ok(Some(match filter {
        ListFilter::Include(names) => ListFilter::Include(parse(names)?),
        ListFilter::Exclude(names) => ListFilter::Exclude(parse(names)?),
    }))
}

/// `include_<field>` / `exclude_<field>` over a label column.
pub fn read_label_filter(
    config: &dyn ConfigPort,
    field: &str,
) -> Result<Option<ListFilter<String>>, BtlensError> {
    read_list_pair(config, field)
}

pub fn read_period(config: &dyn ConfigPort) -> Result<Option<PeriodGranularity>, BtlensError> {
    match non_empty(config, "analysis", "period") {
        None => Ok(None),
        Some(raw) => PeriodGranularity::from_str(&raw)
            .map(Some)
            .map_err(|reason| invalid("analysis", "period", &reason)),
    }
}

pub fn read_max_assignments(config: &dyn ConfigPort) -> Result<u128, BtlensError> {
    let max_assignments: u128 = parse_optional(
        config,
        "optimizer",
        "max_assignments",
        "expected a positive integer",
    )?
    .unwrap_or(DEFAULT_MAX_ASSIGNMENTS);
    if max_assignments == 0 {
        return Err(invalid(
            "optimizer",
            "max_assignments",
            "max_assignments must be positive",
        ));
    }
    Ok(max_assignments)
}

pub fn read_search_mode(config: &dyn ConfigPort) -> Result<SearchMode, BtlensError> {
    let max_assignments = read_max_assignments(config)?;
    match non_empty(config, "optimizer", "mode").as_deref() {
        None | Some("per_day") => Ok(SearchMode::PerDay),
        Some("exhaustive") => Ok(SearchMode::Exhaustive { max_assignments }),
        Some(other) => Err(invalid(
            "optimizer",
            "mode",
            &format!("unknown mode '{other}', expected per_day or exhaustive"),
        )),
    }
}

pub fn read_monte_carlo(config: &dyn ConfigPort) -> Result<MonteCarloConfig, BtlensError> {
    let defaults = MonteCarloConfig::default();
    let simulations: usize =
        parse_optional(config, "monte_carlo", "simulations", "expected a positive integer")?
            .unwrap_or(defaults.simulations);
    if simulations == 0 {
        return Err(invalid("monte_carlo", "simulations", "simulations must be positive"));
    }
    let days: usize = parse_optional(config, "monte_carlo", "days", "expected a positive integer")?
        .unwrap_or(defaults.days);
    if days == 0 {
        return Err(invalid("monte_carlo", "days", "days must be positive"));
    }
    let confidence_level: f64 =
        parse_optional(config, "monte_carlo", "confidence_level", "expected a number")?
            .unwrap_or(defaults.confidence_level);
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(invalid(
            "monte_carlo",
            "confidence_level",
            "confidence_level must be strictly between 0 and 1",
        ));
    }
    let seed = parse_optional(config, "monte_carlo", "seed", "expected an unsigned integer")?;

    Ok(MonteCarloConfig {
        simulations,
        days,
        confidence_level,
        seed,
    })
}

fn validate_logging(config: &dyn ConfigPort) -> Result<(), BtlensError> {
    if let Some(level) = non_empty(config, "logging", "level") {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(invalid(
                "logging",
                "level",
                "expected one of trace, debug, info, warn, error",
            ));
        }
    }
    match non_empty(config, "logging", "format").as_deref() {
        None | Some("pretty") | Some("json") => Ok(()),
        Some(_) => Err(invalid("logging", "format", "expected pretty or json")),
    }
}

fn read_list_pair(
    config: &dyn ConfigPort,
    field: &str,
) -> Result<Option<ListFilter<String>>, BtlensError> {
    let include_key = format!("include_{field}");
    let exclude_key = format!("exclude_{field}");
    let include = config.get_list("analysis", &include_key);
    let exclude = config.get_list("analysis", &exclude_key);
    match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Ok(None),
        (false, true) => Ok(Some(ListFilter::Include(include))),
        (true, false) => Ok(Some(ListFilter::Exclude(exclude))),
        (false, false) => Err(invalid(
            "analysis",
            &include_key,
            &format!("cannot be combined with {exclude_key}"),
        )),
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, BtlensError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("{expected}, got '{raw}'"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> BtlensError {
    BtlensError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
