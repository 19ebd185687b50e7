use reversion_quant::config::Config;
use reversion_quant::optimizer::Constraint;

fn parse(toml_str: &str) -> Config {
    toml::from_str(toml_str).expect("config should parse")
}

#[test]
fn parse_default_toml() {
    let config = Config::from_path(std::path::Path::new("config/default.toml"))
        .expect("bundled config should load");
    assert_eq!(config.strategy.returns_lookback_days, 10);
    assert_eq!(config.universe.max_stale_days, 5);
    assert!((config.strategy.low_percentile - 5.0).abs() < f64::EPSILON);
    assert!((config.strategy.high_percentile - 95.0).abs() < f64::EPSILON);
    assert!((config.risk.max_gross_exposure - 2.0).abs() < f64::EPSILON);
    assert!((config.risk.max_position_concentration - 0.01).abs() < f64::EPSILON);
    assert_eq!(config.schedule.market_open, "09:30");
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
/// Verifies the risk section maps onto gross, concentration and neutrality in that order.
fn risk_section_builds_ordered_constraint_set() {
    let config = parse(
        r#"
[risk]
max_gross_exposure = 1.5
max_position_concentration = 0.02
"#,
    );
    let set: Vec<Constraint> = config.risk.constraint_set().iter().copied().collect();
    assert_eq!(
        set,
        vec![
            Constraint::MaxGrossExposure(1.5),
            Constraint::PositionConcentration {
                min: -0.02,
                max: 0.02
            },
            Constraint::DollarNeutral,
        ]
    );
}

#[test]
fn validate_rejects_structural_errors() {
    let zero_lookback = parse("[strategy]\nreturns_lookback_days = 0\n");
    assert!(zero_lookback.validate().is_err());

    let inverted = parse("[strategy]\nlow_percentile = 60.0\nhigh_percentile = 40.0\n");
    assert!(inverted.validate().is_err());

    let long_offset = parse("[schedule]\nhours = 23\nminutes = 60\n");
    assert!(long_offset.validate().is_err());

    let bad_open = parse("[schedule]\nmarket_open = \"9h30\"\n");
    assert!(bad_open.validate().is_err());
}

#[test]
/// Verifies a week-start offset past Friday is refused rather than moved to Friday.
fn validate_rejects_days_offset_past_friday() {
    let friday = parse("[schedule]\ndays_offset = 4\n");
    assert!(friday.validate().is_ok());

    let saturday = parse("[schedule]\ndays_offset = 5\n");
    let err = saturday.validate().unwrap_err();
    assert!(err.to_string().contains("days_offset"));
    assert!(saturday.schedule.to_schedule().is_err());
}

#[test]
/// Verifies unsatisfiable risk numbers pass validation; the optimizer reports them.
fn validate_does_not_clip_risk_limits() {
    let config = parse("[risk]\nmax_gross_exposure = -1.0\n");
    assert!(config.validate().is_ok());
}

#[test]
fn schedule_config_builds_weekly_trigger() {
    let config = parse("[schedule]\ndays_offset = 1\nhours = 0\nminutes = 45\nmarket_open = \"09:30\"\n");
    let schedule = config.schedule.to_schedule().unwrap();
    let wednesday = chrono::NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
    assert_eq!(
        schedule.trigger_for_week(wednesday),
        chrono::NaiveDate::from_ymd_opt(2024, 5, 7)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap()
    );
}

#[test]
fn pipeline_follows_config() {
    let config = parse("[strategy]\nreturns_lookback_days = 21\nlow_percentile = 10.0\nhigh_percentile = 90.0\n");
    let pipeline = config.pipeline().unwrap();
    assert_eq!(pipeline.factors.lookback_days(), 21);
    assert!((pipeline.selection.low_pct() - 10.0).abs() < f64::EPSILON);
    assert!((pipeline.selection.high_pct() - 90.0).abs() < f64::EPSILON);
    assert_eq!(pipeline.constraints.len(), 3);
}
