use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use clap::{arg, value_parser, Command};
use eyre::eyre;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::client::{search_schemes, JsonSource, MfApi};
use crate::config::Config;
use crate::error::ConfigError;
use crate::view::SchemeView;
use crate::window::TimeWindow;

mod change;
mod client;
mod config;
mod error;
mod nav;
mod report;
mod series;
mod tui;
mod view;
mod window;
mod yearly;

fn cli() -> Command {
    Command::new("mfnav")
        .about("Mutual fund NAV history in your terminal")
        .arg_required_else_help(true)
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(
            Command::new("list")
                .about("Search the list of mutual fund schemes")
                .arg(arg!([QUERY] "Case-insensitive part of the scheme name"))
                .arg(
                    arg!(-n --limit <N> "Maximum number of schemes to print")
                        .value_parser(value_parser!(usize))
                        .default_value("20"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show NAV history, performance and yearly summary of a scheme")
                .arg(arg!(<CODE> "Scheme code").value_parser(parse_scheme_code))
                .arg(
                    arg!(-w --window <WINDOW> "Time window: 1M, 3M, 6M, 1Y, 2Y, 5Y or MAX")
                        .required(false)
                        .value_parser(|s: &str| s.parse::<TimeWindow>()),
                ),
        )
        .subcommand(
            Command::new("yearly")
                .about("Show the yearly NAV summary of a scheme")
                .arg(arg!(<CODE> "Scheme code").value_parser(parse_scheme_code)),
        )
        .subcommand(
            Command::new("tui")
                .about("Open the interactive dashboard")
                .arg(arg!([CODE] "Scheme code to open right away").value_parser(parse_scheme_code)),
        )
}

fn parse_scheme_code(s: &str) -> Result<u64, ConfigError> {
    s.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSchemeCode(s.to_string()))
}

/// Logs go to stderr, or to `log_file` when the terminal is owned by the
/// dashboard. `RUST_LOG` takes precedence over the configured level.
fn init_tracing(level: &str, log_file: Option<&Path>) -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Prints the matching schemes and returns how many were shown. A failed
/// fetch is reported and shows nothing.
async fn list<S: JsonSource>(api: &MfApi<S>, query: &str, limit: usize) -> usize {
    let schemes = match api.list_schemes().await {
        Ok(schemes) => schemes,
        Err(e) => {
            warn!(error = %e, "Failed to fetch scheme listing");
            eprintln!("Failed to fetch mutual fund data: {e}");
            println!("No schemes found");
            return 0;
        }
    };
    let matching = search_schemes(&schemes, query);
    info!(total = schemes.len(), matching = matching.len(), "Fetched scheme listing");

    let shown: Vec<_> = matching.iter().take(limit).copied().collect();
    report::print_listing(&shown, matching.len());
    shown.len()
}

// None when the scheme could not be fetched or has no NAV rows
async fn load_view(api: &MfApi, scheme_code: u64, today: NaiveDate) -> Option<SchemeView> {
    match api.scheme_history(scheme_code).await {
        Ok(history) => {
            let view = SchemeView::new(history, today);
            if view.has_data() {
                Some(view)
            } else {
                warn!(scheme_code, "Scheme has no NAV records");
                None
            }
        }
        Err(e) => {
            warn!(scheme_code, error = %e, "Failed to fetch scheme");
            eprintln!("Failed to fetch scheme {scheme_code}: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg = Config::load()?;
    let matches = cli().get_matches();
    let today = Local::now().date_naive();

    if matches.subcommand_matches("tui").is_some() {
        let log_file = Config::path()?.with_file_name("mfnav.log");
        init_tracing(&cfg.log_level, Some(&log_file))?;
    } else {
        init_tracing(&cfg.log_level, None)?;
    }

    let api = MfApi::from_config(&cfg)?;

    match matches.subcommand() {
        Some(("config", _)) => {
            let path = Config::path()?;
            println!("Your config file is located here: \n{}", path.display());
        }
        Some(("list", sub)) => {
            let query = sub.get_one::<String>("QUERY").map(String::as_str).unwrap_or("");
            let limit = sub.get_one::<usize>("limit").copied().unwrap_or(20);
            list(&api, query, limit).await;
        }
        Some(("show", sub)) => {
            let code = *sub
                .get_one::<u64>("CODE")
                .ok_or_else(|| eyre!("missing scheme code"))?;
            match load_view(&api, code, today).await {
                Some(view) => {
                    let window = sub
                        .get_one::<TimeWindow>("window")
                        .copied()
                        .or_else(|| view.default_window())
                        .unwrap_or(TimeWindow::MaxPeriod);
                    report::print_scheme(&view, window, cfg.recent_rows);
                }
                None => println!("No scheme data found"),
            }
        }
        Some(("yearly", sub)) => {
            let code = *sub
                .get_one::<u64>("CODE")
                .ok_or_else(|| eyre!("missing scheme code"))?;
            match load_view(&api, code, today).await {
                Some(view) => report::print_yearly(&view),
                None => println!("No scheme data found"),
            }
        }
        Some(("tui", sub)) => {
            let code = sub.get_one::<u64>("CODE").copied();
            tui::run_tui(api, cfg.chart_style(), code)
                .await
                .map_err(|e| eyre!("{e}"))?;
        }
        _ => cli().print_help()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Answers every request with the same listing, or with a 500.
    struct FixedListing(Option<Value>);

    #[async_trait]
    impl JsonSource for FixedListing {
        async fn get_json(&self, _url: &str) -> Result<Value, FetchError> {
            self.0.clone().ok_or(FetchError::Status { status: 500 })
        }
    }

    fn api(listing: Option<Value>) -> MfApi<FixedListing> {
        let policy = RetryPolicy {
            attempts: 2,
            base_delay: Duration::ZERO,
            budget: Duration::from_secs(1),
        };
        MfApi::new(FixedListing(listing), "http://test/mf", policy)
    }

    #[tokio::test]
    async fn test_list_failure_is_reported_not_fatal() {
        assert_eq!(list(&api(None), "", 20).await, 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_limits() {
        let listing = json!([
            { "schemeCode": 1, "schemeName": "Axis Bluechip Fund" },
            { "schemeCode": 2, "schemeName": "Axis Midcap Fund" },
            { "schemeCode": 3, "schemeName": "SBI Bluechip Fund" }
        ]);
        assert_eq!(list(&api(Some(listing.clone())), "axis", 20).await, 2);
        assert_eq!(list(&api(Some(listing)), "", 1).await, 1);
    }

    #[test]
    fn test_cli() {
        let matches = cli().get_matches_from(vec!["mfnav", "show", "119551", "--window", "1y"]);
        assert_eq!(matches.subcommand_name(), Some("show"));
        let sub = matches.subcommand_matches("show").unwrap();
        assert_eq!(sub.get_one::<u64>("CODE"), Some(&119551));
        assert_eq!(sub.get_one::<TimeWindow>("window"), Some(&TimeWindow::OneYear));
    }

    #[test]
    fn test_cli_list_defaults() {
        let matches = cli().get_matches_from(vec!["mfnav", "list"]);
        let sub = matches.subcommand_matches("list").unwrap();
        assert_eq!(sub.get_one::<String>("QUERY"), None);
        assert_eq!(sub.get_one::<usize>("limit"), Some(&20));

        let matches = cli().get_matches_from(vec!["mfnav", "list", "axis", "-n", "5"]);
        let sub = matches.subcommand_matches("list").unwrap();
        assert_eq!(sub.get_one::<String>("QUERY").map(String::as_str), Some("axis"));
        assert_eq!(sub.get_one::<usize>("limit"), Some(&5));
    }

    #[test]
    fn test_cli_tui_code_is_optional() {
        let matches = cli().get_matches_from(vec!["mfnav", "tui"]);
        let sub = matches.subcommand_matches("tui").unwrap();
        assert_eq!(sub.get_one::<u64>("CODE"), None);
    }

    #[test]
    fn test_cli_rejects_bad_input() {
        assert!(cli()
            .try_get_matches_from(vec!["mfnav", "show", "abc"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(vec!["mfnav", "show", "119551", "-w", "10Y"])
            .is_err());
        assert!(cli().try_get_matches_from(vec!["mfnav", "yearly"]).is_err());
    }

    #[test]
    fn test_parse_scheme_code() {
        assert_eq!(parse_scheme_code(" 119551 ").unwrap(), 119551);
        assert!(matches!(
            parse_scheme_code("-1"),
            Err(ConfigError::InvalidSchemeCode(_))
        ));
    }
}
