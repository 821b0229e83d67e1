use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

use brent_impact::logging::{self, LoggingConfig};
use brent_impact::services::sample_data;

/// Write a synthetic Brent price series and the matching events file.
///
/// Produces `brent_prices.csv` (`Date,Price`, `20-May-87` dates) and
/// `events.csv` in the output directory.
#[derive(Debug, Parser)]
#[command(name = "generate_sample_data", version, about = "Generate sample Brent price and event CSVs")]
struct Cli {
    /// Directory to write the CSV files into.
    #[arg(env = "DATA_DIR", default_value = "data")]
    output_dir: PathBuf,

    /// Seed for the price generator; the same seed yields the same series.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// First calendar day of the series (YYYY-MM-DD).
    #[arg(long, default_value = "1987-05-20")]
    start: NaiveDate,

    /// Last calendar day of the series (YYYY-MM-DD).
    #[arg(long, default_value = "2022-09-30")]
    end: NaiveDate,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(LoggingConfig::console_only())?;

    if cli.start > cli.end {
        anyhow::bail!("--start {} is after --end {}", cli.start, cli.end);
    }

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create {:?}", cli.output_dir))?;

    let prices = sample_data::generate_prices(cli.start, cli.end, cli.seed)?;
    let events = sample_data::default_events();

    let prices_path = cli.output_dir.join("brent_prices.csv");
    let events_path = cli.output_dir.join("events.csv");
    sample_data::write_prices_csv(&prices_path, &prices)?;
    sample_data::write_events_csv(&events_path, &events)?;

    info!("Wrote {} prices (seed {}) to {:?}", prices.len(), cli.seed, prices_path);
    info!("Wrote {} events to {:?}", events.len(), events_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_seed_flag() {
        let cli = Cli::try_parse_from(["generate_sample_data", "--seed", "7", "out"]).unwrap();
        assert_eq!(cli.seed, 7);
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert_eq!(cli.start, NaiveDate::from_ymd_opt(1987, 5, 20).unwrap());
    }

    #[test]
    fn test_bad_flags_are_usage_errors() {
        assert!(Cli::try_parse_from(["generate_sample_data", "--seed", "seven"]).is_err());
        assert!(Cli::try_parse_from(["generate_sample_data", "--start", "20-May-87"]).is_err());
        assert!(Cli::try_parse_from(["generate_sample_data", "--bogus"]).is_err());
    }

    #[test]
    fn test_clap_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
