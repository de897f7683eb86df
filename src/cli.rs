use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TableFormat {
    Csv,
    Parquet,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Directory holding serialized scans (`<scanID>.bin`)
    #[arg(short, long)]
    pub read: PathBuf,

    /// Directory holding `roiNames_<label>.csv` catalogs (defaults to --read)
    #[arg(long)]
    pub catalogs: Option<PathBuf>,

    /// Output directory for feature records, tables and logs
    #[arg(short, long, default_value = "./features")]
    pub save: PathBuf,

    /// Optional path to config file (YAML or JSON)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Number of worker slots (overrides config `n_batch`)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip scans whose record already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Do not build tables after the scan phase
    #[arg(long)]
    pub no_tables: bool,

    /// Flat table format
    #[arg(long, value_enum, default_value_t = TableFormat::Csv)]
    pub table_format: TableFormat,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, TableFormat};
    use clap::Parser;

    #[test]
    fn parses_required_read_dir() {
        let opts = CliOptions::try_parse_from(["radiobatch", "--read", "scans"]).expect("parse");
        assert_eq!(opts.read.to_str(), Some("scans"));
        assert!(opts.catalogs.is_none());
        assert!(opts.workers.is_none());
        assert!(!opts.no_tables);
    }

    #[test]
    fn parses_overrides() {
        let opts = CliOptions::try_parse_from([
            "radiobatch",
            "--read",
            "scans",
            "--workers",
            "3",
            "--skip-existing",
            "--no-tables",
            "--table-format",
            "parquet",
        ])
        .expect("parse");
        assert_eq!(opts.workers, Some(3));
        assert!(opts.skip_existing);
        assert!(opts.no_tables);
        assert!(matches!(opts.table_format, TableFormat::Parquet));
    }

    #[test]
    fn read_dir_is_required() {
        assert!(CliOptions::try_parse_from(["radiobatch"]).is_err());
    }
}
