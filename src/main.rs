use anyhow::Result;
use tracing::info;

use radiobatch::{batch::BatchExtractor, cli, config, logging, util};

fn main() -> Result<()> {
    logging::init_logging();

    let cli_opts = cli::parse();
    let mut loaded = config::load_config(cli_opts.config_path.as_deref())?;
    if cli_opts.skip_existing {
        loaded.config.skip_existing = true;
    }

    let catalogs = cli_opts.catalogs.clone().unwrap_or_else(|| cli_opts.read.clone());
    info!(
        "starting read={} catalogs={} save={} config_hash={}",
        cli_opts.read.display(),
        catalogs.display(),
        cli_opts.save.display(),
        loaded.config_hash
    );

    let mut extractor = BatchExtractor::new(loaded, &cli_opts.read, &catalogs, &cli_opts.save)
        .with_tables(!cli_opts.no_tables)
        .with_table_format(util::format_from_cli(cli_opts.table_format));
    if let Some(workers) = cli_opts.workers {
        extractor = extractor.with_width(workers);
    }
    let summary = extractor.run()?;

    info!(
        "radiobatch run finished: {} scans, {} failed",
        summary.scans.total(),
        summary.scans.failed
    );
    Ok(())
}
