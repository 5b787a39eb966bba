use anyhow::{Context, Result};
use clap::Parser;
use decade_db::models::GroupingMode;
use decade_db::pipeline::{print_report, run, BuildConfig};
use decade_db::progress::set_log_only;
use decade_db::reader::ColumnNames;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "decade-db")]
#[command(about = "Build a SQLite database of track URIs bucketed by release decade")]
struct Args {
    /// CSV export with uri, album_date and (optionally) languages columns
    #[arg(default_value = "popular_tracks.csv")]
    input: PathBuf,

    #[arg(default_value = "spotify_tracks_by_decade.db")]
    output: PathBuf,

    /// Bucket by decade only, or by decade and language
    #[arg(long, value_enum, default_value_t = GroupingMode::Decade)]
    mode: GroupingMode,

    /// Buckets with fewer tracks than this get no table
    #[arg(long, default_value = "1")]
    min_count: usize,

    #[arg(long, default_value = "uri")]
    uri_column: String,

    #[arg(long, default_value = "album_date")]
    date_column: String,

    #[arg(long, default_value = "languages")]
    language_column: String,

    /// Rows shown in the "Sample data" section of the report
    #[arg(long, default_value = "5")]
    sample: usize,

    /// Rayon worker threads for field parsing (0 = all cores)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Write ingest statistics as JSON to this path
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    decade_db::init_tracing();
    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let config = BuildConfig {
        input: args.input,
        output: args.output,
        mode: args.mode,
        min_count: args.min_count,
        columns: ColumnNames {
            uri: args.uri_column,
            album_date: args.date_column,
            languages: args.language_column,
        },
        sample_size: args.sample,
        stats_path: args.stats,
    };

    let report = run(&config)?;
    print_report(&report);

    Ok(())
}
