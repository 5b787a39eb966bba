//! Draw random track URIs from a bucket of a database built by decade-db.
//!
//! Usage: sample-tracks <tracks_by_decade.db> --decade 1990 [--language en] [-n 20]
//!        sample-tracks <tracks_by_decade.db> --list

use anyhow::{bail, Context, Result};
use clap::Parser;
use decade_db::storage::{render_bucket_list, require_bucket, sample_bucket};
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sample-tracks")]
#[command(about = "Sample random track URIs from a decade (or decade/language) bucket")]
struct Args {
    database: PathBuf,

    /// Any year in the decade (1990 and 1997 both select the 1990s)
    #[arg(long, required_unless_present = "list")]
    decade: Option<i64>,

    /// Language code, for databases built in decade-language mode
    #[arg(long)]
    language: Option<String>,

    /// Number of URIs to draw
    #[arg(short = 'n', long, default_value = "10")]
    count: usize,

    /// List the bucket tables instead of sampling
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    decade_db::init_tracing();
    let args = Args::parse();

    let conn = Connection::open_with_flags(&args.database, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open database '{}'", args.database.display()))?;

    if args.list {
        print!("{}", render_bucket_list(&conn)?);
        return Ok(());
    }

    let Some(decade) = args.decade else {
        bail!("--decade is required unless --list is given");
    };

    let table = require_bucket(&conn, decade, args.language.as_deref())?;
    let uris = sample_bucket(&conn, &table, args.count)?;
    tracing::info!(table = %table, drawn = uris.len(), "sampled bucket");
    for uri in uris {
        println!("{}", uri);
    }

    Ok(())
}
