use chrono_tz::Tz;
use clap::Parser;
use gpxlocate::gpxxml::extract_track_points;
use gpxlocate::{apply_gap, find_closest_point, parse_gap, parse_target_time};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// Timezone the target date is interpreted in when none is given.
const DEFAULT_TIMEZONE: Tz = Tz::UTC;

#[derive(Parser)]
#[command(
    name = "gpxlocate",
    about = "Finds the GPX track point recorded closest to a given time"
)]
struct Cli {
    /// The GPX file to be read
    file: PathBuf,

    /// The date/time to find within the GPX file, e.g. "2024-05-05 13:04:16"
    #[arg(long)]
    date: String,

    /// Timezone the date is expressed in, e.g. "Europe/Berlin"
    #[arg(long, default_value_t = DEFAULT_TIMEZONE)]
    timezone: Tz,

    /// Clock offset of the camera against the GPS device, as [+|-]HH:MM:SS
    #[arg(long, allow_hyphen_values = true)]
    gap: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let document = fs::read_to_string(&cli.file)
        .map_err(|e| format!("unable to read {}: {e}", cli.file.display()))?;

    let target = parse_target_time(&cli.date, cli.timezone)?;
    let gap = cli.gap.as_deref().map(parse_gap).transpose()?;
    let search_target = apply_gap(target, gap.as_ref());

    let track_points = extract_track_points(document.as_bytes())?;
    let result = find_closest_point(&track_points, search_target)?;

    println!(
        "Time to search:   {}",
        search_target.format("%d.%m.%Y %H:%M:%S %Z")
    );
    println!("Time difference:  {}s", result.time_difference_seconds);
    println!(
        "Coordinate:       {}, {}",
        result.latitude, result.longitude
    );
    println!(
        "Google link:      https://www.google.com/maps/place/{},{}",
        result.latitude, result.longitude
    );

    Ok(())
}
