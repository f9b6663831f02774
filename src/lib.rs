pub mod error;
pub mod gpxxml;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::GpxLocateError;

/// One recorded GPS sample. Points without a timestamp stay in the track but
/// are invisible to the nearest-time search.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapSign {
    Add,
    Subtract,
}

/// A known clock offset between a secondary device (e.g. a camera) and the
/// GPS device, as a non-negative duration plus a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapOffset {
    pub magnitude: Duration,
    pub sign: GapSign,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub latitude: f64,
    pub longitude: f64,
    pub time_difference_seconds: u64,
}

/// Parses a date/time string in the given timezone into a UTC instant.
///
/// Accepted forms: RFC 3339 with an embedded offset (the timezone argument is
/// ignored for these), the relative words `now`, `today`, `yesterday` and
/// `tomorrow`, and naive date/times such as `2024-05-05 13:04:16` or
/// `2024-05-05`, which are interpreted in the given timezone.
pub fn parse_target_time(input: &str, timezone: Tz) -> Result<DateTime<Utc>, GpxLocateError> {
    let trimmed = input.trim();

    // A timestamp carrying its own offset already identifies an instant.
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "now" => return Ok(Utc::now()),
        "today" => return to_utc(local_midnight(timezone, 0), timezone, input),
        "yesterday" => return to_utc(local_midnight(timezone, -1), timezone, input),
        "tomorrow" => return to_utc(local_midnight(timezone, 1), timezone, input),
        _ => {}
    }

    let Some(naive) = parse_naive(trimmed) else {
        return Err(GpxLocateError::MalformedTimestamp(input.to_string()));
    };

    to_utc(naive, timezone, input)
}

fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    for format in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

fn local_midnight(timezone: Tz, day_offset: i64) -> NaiveDateTime {
    let today = Utc::now().with_timezone(&timezone).date_naive();
    (today + Duration::days(day_offset)).and_time(NaiveTime::MIN)
}

/// Ambiguous local times (DST fall-back) resolve to the earlier instant;
/// nonexistent ones (spring-forward) are rejected.
fn to_utc(
    naive: NaiveDateTime,
    timezone: Tz,
    original: &str,
) -> Result<DateTime<Utc>, GpxLocateError> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(local) | LocalResult::Ambiguous(local, _) => {
            Ok(local.with_timezone(&Utc))
        }
        LocalResult::None => Err(GpxLocateError::MalformedTimestamp(original.to_string())),
    }
}

/// Parses a time gap of the form `[+|-]HH:MM:SS`. A missing sign means `+`.
///
/// Hours are unbounded so gaps of a day or more stay representable; minutes
/// and seconds must be below 60.
pub fn parse_gap(input: &str) -> Result<GapOffset, GpxLocateError> {
    let trimmed = input.trim();

    let (sign, clock) = if let Some(rest) = trimmed.strip_prefix('+') {
        (GapSign::Add, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (GapSign::Subtract, rest)
    } else {
        (GapSign::Add, trimmed)
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(GpxLocateError::MalformedGapString(input.to_string()));
    }

    let mut fields = [0u32; 3];
    for (field, raw) in fields.iter_mut().zip(&parts) {
        *field = raw
            .parse()
            .map_err(|_| GpxLocateError::MalformedGapString(input.to_string()))?;
    }

    let [hours, minutes, seconds] = fields;
    if minutes > 59 || seconds > 59 {
        return Err(GpxLocateError::MalformedGapString(input.to_string()));
    }

    Ok(GapOffset {
        magnitude: Duration::hours(i64::from(hours))
            + Duration::minutes(i64::from(minutes))
            + Duration::seconds(i64::from(seconds)),
        sign,
    })
}

/// Applies the clock offset to the target instant. No gap leaves the target
/// unchanged.
pub fn apply_gap(target: DateTime<Utc>, gap: Option<&GapOffset>) -> DateTime<Utc> {
    match gap {
        None => target,
        Some(gap) => match gap.sign {
            GapSign::Add => target + gap.magnitude,
            GapSign::Subtract => target - gap.magnitude,
        },
    }
}

/// Returns the track point whose timestamp is closest to the target, along
/// with the absolute difference in whole seconds.
///
/// Equal differences keep the earlier point, so the result is deterministic
/// under document order. Untimed points are skipped.
pub fn find_closest_point(
    track_points: &[TrackPoint],
    target: DateTime<Utc>,
) -> Result<SearchResult, GpxLocateError> {
    let mut best: Option<(i64, &TrackPoint)> = None;

    for point in track_points {
        let Some(time) = point.time else {
            continue;
        };

        let difference = (target.timestamp() - time.timestamp()).abs();

        if best.is_none_or(|(best_difference, _)| difference < best_difference) {
            best = Some((difference, point));
        }
    }

    match best {
        Some((difference, point)) => Ok(SearchResult {
            latitude: point.lat,
            longitude: point.lon,
            time_difference_seconds: difference as u64,
        }),
        None => Err(GpxLocateError::NoTimedPointsFound),
    }
}

/// Runs the full pipeline: extract track points, normalize the target time,
/// apply the gap, search for the closest point.
pub fn resolve(
    document: &str,
    target_time: &str,
    timezone: Tz,
    gap: Option<&str>,
) -> Result<SearchResult, GpxLocateError> {
    let track_points = gpxxml::extract_track_points(document.as_bytes())?;
    let target = parse_target_time(target_time, timezone)?;
    let gap = gap.map(parse_gap).transpose()?;

    find_closest_point(&track_points, apply_gap(target, gap.as_ref()))
}
