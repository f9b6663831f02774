use thiserror::Error;

/// Failure kinds of the lookup pipeline. Every stage fails fast; no partial
/// results are produced.
#[derive(Error, Debug, PartialEq)]
pub enum GpxLocateError {
    #[error("unable to parse document: {0}")]
    MalformedDocument(String),

    #[error("no track points found in document")]
    NoTrackPointsFound,

    #[error("unable to parse date/time string {0:?}")]
    MalformedTimestamp(String),

    #[error("unable to parse time gap {0:?}, expected [+|-]HH:MM:SS")]
    MalformedGapString(String),

    #[error("track contains no points with a usable timestamp")]
    NoTimedPointsFound,
}
