use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};

use crate::TrackPoint;
use crate::error::GpxLocateError;

/// Extracts all track points from a GPX document, in document order.
///
/// Point elements are matched by local name within the default namespace
/// declared on the root element, so the document-wide query works regardless
/// of how tracks and segments are nested. `lat` and `lon` attributes are
/// required; the `time` child is optional and points without one are kept
/// with an empty timestamp.
pub fn extract_track_points(input: &[u8]) -> Result<Vec<TrackPoint>, GpxLocateError> {
    let mut reader = NsReader::from_reader(input);
    let mut buf = Vec::new();
    let mut track_points = Vec::new();

    let mut gpx_ns: Option<Vec<u8>> = None;
    let mut current_point: Option<TrackPoint> = None;
    let mut in_time_element = false;
    let mut time_text = String::new();

    loop {
        let (ns, event) = match reader.read_resolved_event_into(&mut buf) {
            Err(e) => {
                return Err(GpxLocateError::MalformedDocument(format!(
                    "error at position {}: {:?}",
                    reader.buffer_position(),
                    e
                )));
            }
            Ok((_, Event::Eof)) => break,
            Ok((ns, event)) => (element_namespace(ns), event.into_owned()),
        };

        match event {
            Event::Start(ref e) => {
                if gpx_ns.is_none() {
                    gpx_ns = Some(default_namespace(e)?);
                }

                if ns == gpx_ns {
                    if e.local_name().as_ref() == b"trkpt" {
                        current_point = Some(TrackPoint {
                            lat: coordinate_attr(e, "lat")?,
                            lon: coordinate_attr(e, "lon")?,
                            time: None,
                        });
                    } else if current_point.is_some() && e.local_name().as_ref() == b"time" {
                        in_time_element = true;
                        time_text.clear();
                    }
                }
            }

            Event::Empty(ref e) => {
                if gpx_ns.is_none() {
                    gpx_ns = Some(default_namespace(e)?);
                }

                // A self-closing trkpt is a point without a timestamp.
                if ns == gpx_ns && e.local_name().as_ref() == b"trkpt" {
                    track_points.push(TrackPoint {
                        lat: coordinate_attr(e, "lat")?,
                        lon: coordinate_attr(e, "lon")?,
                        time: None,
                    });
                }
            }

            Event::End(ref e) => {
                if ns == gpx_ns {
                    if e.local_name().as_ref() == b"trkpt" {
                        if let Some(point) = current_point.take() {
                            track_points.push(point);
                        }
                    } else if e.local_name().as_ref() == b"time" && in_time_element {
                        in_time_element = false;
                        if let Some(point) = current_point.as_mut() {
                            point.time = parse_point_time(time_text.trim());
                        }
                    }
                }
            }

            Event::Text(ref e) => {
                if in_time_element
                    && current_point.is_some()
                    && let Ok(text) = std::str::from_utf8(e)
                {
                    time_text.push_str(text);
                }
            }

            _ => {}
        }

        buf.clear();
    }

    if gpx_ns.is_none() {
        return Err(GpxLocateError::MalformedDocument(
            "document contains no root element".to_string(),
        ));
    }

    if track_points.is_empty() {
        return Err(GpxLocateError::NoTrackPointsFound);
    }

    Ok(track_points)
}

fn element_namespace(resolution: ResolveResult<'_>) -> Option<Vec<u8>> {
    match resolution {
        ResolveResult::Bound(Namespace(uri)) => Some(uri.to_vec()),
        _ => None,
    }
}

fn default_namespace(root: &BytesStart) -> Result<Vec<u8>, GpxLocateError> {
    for attr in root.attributes().flatten() {
        if attr.key.as_ref() == b"xmlns" {
            return Ok(attr.value.into_owned());
        }
    }

    Err(GpxLocateError::MalformedDocument(
        "no default namespace declared on the root element".to_string(),
    ))
}

fn coordinate_attr(point: &BytesStart, name: &str) -> Result<f64, GpxLocateError> {
    for attr in point.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return std::str::from_utf8(&attr.value)
                .ok()
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| {
                    GpxLocateError::MalformedDocument(format!(
                        "invalid {name} attribute on trkpt"
                    ))
                });
        }
    }

    Err(GpxLocateError::MalformedDocument(format!(
        "trkpt is missing the {name} attribute"
    )))
}

// GPX times are ISO 8601; timestamps without an offset are taken as UTC.
// An unparsable value is treated like a missing one.
fn parse_point_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
