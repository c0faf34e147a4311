use std::collections::BTreeMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::instrument;

use crate::{
    derive,
    error::FetchError,
    model::StationObservation,
    transport::Transport,
};

/// Column holding the station code.
pub const STATION_COLUMN: &str = "STN";

/// Fetch the automatic weather station readings and select one station.
#[instrument(skip(transport))]
pub async fn fetch_station(
    transport: &dyn Transport,
    url: &str,
    station_id: &str,
) -> Result<StationObservation, FetchError> {
    let body = transport.get_text(url).await?;
    parse_station_feed(&body, station_id)
}

/// Parse the header line plus CSV table and return the row for `station_id`.
///
/// When a station appears more than once the last row wins.
pub fn parse_station_feed(body: &str, station_id: &str) -> Result<StationObservation, FetchError> {
    let (header_line, table) = body
        .split_once('\n')
        .ok_or_else(|| FetchError::parse("station feed has no data table"))?;

    let last_updated = derive::parse_station_header(header_line).ok_or_else(|| {
        FetchError::parse(format!("unrecognised station feed header: {}", header_line.trim()))
    })?;

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(table.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FetchError::parse(format!("station table header: {e}")))?
        .clone();

    let stn = headers
        .iter()
        .position(|h| h == STATION_COLUMN)
        .ok_or_else(|| FetchError::parse(format!("station table has no {STATION_COLUMN} column")))?;

    let mut selected: Option<StringRecord> = None;
    for record in reader.records() {
        let record = record.map_err(|e| FetchError::parse(format!("station table row: {e}")))?;
        if record.get(stn) == Some(station_id) {
            selected = Some(record);
        }
    }

    let record = selected.ok_or_else(|| FetchError::NotFound(station_id.to_string()))?;

    let readings: BTreeMap<String, String> = headers
        .iter()
        .zip(record.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Ok(StationObservation {
        station_id: station_id.to_string(),
        last_updated,
        readings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "Latest readings recorded at 14:30 Hong Kong Time 05 June 2024\r\n\
        STN,NAME,TEMP,RH,PRESSURE,WINDDIRECTION,WINDSPEED,GUST,VISIBILITY\r\n\
        HKO,Hong Kong Observatory,29.1,78,1006.2,90,12,25,10000\r\n\
        KP,King's Park,28.7,80,,,,,\r\n\
        \r\n";

    #[test]
    fn selects_present_station() {
        let obs = parse_station_feed(FEED, "HKO").expect("HKO should be present");

        assert_eq!(obs.station_id, "HKO");
        assert_eq!(obs.get("TEMP"), Some("29.1"));
        assert_eq!(obs.get("NAME"), Some("Hong Kong Observatory"));
        assert_eq!(obs.number("VISIBILITY"), Some(10000.0));
        assert_eq!(obs.last_updated.to_rfc3339(), "2024-06-05T06:30:00+00:00");
    }

    #[test]
    fn selects_exactly_the_requested_row() {
        let obs = parse_station_feed(FEED, "KP").expect("KP should be present");
        assert_eq!(obs.get("STN"), Some("KP"));
        assert_eq!(obs.get("TEMP"), Some("28.7"));
        assert_eq!(obs.number("PRESSURE"), None);
    }

    #[test]
    fn absent_station_is_not_found() {
        let err = parse_station_feed(FEED, "XYZ").unwrap_err();
        assert!(matches!(err, FetchError::NotFound(ref id) if id == "XYZ"));
    }

    #[test]
    fn later_duplicate_row_wins() {
        let feed = "Latest readings recorded at 09:00 Hong Kong Time 01 January 2024\n\
            STN,TEMP\nHKO,15.0\nHKO,15.5\n";
        let obs = parse_station_feed(feed, "HKO").expect("HKO should be present");
        assert_eq!(obs.get("TEMP"), Some("15.5"));
    }

    #[test]
    fn malformed_header_line_is_parse_error() {
        let feed = "Readings delayed\nSTN,TEMP\nHKO,29.1\n";
        let err = parse_station_feed(feed, "HKO").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn missing_table_is_parse_error() {
        let err =
            parse_station_feed("Latest readings recorded at 14:30 Hong Kong Time 05 June 2024", "HKO")
                .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn missing_station_column_is_parse_error() {
        let feed = "Latest readings recorded at 14:30 Hong Kong Time 05 June 2024\nCODE,TEMP\nHKO,29.1\n";
        let err = parse_station_feed(feed, "HKO").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn ragged_row_is_parse_error() {
        let feed = "Latest readings recorded at 14:30 Hong Kong Time 05 June 2024\nSTN,TEMP\nHKO,29.1,extra\n";
        let err = parse_station_feed(feed, "HKO").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
