use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    error::FetchError,
    model::{Warning, WarningSet},
    transport::Transport,
};

/// Fetch active warnings.
///
/// Uses the warning information feed rather than the summary feed, since only
/// the former carries the pre-no.8 special announcement.
#[instrument(skip(transport))]
pub async fn fetch_warnings(transport: &dyn Transport, url: &str) -> Result<WarningSet, FetchError> {
    let document = transport.get_json(url).await?;
    Ok(reduce_warnings(&document))
}

/// Reduce the `details` list into a set keyed by statement code.
///
/// The feed omits `details` entirely when nothing is in force, so a missing
/// list is an empty set. Entries that don't look like warnings are skipped.
pub fn reduce_warnings(document: &Value) -> WarningSet {
    let Some(details) = document.get("details").and_then(Value::as_array) else {
        debug!("warning feed has no details list");
        return WarningSet::default();
    };

    details
        .iter()
        .filter_map(|detail| match Warning::deserialize(detail) {
            Ok(warning) => Some(warning),
            Err(e) => {
                warn!(error = %e, "skipping malformed warning entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_by_statement_code() {
        let set = reduce_warnings(&json!({
            "details": [
                { "warningStatementCode": "WTCSGNL", "subtype": "TC8NE", "contents": ["Gale."] },
                { "warningStatementCode": "WHOT", "contents": ["Hot."] }
            ]
        }));

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("WTCSGNL").and_then(|w| w.subtype.as_deref()), Some("TC8NE"));
        assert!(set.contains("WHOT"));
    }

    #[test]
    fn later_entry_overwrites_earlier() {
        let set = reduce_warnings(&json!({
            "details": [
                { "warningStatementCode": "WRAIN", "subtype": "WRAINA" },
                { "warningStatementCode": "WRAIN", "subtype": "WRAINR" }
            ]
        }));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("WRAIN").and_then(|w| w.subtype.as_deref()), Some("WRAINR"));
    }

    #[test]
    fn missing_details_is_empty() {
        assert!(reduce_warnings(&json!({})).is_empty());
        assert!(reduce_warnings(&json!({ "details": "none" })).is_empty());
    }

    #[test]
    fn entry_without_code_is_skipped() {
        let set = reduce_warnings(&json!({
            "details": [
                { "subtype": "TC1" },
                { "warningStatementCode": "WTS" }
            ]
        }));
        assert_eq!(set.len(), 1);
        assert!(set.contains("WTS"));
    }
}
