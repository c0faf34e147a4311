use serde_json::Value;
use tracing::instrument;

use crate::{error::FetchError, model::LiveConditions, transport::Transport};

/// Fetch the regional readings document; it is kept verbatim.
#[instrument(skip(transport))]
pub async fn fetch_live(transport: &dyn Transport, url: &str) -> Result<LiveConditions, FetchError> {
    let document = transport.get_json(url).await?;
    parse_live(document)
}

pub fn parse_live(document: Value) -> Result<LiveConditions, FetchError> {
    match document {
        Value::Object(map) => Ok(LiveConditions(map)),
        other => Err(FetchError::parse(format!(
            "live conditions document is not an object: {other}"
        ))),
    }
}
