use std::{fmt, time::Duration};

use thiserror::Error;

/// The four upstream resources polled on every refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Station,
    Forecast,
    Live,
    Warnings,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Station => "station",
            Feed::Forecast => "forecast",
            Feed::Live => "live",
            Feed::Warnings => "warnings",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single fetch adapter.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, client timeout or a broken body stream.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} returned status {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("no record for '{0}' in response")]
    NotFound(String),
}

impl FetchError {
    pub fn parse(message: impl Into<String>) -> Self {
        FetchError::Parse(message.into())
    }

    /// Whether the failure happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// Failure of a whole refresh cycle. The previously published snapshot stays current.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to fetch {feed} feed: {source}")]
    Fetch {
        feed: Feed,
        #[source]
        source: FetchError,
    },

    #[error("refresh did not complete within {}s", budget.as_secs())]
    Timeout { budget: Duration },

    #[error("coordinator has been torn down")]
    Stopped,
}

impl RefreshError {
    pub fn fetch(feed: Feed) -> impl FnOnce(FetchError) -> Self {
        move |source| RefreshError::Fetch { feed, source }
    }
}
