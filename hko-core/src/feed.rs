//! Fetch adapters, one per upstream resource.
//!
//! Each adapter issues exactly one GET through a [`Transport`](crate::Transport)
//! and turns the body into a typed structure. Parsing is split from fetching so
//! the wire formats can be exercised without a server.

pub mod forecast;
pub mod live;
pub mod station;
pub mod warnings;

pub use forecast::fetch_forecast;
pub use live::fetch_live;
pub use station::fetch_station;
pub use warnings::fetch_warnings;
