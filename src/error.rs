/// Failures the dashboard reports to the user instead of crashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    NoData,
    InvalidTicker(String),
    RateLimited,
    Upstream(String),
}

impl std::fmt::Display for DashboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => write!(f, "No data available for the selected stock and timeframe."),
            Self::InvalidTicker(t) => write!(f, "'{t}' is not a valid ticker symbol."),
            Self::RateLimited => write!(f, "The data source is rate limiting requests, try again shortly."),
            Self::Upstream(msg) => write!(f, "Data source error: {msg}"),
        }
    }
}

impl std::error::Error for DashboardError {}
