/// Problems found while folding raw stream input into turns.
///
/// These never escape [`LiveAggregator`](crate::LiveAggregator): it logs them
/// and leaves the offending input out of the view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    /// Fragment with a missing/blank id or an unknown role.
    #[error("malformed fragment ({}): {reason}", .id.as_deref().unwrap_or("<no id>"))]
    MalformedFragment { id: Option<String>, reason: String },
}

impl AggregationError {
    pub(crate) fn malformed(id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::MalformedFragment {
            id: id.map(ToOwned::to_owned),
            reason: reason.into(),
        }
    }
}

/// Invalid aggregator configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
