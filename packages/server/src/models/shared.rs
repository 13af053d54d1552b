use serde::Deserialize;

/// Query parameter for endpoints returning a short top-N list.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LimitParams {
    /// Number of items to return.
    #[param(example = 10)]
    pub limit: Option<u64>,
}

impl LimitParams {
    /// `limit` clamped to `1..=max`, or `default` when absent.
    pub fn resolve(&self, default: u64, max: u64) -> u64 {
        self.limit.unwrap_or(default).clamp(1, max.max(1))
    }
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
