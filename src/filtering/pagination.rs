use super::Filter;
use crate::config::EngineConfig;

/// Offset and page size derived from a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: u64,
    pub take: u64,
}

impl Pagination {
    /// `skip = (page - 1) * limit`, with page 0 read as 1, limit 0 read as the
    /// configured default, and the limit capped at `max_limit` when one is set.
    #[must_use]
    pub fn from_filter(filter: &Filter, config: &EngineConfig) -> Self {
        let page = filter.page.unwrap_or(config.default_page).max(1);
        let mut take = match filter.limit {
            Some(0) | None => config.default_limit,
            Some(limit) => limit,
        };
        if let Some(max) = config.max_limit {
            take = take.min(max);
        }
        Self {
            skip: (page - 1).saturating_mul(take),
            take,
        }
    }
}
