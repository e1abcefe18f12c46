use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::validation::MAX_PAGE_LIMIT;

/// A validated `page`/`limit` pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl PageQuery {
    pub fn parse(page: Option<u32>, limit: Option<u32>) -> Result<Self> {
        let page = match page {
            Some(page) if page > 0 => page,
            _ => return Err(Error::invalid_input("You must provide a valid page number as a query")),
        };
        let limit = match limit {
            Some(limit) if limit > 0 => limit,
            _ => return Err(Error::invalid_input("You must provide a valid limit number as a query")),
        };
        if limit > MAX_PAGE_LIMIT {
            return Err(Error::invalid_input(format!(
                "You cannot query more than {MAX_PAGE_LIMIT} resources at once"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRef {
    pub page: u32,
    pub limit: u32,
}

/// Where a page sits within a result set of `total` resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub query: PageQuery,
    pub total: u64,
}

impl PageWindow {
    /// Fails with `NotFound` when the set is empty or the page lies past its end.
    pub fn new(query: PageQuery, total: u64, resource: &str) -> Result<Self> {
        if total == 0 {
            return Err(Error::not_found(format!("{resource} not found")));
        }
        if u64::from(query.page) > page_count(total, query.limit) {
            return Err(Error::not_found("Page not found"));
        }
        Ok(Self { query, total })
    }

    pub fn offset(&self) -> u64 {
        self.query.offset()
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.query.limit)
    }

    pub fn previous(&self) -> Option<PageRef> {
        (self.query.page > 1).then(|| PageRef { page: self.query.page - 1, limit: self.query.limit })
    }

    pub fn next(&self) -> Option<PageRef> {
        let end = u64::from(self.query.page) * u64::from(self.query.limit);
        (end < self.total).then(|| PageRef { page: self.query.page + 1, limit: self.query.limit })
    }

    pub fn last(&self) -> PageRef {
        let pages = page_count(self.total, self.query.limit);
        PageRef {
            page: u32::try_from(pages).unwrap_or(u32::MAX),
            limit: self.query.limit,
        }
    }
}

fn page_count(total: u64, limit: u32) -> u64 {
    total.div_ceil(u64::from(limit)).max(1)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub resources: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    pub last: PageRef,
}

impl<T> Page<T> {
    pub fn new(resources: Vec<T>, window: &PageWindow) -> Self {
        Self {
            resources,
            previous: window.previous(),
            next: window.next(),
            last: window.last(),
        }
    }
}
