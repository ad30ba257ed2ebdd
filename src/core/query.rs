//! Query parameters and pagination utilities

use crate::core::error::ViewError;
use crate::core::repository::Repository;
use crate::core::resource::{Resource, Scope};
use axum::extract::{FromRequestParts, OriginalUri, Query};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Query parameters for limit/offset pagination
///
/// # Example
/// ```text
/// GET /stores?limit=10&offset=20
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    /// Number of items per page
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Number of items to skip
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Page envelope returned by list operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of items in the scope
    pub count: u64,

    /// Link to the next page
    pub next: Option<String>,

    /// Link to the previous page
    pub previous: Option<String>,

    /// Items on this page
    pub result: Vec<T>,
}

impl<T> Page<T> {
    /// Convert every item of the page
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            result: self.result.into_iter().map(f).collect(),
        }
    }
}

/// Pagination request extracted from the URL
///
/// Carries the request path so it can build `next`/`previous` links.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub path: String,
    pub params: PageParams,
}

impl Pagination {
    pub const MAX_LIMIT: usize = 100;

    pub fn new(path: impl Into<String>, params: PageParams) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }

    /// Limit clamped between 1 and [`Self::MAX_LIMIT`]
    pub fn limit(&self) -> usize {
        self.params.limit.clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.params.offset
    }

    fn link(&self, offset: usize) -> String {
        format!("{}?limit={}&offset={}", self.path, self.limit(), offset)
    }

    /// Wrap a slice of results into a page envelope
    pub fn envelope<T>(&self, count: u64, result: Vec<T>) -> Page<T> {
        let limit = self.limit();
        let offset = self.offset();

        let end = offset.saturating_add(limit);
        let next = ((end as u64) < count).then(|| self.link(end));
        let previous = (offset > 0).then(|| self.link(offset.saturating_sub(limit)));

        Page {
            count,
            next,
            previous,
            result,
        }
    }

    /// Page a scope of a repository
    pub async fn paginate<R: Resource>(
        &self,
        repository: &dyn Repository<R>,
        scope: &Scope,
    ) -> Result<Page<R::Display>, ViewError> {
        let count = repository.count(scope).await?;
        let items = repository
            .fetch_page(scope, self.offset(), self.limit())
            .await?;

        Ok(self
            .envelope(count, items)
            .map(<R::Display as From<R>>::from))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Pagination {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<PageParams>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(Self { path, params })
    }
}
