// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cursor pagination over Classroom list endpoints.
//!
//! Each endpoint carries its items under its own field name. [`ListEndpoint`]
//! names that field explicitly, and [`parse_page`] turns any raw page into the
//! same [`Page`] shape.

use crate::error::RemoteError;
use crate::services::classroom_api::{ClassroomApi, ListRequest};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Kinds of list endpoint the service drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEndpoint {
    Courses,
    Students,
    CourseWork,
    StudentSubmissions,
}

impl ListEndpoint {
    /// Response field holding this endpoint's items.
    pub fn items_field(&self) -> &'static str {
        match self {
            ListEndpoint::Courses => "courses",
            ListEndpoint::Students => "students",
            ListEndpoint::CourseWork => "courseWork",
            ListEndpoint::StudentSubmissions => "studentSubmissions",
        }
    }

    /// Split a raw page into its items and continuation cursor.
    ///
    /// Google omits the items field entirely on an empty page, and may send an
    /// empty `nextPageToken` on the last one; both are treated as absent.
    pub fn parse_page<T: DeserializeOwned>(&self, raw: Value) -> Result<Page<T>, RemoteError> {
        let Value::Object(mut body) = raw else {
            return Err(RemoteError::malformed(format!(
                "{} page is not a JSON object",
                self.items_field()
            )));
        };

        let items = match body.remove(self.items_field()) {
            None | Some(Value::Null) => Vec::new(),
            Some(items) => serde_json::from_value(items).map_err(|e| {
                RemoteError::malformed(format!("invalid {} page: {}", self.items_field(), e))
            })?,
        };

        let next_page_token = body
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Ok(Page {
            items,
            next_page_token,
        })
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Fetch every page of `request` and concatenate the items in order.
///
/// Any page failure aborts the drain; no partial result is returned.
pub async fn drain_pages<C, T>(client: &C, request: &ListRequest) -> Result<Vec<T>, RemoteError>
where
    C: ClassroomApi,
    T: DeserializeOwned,
{
    let endpoint = request.endpoint();
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let raw = client.list_page(request, page_token.as_deref()).await?;
        let page: Page<T> = endpoint.parse_page(raw)?;
        pages += 1;
        items.extend(page.items);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    tracing::debug!(
        endpoint = endpoint.items_field(),
        pages,
        items = items.len(),
        "Drained list endpoint"
    );

    Ok(items)
}
