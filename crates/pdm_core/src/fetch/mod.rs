//! Offset/limit pagination over a remote collection.
//!
//! The remote source returns bounded pages plus a continuation flag. The
//! fetcher advances the offset by the page size after each page and stops
//! only when the flag is false; it never assumes a total count.

use serde_json::Value;
use tracing::debug;

use crate::domain::{IncidentFilters, TimeWindow};
use crate::error::{codes, AppError};

/// Largest page the remote API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One bounded page of raw records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub more: bool,
}

/// Transport seam. Implementations issue exactly one request per call and
/// surface transport failures unchanged; there is no retry at this layer.
pub trait PageSource {
    fn fetch_incident_page(
        &self,
        window: &TimeWindow,
        filters: &IncidentFilters,
        offset: u32,
        limit: u32,
    ) -> Result<Page, AppError>;

    fn fetch_log_entry_page(
        &self,
        incident_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page, AppError>;
}

pub fn validate_page_size(page_size: u32) -> Result<u32, AppError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::new(
            codes::FETCH_INVALID_PAGE_SIZE,
            format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
        )
        .with_details(format!("page_size={page_size}")));
    }
    Ok(page_size)
}

/// Lazy page-at-a-time iterator. Each call to [`paginate`] starts again at
/// offset 0; after an error or the last page the iterator is exhausted.
pub struct Pages<F> {
    fetch: F,
    offset: u32,
    limit: u32,
    // Set when `offset + limit` no longer fits in a `u32`.
    overflowed: bool,
    done: bool,
}

pub fn paginate<F>(limit: u32, fetch: F) -> Pages<F>
where
    F: FnMut(u32, u32) -> Result<Page, AppError>,
{
    Pages {
        fetch,
        offset: 0,
        limit,
        overflowed: false,
        done: false,
    }
}

impl<F> Iterator for Pages<F>
where
    F: FnMut(u32, u32) -> Result<Page, AppError>,
{
    type Item = Result<Vec<Value>, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.overflowed {
            self.done = true;
            return Some(Err(AppError::new(
                codes::FETCH_FAILED,
                "Source still reports more records past the largest page offset",
            )
            .with_details(format!("offset={}; limit={}", self.offset, self.limit))));
        }
        let offset = self.offset;
        match (self.fetch)(offset, self.limit) {
            Ok(page) => {
                debug!(
                    offset,
                    limit = self.limit,
                    records = page.records.len(),
                    more = page.more,
                    "fetched page"
                );
                if page.more {
                    match offset.checked_add(self.limit) {
                        Some(next) => self.offset = next,
                        None => self.overflowed = true,
                    }
                } else {
                    self.done = true;
                }
                Some(Ok(page.records))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Drain every page into one sequence in page order. Any page failure
/// discards what was already collected and returns the error.
pub fn fetch_all<F>(limit: u32, fetch: F) -> Result<Vec<Value>, AppError>
where
    F: FnMut(u32, u32) -> Result<Page, AppError>,
{
    let limit = validate_page_size(limit)?;
    let mut out = Vec::new();
    for page in paginate(limit, fetch) {
        out.extend(page?);
    }
    Ok(out)
}

pub fn fetch_incidents<S: PageSource + ?Sized>(
    source: &S,
    window: &TimeWindow,
    filters: &IncidentFilters,
    page_size: u32,
) -> Result<Vec<Value>, AppError> {
    fetch_all(page_size, |offset, limit| {
        source.fetch_incident_page(window, filters, offset, limit)
    })
}

pub fn fetch_log_entries<S: PageSource + ?Sized>(
    source: &S,
    incident_id: &str,
    page_size: u32,
) -> Result<Vec<Value>, AppError> {
    fetch_all(page_size, |offset, limit| {
        source.fetch_log_entry_page(incident_id, offset, limit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scripted(pages: Vec<Page>) -> impl FnMut(u32, u32) -> Result<Page, AppError> {
        let mut pages = pages.into_iter();
        move |_, _| Ok(pages.next().unwrap_or_default())
    }

    #[test]
    fn concatenates_pages_until_more_is_false() {
        let pages = vec![
            Page { records: vec![json!(1), json!(2)], more: true },
            Page { records: vec![json!(3), json!(4)], more: true },
            Page { records: vec![json!(5), json!(6)], more: true },
            Page { records: vec![json!(7)], more: false },
        ];
        let all = fetch_all(2, scripted(pages)).expect("fetch");
        assert_eq!(
            all,
            vec![json!(1), json!(2), json!(3), json!(4), json!(5), json!(6), json!(7)]
        );
    }

    #[test]
    fn offsets_advance_by_page_size() {
        let mut seen = Vec::new();
        let mut remaining = 3;
        fetch_all(25, |offset, limit| {
            seen.push((offset, limit));
            remaining -= 1;
            Ok(Page { records: vec![], more: remaining > 0 })
        })
        .expect("fetch");
        assert_eq!(seen, vec![(0, 25), (25, 25), (50, 25)]);
    }

    #[test]
    fn error_discards_partial_results() {
        let mut calls = 0;
        let err = fetch_all(10, |offset, _| {
            calls += 1;
            if offset == 0 {
                Ok(Page { records: vec![json!("a")], more: true })
            } else {
                Err(AppError::new(codes::FETCH_FAILED, "boom"))
            }
        })
        .unwrap_err();
        assert_eq!(err.code, codes::FETCH_FAILED);
        assert_eq!(calls, 2);
    }

    #[test]
    fn iterator_is_exhausted_after_error() {
        let mut pages = paginate(10, |_, _| -> Result<Page, AppError> {
            Err(AppError::new(codes::FETCH_FAILED, "down"))
        });
        assert!(matches!(pages.next(), Some(Err(_))));
        assert!(pages.next().is_none());
    }

    #[test]
    fn endless_source_fails_once_offset_overflows() {
        let mut seen = Vec::new();
        let mut pages = Pages {
            fetch: |offset: u32, _: u32| -> Result<Page, AppError> {
                seen.push(offset);
                Ok(Page { records: vec![json!(offset)], more: true })
            },
            offset: u32::MAX - 150,
            limit: 100,
            overflowed: false,
            done: false,
        };

        assert!(matches!(pages.next(), Some(Ok(_))));
        assert!(matches!(pages.next(), Some(Ok(_))));
        let err = match pages.next() {
            Some(Err(e)) => e,
            other => panic!("expected overflow error, got {other:?}"),
        };
        assert_eq!(err.code, codes::FETCH_FAILED);
        assert_eq!(
            err.details.as_deref(),
            Some(format!("offset={}; limit=100", u32::MAX - 50).as_str())
        );
        assert!(pages.next().is_none());
        drop(pages);
        assert_eq!(seen, vec![u32::MAX - 150, u32::MAX - 50]);
    }

    #[test]
    fn rejects_out_of_range_page_sizes() {
        assert_eq!(
            fetch_all(0, scripted(vec![])).unwrap_err().code,
            codes::FETCH_INVALID_PAGE_SIZE
        );
        assert!(fetch_all(MAX_PAGE_SIZE + 1, scripted(vec![])).is_err());
        assert!(validate_page_size(MAX_PAGE_SIZE).is_ok());
    }
}
