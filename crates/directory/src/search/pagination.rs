//! Length-aware pagination in the shape directory clients already consume.

use serde::Serialize;
use url::form_urlencoded;

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub current_page: u64,
    pub data: Vec<T>,
    pub first_page_url: String,
    /// 1-based position of the first item, `None` for an empty page.
    pub from: Option<u64>,
    pub last_page: u64,
    pub last_page_url: String,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: u32,
    pub prev_page_url: Option<String>,
    pub to: Option<u64>,
    pub total: u64,
}

/// Builds page URLs from the caller's query with only `page` replaced.
#[derive(Debug, Clone)]
pub struct PageLinks<'a> {
    path: &'a str,
    query_pairs: &'a [(String, String)],
}

impl<'a> PageLinks<'a> {
    #[must_use]
    pub const fn new(path: &'a str, query_pairs: &'a [(String, String)]) -> Self {
        Self { path, query_pairs }
    }

    /// URL of `page`.
    #[must_use]
    pub fn url(&self, page: u64) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.query_pairs {
            query.append_pair(key, value);
        }
        query.append_pair("page", &page.to_string());
        format!("{}?{}", self.path, query.finish())
    }
}

impl<T> Page<T> {
    /// Assemble a page. `data` is the slice of results starting at item
    /// `(current_page - 1) * per_page`.
    #[must_use]
    pub fn new(
        data: Vec<T>,
        total: u64,
        current_page: u64,
        per_page: u32,
        links: &PageLinks<'_>,
    ) -> Self {
        let per_page_wide = u64::from(per_page.max(1));
        let last_page = total.div_ceil(per_page_wide).max(1);
        let offset = current_page.saturating_sub(1).saturating_mul(per_page_wide);

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (Some(offset + 1), Some(offset + data.len() as u64))
        };

        Self {
            first_page_url: links.url(1),
            last_page_url: links.url(last_page),
            next_page_url: (current_page < last_page).then(|| links.url(current_page + 1)),
            prev_page_url: (current_page > 1).then(|| links.url(current_page - 1)),
            path: links.path.to_string(),
            current_page,
            data,
            from,
            last_page,
            per_page,
            to,
            total,
        }
    }

    /// Whether pages exist after this one.
    #[must_use]
    pub const fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<(String, String)> {
        vec![
            ("filter[city]".to_string(), "Berlin".to_string()),
            ("filter[limit]".to_string(), "5".to_string()),
        ]
    }

    #[test]
    fn test_first_of_two_pages() {
        let pairs = pairs();
        let links = PageLinks::new("http://localhost:3000/api/shops/search", &pairs);
        let page = Page::new(vec![1, 2, 3, 4, 5], 7, 1, 5, &links);

        assert_eq!(page.last_page, 2);
        assert!(page.has_more_pages());
        assert_eq!((page.from, page.to), (Some(1), Some(5)));
        assert_eq!(page.prev_page_url, None);
        assert_eq!(
            page.next_page_url.as_deref(),
            Some("http://localhost:3000/api/shops/search?filter%5Bcity%5D=Berlin&filter%5Blimit%5D=5&page=2")
        );
    }

    #[test]
    fn test_last_page() {
        let pairs = pairs();
        let links = PageLinks::new("/api/shops/search", &pairs);
        let page = Page::new(vec![6, 7], 7, 2, 5, &links);

        assert!(!page.has_more_pages());
        assert_eq!(page.next_page_url, None);
        assert!(page.prev_page_url.unwrap().ends_with("page=1"));
        assert_eq!((page.from, page.to), (Some(6), Some(7)));
    }

    #[test]
    fn test_empty_result() {
        let links = PageLinks::new("/api/shops/search", &[]);
        let page: Page<u8> = Page::new(Vec::new(), 0, 1, 20, &links);

        assert_eq!(page.last_page, 1);
        assert_eq!((page.from, page.to), (None, None));
        assert_eq!(page.first_page_url, "/api/shops/search?page=1");
    }
}
