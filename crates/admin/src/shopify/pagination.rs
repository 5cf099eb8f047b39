//! REST cursor pagination through the `Link` response header.

use reqwest::header::{HeaderMap, LINK};
use url::Url;

/// URL of the next page, from a header such as
/// `<https://…?page_info=abc>; rel="previous", <https://…?page_info=def>; rel="next"`.
#[must_use]
pub fn next_page_url(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .is_some_and(|rel| rel.trim_matches('"') == "next")
        });
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(link).unwrap_or(HeaderValue::from_static("")));
        headers
    }

    #[test]
    fn test_next_link_only() {
        let h = headers(
            r#"<https://shop.myshopify.com/admin/api/2025-01/products.json?limit=250&page_info=abc>; rel="next""#,
        );
        let next = next_page_url(&h).map(|u| u.to_string());
        assert_eq!(
            next.as_deref(),
            Some("https://shop.myshopify.com/admin/api/2025-01/products.json?limit=250&page_info=abc")
        );
    }

    #[test]
    fn test_previous_and_next() {
        let h = headers(
            r#"<https://s.myshopify.com/p.json?page_info=prev>; rel="previous", <https://s.myshopify.com/p.json?page_info=next>; rel="next""#,
        );
        let next = next_page_url(&h);
        assert_eq!(next.and_then(|u| u.query().map(str::to_string)).as_deref(), Some("page_info=next"));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let h = headers(r#"<https://s.myshopify.com/p.json?page_info=prev>; rel="previous""#);
        assert!(next_page_url(&h).is_none());
        assert!(next_page_url(&HeaderMap::new()).is_none());
    }
}
