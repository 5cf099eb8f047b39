//! Active product listing.

use async_stream::stream;
use futures::Stream;

use super::types::{ProductsPage, RestProduct};
use super::{ShopifyClient, ShopifyError, next_page_url};

const PAGE_LIMIT: &str = "250";

impl ShopifyClient {
    /// Lazily list active products, one page per item.
    ///
    /// Each page is one request; the next page URL comes from the `Link`
    /// header. The stream ends after the last page or the first error.
    pub fn list_active_products<'a>(
        &'a self,
        product_type: Option<&'a str>,
    ) -> impl Stream<Item = Result<Vec<RestProduct>, ShopifyError>> + 'a {
        stream! {
            let mut url = match self.endpoint("products.json") {
                Ok(mut url) => {
                    {
                        let mut query = url.query_pairs_mut();
                        query.append_pair("status", "active");
                        query.append_pair("limit", PAGE_LIMIT);
                        if let Some(product_type) = product_type {
                            query.append_pair("product_type", product_type);
                        }
                    }
                    url
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            loop {
                let response = match self.get(&url).await {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                let next = next_page_url(response.headers());

                let page = match response.text().await {
                    Ok(body) => serde_json::from_str::<ProductsPage>(&body).map_err(ShopifyError::from),
                    Err(e) => Err(ShopifyError::from(e)),
                };
                match page {
                    Ok(page) => yield Ok(page.products),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }

                match next {
                    Some(next) => url = next,
                    None => break,
                }
            }
        }
    }
}
