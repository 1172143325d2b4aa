use async_trait::async_trait;

use super::error::TransportError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Longest redirect chain followed before giving up.
pub const MAX_REDIRECTS: usize = 10;
const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 307, 308];

/// Outermost stage. Follows redirects one hop at a time, each hop a full
/// trip through the inner stages, then turns any final status outside
/// `expected` into an error.
pub struct ResponseCheck<T> {
    inner: T,
    expected: Vec<u16>,
}

impl<T> ResponseCheck<T> {
    pub fn new(inner: T, expected: Vec<u16>) -> Self {
        Self { inner, expected }
    }
}

/// The request a redirect response points to, if it is one we can follow.
/// 307/308 keep method and body, the others turn into a plain GET.
fn redirect_target(req: &HttpRequest, resp: &HttpResponse) -> Result<Option<HttpRequest>, TransportError> {
    if !REDIRECT_STATUSES.contains(&resp.status) {
        return Ok(None);
    }
    let Some(location) = resp.location.as_deref() else {
        return Ok(None);
    };

    let target = reqwest::Url::parse(&resp.url)
        .and_then(|base| base.join(location))
        .map_err(|e| TransportError::Redirect {
            url: resp.url.clone(),
            reason: format!("bad location '{}': {}", location, e),
        })?;

    let keeps_body = matches!(resp.status, 307 | 308);
    Ok(Some(HttpRequest {
        method: if keeps_body { req.method } else { Method::Get },
        url: target.to_string(),
        query: Vec::new(),
        body: if keeps_body { req.body.clone() } else { None },
        activity: None,
    }))
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for ResponseCheck<T> {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = req;
        let mut resp = self.inner.send(req.clone()).await?;

        let mut hops = 0;
        while let Some(next) = redirect_target(&req, &resp)? {
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(TransportError::Redirect {
                    url: resp.url,
                    reason: format!("more than {} redirects", MAX_REDIRECTS),
                });
            }
            tracing::debug!(from = %resp.url, to = %next.url, status = resp.status, "Following redirect");
            req = next;
            resp = self.inner.send(req.clone()).await?;
        }

        if self.expected.contains(&resp.status) {
            Ok(resp)
        } else {
            Err(TransportError::UnexpectedStatus {
                url: resp.url,
                status: resp.status,
                expected: self.expected.clone(),
            })
        }
    }
}
