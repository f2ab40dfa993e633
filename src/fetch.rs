use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

use crate::error::{FetchError, Result, ScrapeError};

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// Thin GET wrapper around a shared reqwest client. Cloning is cheap and all
/// clones share one connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| ScrapeError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// GET `url` and return the body as text. Anything but a 2xx is an error.
    ///
    /// The body is decoded with the response charset (UTF-8 when absent) and
    /// invalid sequences become U+FFFD, so any byte stream yields a page.
    pub async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await.map_err(FetchError::Parse)?;
        debug!(
            "Fetched {} ({} bytes in {}ms)",
            url,
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new("test-agent/1.0", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x86/add"))
            .and(header("user-agent", "test-agent/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ADD</h1>"))
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&format!("{}/x86/add", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<h1>ADD</h1>");
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 404));
        assert_eq!(err.to_string(), "bad status: 404 Not Found");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<h1>ADD\xff</h1>".to_vec()))
            .mount(&server)
            .await;

        let body = fetcher().fetch(&server.uri()).await.unwrap();
        assert_eq!(body, "<h1>ADD\u{FFFD}</h1>");
    }

    #[tokio::test]
    async fn declared_charset_is_honoured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=iso-8859-1")
                    .set_body_bytes(b"<p>caf\xe9</p>".to_vec()),
            )
            .mount(&server)
            .await;

        let body = fetcher().fetch(&server.uri()).await.unwrap();
        assert_eq!(body, "<p>caf\u{e9}</p>");
    }

    #[tokio::test]
    async fn timeout_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let slow = Fetcher::new("test-agent/1.0", Duration::from_millis(50)).unwrap();
        let err = slow.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
