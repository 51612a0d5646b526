use std::thread;
use std::time::Duration;

/// A failed request. `status` is set when the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpFailure {
    pub(crate) status: Option<u16>,
    pub(crate) message: String,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
            attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

pub(crate) fn post_with_retries(
    url: &str,
    bearer_token: &str,
    content_type: &str,
    body: &str,
    policy: RetryPolicy,
) -> Result<String, HttpFailure> {
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(policy.connect_timeout)
            .timeout_read(policy.read_timeout)
            .timeout_write(policy.read_timeout)
            .build();

        let request = agent
            .post(url)
            .set("Authorization", &format!("Bearer {bearer_token}"))
            .set("Content-Type", content_type);

        match request.send_string(body) {
            Ok(response) => match response.into_string() {
                Ok(body) => return Ok(body),
                Err(err) => {
                    return Err(HttpFailure {
                        status: None,
                        message: format!("request failed: response decode failed: {err}"),
                    });
                }
            },
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body_text = response_body.trim();
                let status_error = if body_text.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = body_text.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if should_retry_http_status(status) && attempt < attempts {
                    log::warn!("POST {url} got {status}, retrying ({attempt}/{attempts})");
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                let message = if should_retry_http_status(status) {
                    format!("request failed after {attempts} attempt(s): {status_error}")
                } else {
                    format!("request failed: {status_error}")
                };
                return Err(HttpFailure {
                    status: Some(status),
                    message,
                });
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    log::warn!("POST {url} failed: {transport_error}, retrying ({attempt}/{attempts})");
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(HttpFailure {
                    status: None,
                    message: format!(
                        "request failed after {attempts} attempt(s): {transport_error}"
                    ),
                });
            }
        }
    }

    Err(HttpFailure {
        status: None,
        message: "request failed: exhausted attempts without a concrete error".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, StubServer};

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(200),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn retries_retryable_statuses_until_success() {
        let server = StubServer::spawn(vec![
            Reply::new(500, "server-error"),
            Reply::new(429, "throttled"),
            Reply::new(200, "ok"),
        ]);

        let result = post_with_retries(
            &server.base_url,
            "hf_test",
            "application/json",
            "{}",
            fast_policy(3),
        );

        assert_eq!(result.expect("should eventually succeed"), "ok");
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn sends_bearer_token_content_type_and_body() {
        let server = StubServer::spawn(vec![Reply::new(200, "ok")]);

        post_with_retries(
            &format!("{}/api/upload", server.base_url),
            "hf_secret",
            "application/x-ndjson",
            "{\"key\":\"header\"}\n",
            fast_policy(1),
        )
        .expect("request should succeed");

        let received = server.received();
        assert_eq!(received.len(), 1);
        let request = &received[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/upload");
        assert!(request.has_header("authorization: Bearer hf_secret"));
        assert!(request.has_header("content-type: application/x-ndjson"));
        assert_eq!(request.body, "{\"key\":\"header\"}\n");
    }

    #[test]
    fn does_not_retry_hard_client_errors() {
        let server = StubServer::spawn(vec![Reply::new(409, "exists"), Reply::new(200, "ok")]);

        let result = post_with_retries(
            &server.base_url,
            "hf_test",
            "application/json",
            "{}",
            fast_policy(5),
        );

        let err = result.expect_err("409 should not be retried");
        assert_eq!(err.status, Some(409));
        assert!(
            err.message.contains("HTTP status 409"),
            "unexpected error message: {}",
            err.message
        );
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn retries_transport_timeout_and_recovers() {
        let server = StubServer::spawn(vec![
            Reply::new(200, "slow").after(Duration::from_millis(150)),
            Reply::new(200, "ok"),
        ]);
        let policy = RetryPolicy {
            connect_timeout: Duration::from_millis(250),
            read_timeout: Duration::from_millis(30),
            attempts: 2,
            retry_delay: Duration::from_millis(1),
        };

        let result = post_with_retries(&server.base_url, "hf_test", "application/json", "{}", policy);

        assert_eq!(result.expect("timeout should be retried"), "ok");
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn returns_retry_exhausted_error_for_retryable_status() {
        let server = StubServer::spawn(vec![Reply::new(503, "down"), Reply::new(503, "still-down")]);

        let result = post_with_retries(
            &server.base_url,
            "hf_test",
            "application/json",
            "{}",
            fast_policy(2),
        );

        let err = result.expect_err("retryable failures should eventually error");
        assert!(
            err.message.contains("after 2 attempt(s)") && err.message.contains("HTTP status 503"),
            "unexpected error message: {}",
            err.message
        );
        assert_eq!(err.status, Some(503));
        assert_eq!(server.request_count(), 2);
    }
}
