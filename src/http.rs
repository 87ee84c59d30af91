use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::Value;

fn retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// GET `url` with `query` attached and decode the body as JSON. Transient
/// failures (408/429/5xx, transport errors) are retried up to `attempts`
/// times with `retry_delay` between tries; hard client errors are not.
pub(crate) fn get_json_with_retries(
    url: &str,
    query: &[(String, String)],
    connect_timeout: Duration,
    read_timeout: Duration,
    attempts: usize,
    retry_delay: Duration,
) -> Result<Value> {
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();

        let mut request = agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        let failure = match request.call() {
            Ok(response) => {
                let body = response
                    .into_string()
                    .map_err(|err| anyhow!("request failed: response decode failed: {err}"))?;
                return serde_json::from_str(&body)
                    .map_err(|err| anyhow!("request failed: body is not valid JSON: {err}"));
            }
            Err(ureq::Error::Status(status, response)) => {
                let snippet = response
                    .into_string()
                    .ok()
                    .map(|body| body.trim().chars().take(200).collect::<String>())
                    .filter(|body| !body.is_empty());
                let detail = match snippet {
                    Some(body) => format!("HTTP status {status} ({body})"),
                    None => format!("HTTP status {status}"),
                };
                if !retryable_status(status) {
                    return Err(anyhow!("request failed: {detail}"));
                }
                detail
            }
            Err(ureq::Error::Transport(err)) => format!("transport error: {err}"),
        };

        if attempt < attempts {
            thread::sleep(retry_delay);
            continue;
        }
        return Err(anyhow!("request failed after {attempts} attempt(s): {failure}"));
    }

    Err(anyhow!("request failed: exhausted attempts"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubResponse {
        delay: Duration,
        status: u16,
        body: &'static str,
    }

    impl StubResponse {
        fn ok(body: &'static str) -> Self {
            Self {
                delay: Duration::ZERO,
                status: 200,
                body,
            }
        }

        fn status(status: u16, body: &'static str) -> Self {
            Self {
                delay: Duration::ZERO,
                status,
                body,
            }
        }

        fn slow(delay: Duration, body: &'static str) -> Self {
            Self {
                delay,
                status: 200,
                body,
            }
        }
    }

    struct StubServer {
        base_url: String,
        hits: Arc<AtomicUsize>,
    }

    impl StubServer {
        fn serve(responses: Vec<StubResponse>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind stub server");
            let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_handle = Arc::clone(&hits);

            // One connection per queued response; each connection gets its
            // own thread so a delayed reply cannot block a retry. The
            // listener drops after the last accept, refusing any request the
            // test did not budget for.
            std::thread::spawn(move || {
                for response in responses {
                    let Ok((mut stream, _)) = listener.accept() else {
                        break;
                    };
                    hits_handle.fetch_add(1, Ordering::SeqCst);
                    std::thread::spawn(move || {
                        let mut buf = [0_u8; 2048];
                        let _ = stream
                            .set_read_timeout(Some(Duration::from_millis(200)))
                            .and_then(|_| stream.read(&mut buf).map(|_| ()));
                        std::thread::sleep(response.delay);
                        let reply = format!(
                            "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.status,
                            response.body.len(),
                            response.body
                        );
                        let _ = stream.write_all(reply.as_bytes());
                        let _ = stream.flush();
                    });
                }
            });

            Self { base_url, hits }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn query() -> Vec<(String, String)> {
        vec![("api_key".to_string(), "k".to_string())]
    }

    fn fetch(server: &StubServer, attempts: usize) -> Result<Value> {
        get_json_with_retries(
            &server.base_url,
            &query(),
            Duration::from_millis(250),
            Duration::from_millis(250),
            attempts,
            Duration::from_millis(1),
        )
    }

    #[test]
    fn decodes_json_body_on_success() {
        let server = StubServer::serve(vec![StubResponse::ok(r#"{"results":[1,2]}"#)]);
        let value = fetch(&server, 3).expect("request should succeed");
        assert_eq!(value.pointer("/results/1").and_then(Value::as_u64), Some(2));
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn retries_transient_statuses_until_success() {
        let server = StubServer::serve(vec![
            StubResponse::status(503, "down"),
            StubResponse::status(429, "throttled"),
            StubResponse::ok("{}"),
        ]);
        fetch(&server, 3).expect("should recover after retries");
        assert_eq!(server.hits(), 3);
    }

    #[test]
    fn does_not_retry_hard_client_errors() {
        let server = StubServer::serve(vec![StubResponse::status(404, "missing")]);
        let err = fetch(&server, 5).expect_err("404 should fail immediately");
        assert!(
            err.to_string().contains("HTTP status 404"),
            "unexpected error: {err}"
        );
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn retries_read_timeout_and_recovers() {
        let server = StubServer::serve(vec![
            StubResponse::slow(Duration::from_millis(400), "{}"),
            StubResponse::ok("{}"),
        ]);
        let result = get_json_with_retries(
            &server.base_url,
            &query(),
            Duration::from_millis(250),
            Duration::from_millis(50),
            2,
            Duration::from_millis(1),
        );
        result.expect("timeout should be retried");
        assert_eq!(server.hits(), 2);
    }

    #[test]
    fn reports_attempt_count_when_retries_are_exhausted() {
        let server = StubServer::serve(vec![
            StubResponse::status(500, "boom"),
            StubResponse::status(500, "boom"),
        ]);
        let err = fetch(&server, 2).expect_err("persistent 500 should error");
        let message = err.to_string();
        assert!(
            message.contains("after 2 attempt(s)") && message.contains("HTTP status 500"),
            "unexpected error: {message}"
        );
        assert_eq!(server.hits(), 2);
    }

    #[test]
    fn invalid_json_body_is_a_hard_failure() {
        let server = StubServer::serve(vec![StubResponse::ok("<html>not json</html>")]);
        let err = fetch(&server, 3).expect_err("non-JSON body should fail");
        assert!(
            err.to_string().contains("not valid JSON"),
            "unexpected error: {err}"
        );
        assert_eq!(server.hits(), 1);
    }
}
