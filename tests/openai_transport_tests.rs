//! Tests for the OpenAI streaming transport against a local mock server.

use parley::config::{ApiType, OpenAiConfig};
use parley::error::{ErrorCategory, ParleyError};
use parley::provider::openai::OpenAiClient;
use parley::provider::ChatBackend;
use parley::types::{ChatMessage, Fragment};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(events: &[serde_json::Value], done: bool) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str(&format!("data: {event}\n\n"));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

fn delta(content: &str) -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]})
}

fn client(base_url: String) -> OpenAiClient {
    OpenAiClient::new(OpenAiConfig {
        api_key: Some("sk-test".into()),
        base_url: Some(base_url),
        model: "gpt-3.5-turbo".into(),
        ..Default::default()
    })
    .unwrap()
}

fn history() -> Vec<ChatMessage> {
    vec![ChatMessage::system("sys"), ChatMessage::user("hi")]
}

async fn collect(client: &mut OpenAiClient, first: Fragment) -> Result<String, ParleyError> {
    let mut text = first.text;
    let mut is_final = first.is_final;
    while !is_final {
        let fragment = client.receive_next().await?;
        text.push_str(&fragment.text);
        is_final = fragment.is_final;
    }
    Ok(text)
}

#[tokio::test]
async fn streams_deltas_until_done() {
    let server = MockServer::start().await;
    let body = sse(
        &[
            json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]}),
            delta("Hel"),
            delta("lo"),
            json!({"choices": [], "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}}),
        ],
        true,
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "stream": true,
            "n": 1,
            "max_tokens": 1024,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(format!("{}/v1", server.uri()));
    let first = client.send(&history()).await.unwrap();
    assert_eq!(first, Fragment::delta(""));

    let text = collect(&mut client, first).await.unwrap();
    assert_eq!(text, "Hello");
    assert_eq!(client.tokens_used(), 11);
    assert!(matches!(
        client.receive_next().await,
        Err(ParleyError::InvalidState(_))
    ));
}

#[tokio::test]
async fn stream_without_done_marker_still_ends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse(&[delta("bye")], false), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut client = client(server.uri());
    let first = client.send(&history()).await.unwrap();
    assert_eq!(collect(&mut client, first).await.unwrap(), "bye");
    assert_eq!(client.tokens_used(), 0);
}

#[tokio::test]
async fn server_errors_are_retried_three_times() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(3)
        .mount(&server)
        .await;

    let mut client = client(server.uri());
    let err = client.send(&history()).await.unwrap_err();
    match &err {
        ParleyError::Api { status, .. } => assert_eq!(*status, 500),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::Server);
}

#[tokio::test]
async fn authentication_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(server.uri());
    let err = client.send(&history()).await.unwrap_err();
    assert!(matches!(err, ParleyError::Authentication(ref m) if m.contains("Incorrect API key")));
}

#[tokio::test]
async fn rate_limit_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "slow down", "type": "requests", "retry_after": 1.5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(server.uri());
    let err = client.send(&history()).await.unwrap_err();
    assert!(matches!(
        err,
        ParleyError::RateLimited {
            retry_after_ms: Some(1500)
        }
    ));
}

#[tokio::test]
async fn in_band_error_ends_the_stream() {
    let server = MockServer::start().await;
    let body = sse(
        &[
            delta("part"),
            json!({"error": {"message": "The server had an error", "type": "server_error"}}),
            delta("never"),
        ],
        true,
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(server.uri());
    let first = client.send(&history()).await.unwrap();
    assert_eq!(first.text, "part");

    let err = client.receive_next().await.unwrap_err();
    assert!(matches!(err, ParleyError::Api { .. }));
    assert!(matches!(
        client.receive_next().await,
        Err(ParleyError::InvalidState(_))
    ));
}

#[tokio::test]
async fn azure_uses_deployment_path_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-35-turbo/chat/completions"))
        .and(query_param("api-version", "2023-05-15"))
        .and(header("api-key", "azure-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse(&[delta("ok")], true), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut client = OpenAiClient::new(OpenAiConfig {
        api_key: Some("azure-key".into()),
        base_url: Some(server.uri()),
        api_type: ApiType::Azure,
        model: "gpt-35-turbo".into(),
        ..Default::default()
    })
    .unwrap();

    let first = client.send(&history()).await.unwrap();
    assert_eq!(collect(&mut client, first).await.unwrap(), "ok");
}

#[tokio::test]
async fn close_drops_open_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse(&[delta("a"), delta("b")], true), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut client = client(server.uri());
    client.send(&history()).await.unwrap();
    client.close();
    client.close();
    assert!(matches!(
        client.receive_next().await,
        Err(ParleyError::InvalidState(_))
    ));
}

/// Serve one chunked SSE response, flushing each entry of `chunks` as its own
/// HTTP chunk with a pause in between.
async fn serve_chunked(chunks: Vec<Vec<u8>>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            request.extend_from_slice(&buf[..n]);
            let Some(head_end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= head_end + 4 + body_len {
                break;
            }
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        for chunk in chunks {
            socket
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await
                .unwrap();
            socket.write_all(&chunk).await.unwrap();
            socket.write_all(b"\r\n").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{addr}/v1")
}

#[tokio::test]
async fn multibyte_text_split_across_reads_survives() {
    let body = sse(&[delta("你好"), delta("🙂")], true).into_bytes();
    // Cut one byte into the first CJK character, then inside the emoji.
    let first_cut = body.iter().position(|&b| b >= 0x80).unwrap() + 1;
    let second_cut = body.iter().position(|&b| b == 0xF0).unwrap() + 2;
    let chunks = vec![
        body[..first_cut].to_vec(),
        body[first_cut..second_cut].to_vec(),
        body[second_cut..].to_vec(),
    ];

    let base_url = serve_chunked(chunks).await;
    let mut client = client(base_url);
    let first = client.send(&history()).await.unwrap();

    assert_eq!(collect(&mut client, first).await.unwrap(), "你好🙂");
}
