use axum::body::Body;
use axum::http::Request;
use futures::StreamExt;
use std::time::Duration;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Reads one complete event-stream frame (terminated by a blank line).
pub async fn next_frame(stream: &mut axum::body::BodyDataStream) -> String {
    let mut frame = String::new();
    while !frame.ends_with("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("chunk");
        frame.push_str(std::str::from_utf8(&chunk).expect("utf8"));
    }
    frame
}
