//! Router tests driven through `tower::ServiceExt::oneshot`

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use tokio::time::Instant;
use tower::ServiceExt;

use mjpeg_hub::media::multipart::{encode_part, DEFAULT_BOUNDARY, JPEG_CONTENT_TYPE};
use mjpeg_hub::registry::{BroadcastHub, ChannelRegistry, Frame};
use mjpeg_hub::server::router;
use mjpeg_hub::{Channel, ChannelConfig};

const JPEG: &[u8] = b"\xff\xd8fake-jpeg-payload\xff\xd9";

fn channel(name: &str, framerate: i64) -> Channel {
    Channel::from_config(
        0,
        &ChannelConfig {
            name: name.into(),
            source: "rtsp://camera/live".into(),
            resolution: "640x480".into(),
            quality: 80,
            framerate,
        },
    )
    .unwrap()
}

fn setup() -> (Router, Arc<BroadcastHub>) {
    let registry =
        Arc::new(ChannelRegistry::new([channel("front", 10), channel("yard", 5)]).unwrap());
    let hub = Arc::clone(registry.get("front").unwrap().hub());
    let app = router(registry, DEFAULT_BOUNDARY).unwrap();
    (app, hub)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_image_unavailable_before_first_frame() {
    let (app, _hub) = setup();

    let start = Instant::now();
    let response = app.oneshot(get("/front/image.jpg")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    // Not rate limited
    assert!(start.elapsed() < Duration::from_millis(100));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_image_returns_latest_frame() {
    let (app, hub) = setup();
    hub.publish(Frame::from(Bytes::from_static(b"old"))).await;
    hub.publish(Frame::from(Bytes::from_static(JPEG))).await;

    let response = app.oneshot(get("/front/image.jpg")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], JPEG_CONTENT_TYPE);
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::CONTENT_LENGTH], JPEG.len().to_string().as_str());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], JPEG);
}

#[tokio::test(start_paused = true)]
async fn test_image_requests_spaced_by_frame_interval() {
    let (app, hub) = setup();
    hub.publish(Frame::from(Bytes::from_static(JPEG))).await;

    let start = Instant::now();
    for _ in 0..3 {
        let response = app.clone().oneshot(get("/front/image.jpg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // framerate 10 => 100ms per request
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_unknown_channel_not_found() {
    let (app, _hub) = setup();

    let response = app.clone().oneshot(get("/back/image.jpg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(get("/back/stream.mjpg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/front/other")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_delivers_parts() {
    let (app, hub) = setup();

    let response = app.oneshot(get("/front/stream.mjpg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=ffmpeg"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(hub.viewer_count(), 1);

    hub.publish(Frame::from(Bytes::from_static(JPEG))).await;

    let mut body = response.into_body();
    let part = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(part, encode_part(DEFAULT_BOUNDARY, JPEG_CONTENT_TYPE, JPEG));
}

#[tokio::test]
async fn test_every_viewer_receives_each_frame() {
    let (app, hub) = setup();

    let first = app.clone().oneshot(get("/front/stream.mjpg")).await.unwrap();
    let second = app.oneshot(get("/front/stream.mjpg")).await.unwrap();
    assert_eq!(hub.viewer_count(), 2);

    hub.publish(Frame::from(Bytes::from_static(JPEG))).await;
    let expected = encode_part(DEFAULT_BOUNDARY, JPEG_CONTENT_TYPE, JPEG);

    for response in [first, second] {
        let mut body = response.into_body();
        let part = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(part, expected);
    }
}

#[tokio::test]
async fn test_dropped_stream_deregisters_viewer() {
    let (app, hub) = setup();

    let response = app.oneshot(get("/front/stream.mjpg")).await.unwrap();
    assert_eq!(hub.viewer_count(), 1);
    drop(response);

    let deadline = Instant::now() + Duration::from_secs(1);
    while hub.viewer_count() > 0 {
        assert!(Instant::now() < deadline, "viewer never deregistered");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_idle_stream_client_gets_only_newest_frame() {
    let (app, hub) = setup();

    let response = app.oneshot(get("/front/stream.mjpg")).await.unwrap();

    // The client reads nothing while these arrive
    for n in b'1'..=b'4' {
        hub.publish(Frame::from(Bytes::from(vec![n]))).await;
        tokio::task::yield_now().await;
    }

    let mut body = response.into_body();
    let part = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(part, encode_part(DEFAULT_BOUNDARY, JPEG_CONTENT_TYPE, b"4"));

    let next = tokio::time::timeout(Duration::from_millis(50), body.frame()).await;
    assert!(next.is_err(), "stale frames were queued for the client");
}

#[tokio::test(start_paused = true)]
async fn test_image_is_newest_frame_after_hold() {
    let (app, hub) = setup();
    hub.publish(Frame::from(Bytes::from_static(b"old"))).await;

    let request = tokio::spawn(app.oneshot(get("/front/image.jpg")));
    tokio::task::yield_now().await;
    hub.publish(Frame::from(Bytes::from_static(b"new"))).await;

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"new");
}

#[tokio::test]
async fn test_empty_frame_is_unavailable() {
    let (app, hub) = setup();
    hub.publish(Frame::from(Bytes::new())).await;

    let response = app.oneshot(get("/front/image.jpg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
