use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use pricewatch::{
    FetchError, HttpPriceFetcher, PriceFetcher, RefreshScheduler, RefreshState, TextRenderer,
};
use serde_json::json;

fn prices_body() -> serde_json::Value {
    json!({
        "gold": {"24k": 6512300, "18k_750": 4884200, "18k_740": 4819100, "used_gold": 4700000},
        "coins": {"bahar_azadi": 51000000, "emami": 52150000, "nim": 27000000, "rob": 15500000, "grami": 7800000},
        "currency": {"dollar": 61250, "gbp": 77400},
        "last_update": "12:30:00"
    })
}

fn fixture_router(hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/api/prices",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(prices_body())
            }),
        )
        .route("/api/broken", get(|| async { "<html>maintenance</html>" }))
        .route(
            "/api/down",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream crawl failed") }),
        )
        .with_state(hits)
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .expect("writer lock should not be poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn fetch_decodes_backend_snapshot() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = serve(fixture_router(Arc::clone(&hits))).await;
    let fetcher = HttpPriceFetcher::new(format!("http://{addr}/api/prices"), Some(5_000)).unwrap();

    let snapshot = fetcher.fetch().await.unwrap();

    assert_eq!(snapshot.gold.get("24k"), Some(&6_512_300));
    assert_eq!(snapshot.coins.len(), 5);
    assert_eq!(snapshot.currency.get("gbp"), Some(&77_400));
    assert_eq!(snapshot.last_update, "12:30:00");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_success_status_is_typed_failure() {
    let addr = serve(fixture_router(Arc::new(AtomicUsize::new(0)))).await;
    let url = format!("http://{addr}/api/down");
    let fetcher = HttpPriceFetcher::new(url.clone(), Some(5_000)).unwrap();

    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err, FetchError::Status { url, status: 503 });
}

#[tokio::test]
async fn malformed_payload_is_decode_failure() {
    let addr = serve(fixture_router(Arc::new(AtomicUsize::new(0)))).await;
    let fetcher =
        HttpPriceFetcher::new(format!("http://{addr}/api/broken"), Some(5_000)).unwrap();

    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpPriceFetcher::new(format!("http://{addr}/api/prices"), Some(2_000)).unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn scheduler_renders_live_endpoint_into_text_grid() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = serve(fixture_router(Arc::clone(&hits))).await;
    let fetcher = HttpPriceFetcher::new(format!("http://{addr}/api/prices"), Some(5_000)).unwrap();
    let out = SharedWriter::default();
    let renderer = TextRenderer::new(out.clone());

    let (handle, task) =
        RefreshScheduler::new(fetcher, renderer, Duration::from_secs(3_600)).spawn();
    handle.start().unwrap();

    let mut rendered = false;
    for _ in 0..200 {
        if handle.status().await.unwrap().has_rendered {
            rendered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(rendered, "first cycle should render within two seconds");

    let status = handle.status().await.unwrap();
    assert_eq!(status.state, RefreshState::Running);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let text = out.output_string();
    assert!(text.contains("در حال بارگذاری..."));
    assert!(text.contains("طلا ۲۴ عیار: ۶,۵۱۲,۳۰۰ تومان"));
    assert!(text.contains("آخرین بروزرسانی: 12:30:00"));

    handle.dispose().unwrap();
    task.await.unwrap();
}
