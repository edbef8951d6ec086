//! Shared test fixtures: a local stand-in for the Postmark batch endpoint and
//! a running instance of the service router.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::mpsc};

use postmark::{recorder, web, AppState, Config, Dispatcher, Store};

pub const TOKEN: &str = "server-token";
pub const SUBMITTED_AT: &str = "2011-05-23T07:38:26.3115+01:00";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into());
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// How the fake provider answers batch calls.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with one successful result per message
    Accept,
    /// Fixed status and body
    Status(u16, String),
    /// Sleep before answering
    Stall(Duration),
    /// Accept the first `accepted` batches, then answer every later one with `status`
    FailAfter { accepted: usize, status: u16 },
}

/// What the fake provider saw.
#[derive(Clone, Default)]
pub struct Recorded {
    pub batch_sizes: Arc<Mutex<Vec<usize>>>,
    pub tokens: Arc<Mutex<Vec<String>>>,
    pub bodies: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl Recorded {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Vec<Value>> {
        self.bodies.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct ProviderState {
    reply: Reply,
    recorded: Recorded,
    next_id: Arc<AtomicUsize>,
}

async fn batch_endpoint(
    State(state): State<ProviderState>,
    headers: HeaderMap,
    Json(batch): Json<Vec<Value>>,
) -> Response {
    let call = {
        let mut sizes = state.recorded.batch_sizes.lock().unwrap();
        sizes.push(batch.len());
        sizes.len()
    };
    if let Some(token) = headers
        .get("X-Postmark-Server-Token")
        .and_then(|v| v.to_str().ok())
    {
        state.recorded.tokens.lock().unwrap().push(token.to_string());
    }
    state.recorded.bodies.lock().unwrap().push(batch.clone());

    match state.reply {
        Reply::Accept => accept(&state, &batch),
        Reply::FailAfter { accepted, status } if call > accepted => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, json!({"ErrorCode": 0, "Message": "Internal error"}).to_string())
                .into_response()
        }
        Reply::FailAfter { .. } => accept(&state, &batch),
        Reply::Status(code, body) => {
            let status = StatusCode::from_u16(code).unwrap();
            (status, body).into_response()
        }
        Reply::Stall(delay) => {
            tokio::time::sleep(delay).await;
            Json(Vec::<Value>::new()).into_response()
        }
    }
}

fn accept(state: &ProviderState, batch: &[Value]) -> Response {
    let results: Vec<Value> = batch
        .iter()
        .map(|message| {
            let n = state.next_id.fetch_add(1, Ordering::SeqCst);
            json!({
                "ErrorCode": 0,
                "Message": "OK",
                "MessageID": format!("msg-{}", n),
                "SubmittedAt": SUBMITTED_AT,
                "To": message["To"],
            })
        })
        .collect();
    Json(results).into_response()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Start a fake provider and return its address and what it records.
pub async fn spawn_provider(reply: Reply) -> (SocketAddr, Recorded) {
    setup_tracing();
    let recorded = Recorded::default();
    let state = ProviderState {
        reply,
        recorded: recorded.clone(),
        next_id: Arc::new(AtomicUsize::new(1)),
    };

    let app = Router::new()
        .route("/email/batch", post(batch_endpoint))
        .with_state(state);

    (serve(app).await, recorded)
}

/// Configuration pointing at a fake provider.
pub fn provider_config(addr: SocketAddr) -> Config {
    let mut config = Config::new(TOKEN);
    config.api_host = addr.to_string();
    config.request_timeout_ms = 2_000;
    config
}

/// Configuration in sandbox mode. Nothing listens on the provider address.
pub fn sandbox_config() -> Config {
    let mut config = Config::new(TOKEN);
    config.api_host = "127.0.0.1:1".to_string();
    config.test_mode = true;
    config
}

/// A running service with its store.
pub struct Service {
    pub base_url: String,
    pub store: Store,
    pub client: reqwest::Client,
}

impl Service {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Wait until the recorder has stored `count` deliveries.
    pub async fn wait_for_deliveries(&self, count: i64) {
        for _ in 0..100 {
            if self.store.delivery_count().await.unwrap() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "expected {} deliveries, found {}",
            count,
            self.store.delivery_count().await.unwrap()
        );
    }
}

/// Start the service router with a recorder task, the way the binary does.
pub async fn spawn_service(config: Config) -> Service {
    setup_tracing();
    let config = Arc::new(config);
    let store = Store::in_memory().await.unwrap();
    let (tx, rx) = mpsc::channel(config.recorder_capacity);
    tokio::spawn(recorder::run(rx, store.clone()));

    let dispatcher = Dispatcher::new(Arc::clone(&config)).unwrap().with_events(tx);
    let state = AppState::new(config, dispatcher, store.clone());
    let addr = serve(web::router(state)).await;

    Service {
        base_url: format!("http://{}", addr),
        store,
        client: reqwest::Client::new(),
    }
}
