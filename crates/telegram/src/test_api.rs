//! A stand-in Bot API server for tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicI32, AtomicUsize, Ordering},
    },
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{Method, Uri},
        response::{IntoResponse, Response},
        routing::any,
    },
    serde_json::{Value, json},
    teloxide::Bot,
    tokio::{sync::oneshot, task::JoinHandle},
};

pub const TOKEN: &str = "test-token";
pub const FILE_PATH: &str = "videos/file_1.mkv";
pub const FILE_BYTES: &[u8] = b"0123456789abcdef0123456789abcdef";

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub raw_body: String,
}

#[derive(Clone, Default)]
struct ApiState {
    requests: Arc<Mutex<Vec<Captured>>>,
    /// Error bodies returned, in order, before a method succeeds.
    errors: Arc<Mutex<HashMap<String, VecDeque<Value>>>>,
    next_message_id: Arc<AtomicI32>,
    file_downloads: Arc<AtomicUsize>,
}

pub struct MockBotApi {
    state: ApiState,
    base: String,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl MockBotApi {
    pub async fn start() -> Self {
        let state = ApiState {
            next_message_id: Arc::new(AtomicI32::new(100)),
            ..ApiState::default()
        };
        let app = Router::new()
            .route("/{*path}", any(handle))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock bot api");
        });

        Self {
            state,
            base: format!("http://{addr}/"),
            shutdown,
            server,
        }
    }

    pub fn bot(&self) -> Bot {
        Bot::new(TOKEN).set_api_url(reqwest::Url::parse(&self.base).unwrap())
    }

    /// Answer the next call to `method` with a Bot API error.
    pub fn fail_next(&self, method: &str, error: Value) {
        self.state
            .errors
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn methods(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }

    /// JSON bodies of calls to `method`.
    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.raw_bodies_for(method)
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    pub fn raw_bodies_for(&self, method: &str) -> Vec<String> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .map(|r| r.raw_body.clone())
            .collect()
    }

    pub fn file_downloads(&self) -> usize {
        self.state.file_downloads.load(Ordering::Relaxed)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        self.server.await.expect("server join");
    }
}

pub fn message_not_modified() -> Value {
    json!({
        "ok": false,
        "error_code": 400,
        "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same as a current content and reply markup of the message"
    })
}

pub fn message_to_delete_not_found() -> Value {
    json!({
        "ok": false,
        "error_code": 400,
        "description": "Bad Request: message to delete not found"
    })
}

pub fn retry_after(secs: u64) -> Value {
    json!({
        "ok": false,
        "error_code": 429,
        "description": format!("Too Many Requests: retry after {secs}"),
        "parameters": { "retry_after": secs }
    })
}

async fn handle(State(state): State<ApiState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path();
    if method == Method::GET && path.starts_with("/file/") {
        state.file_downloads.fetch_add(1, Ordering::Relaxed);
        return FILE_BYTES.to_vec().into_response();
    }

    let api_method = path.rsplit('/').next().unwrap_or_default().to_string();
    let raw_body = String::from_utf8_lossy(&body).to_string();
    state.requests.lock().unwrap().push(Captured {
        method: api_method.clone(),
        raw_body: raw_body.clone(),
    });

    if let Some(error) = state
        .errors
        .lock()
        .unwrap()
        .get_mut(&api_method)
        .and_then(VecDeque::pop_front)
    {
        return Json(error).into_response();
    }

    let chat_id = serde_json::from_str::<Value>(&raw_body)
        .ok()
        .and_then(|v| v.get("chat_id").and_then(Value::as_i64))
        .unwrap_or(-200);
    let result = match api_method.as_str() {
        "GetMe" => json!({
            "id": 1,
            "is_bot": true,
            "first_name": "Relay",
            "username": "relay_bot",
            "can_join_groups": false,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false
        }),
        "GetFile" => json!({
            "file_id": "video-file-id",
            "file_unique_id": "video-unique-id",
            "file_size": FILE_BYTES.len(),
            "file_path": FILE_PATH
        }),
        "SendMessage" | "EditMessageText" | "SendDocument" => json!({
            "message_id": state.next_message_id.fetch_add(1, Ordering::Relaxed),
            "date": 0,
            "chat": { "id": chat_id, "type": "channel", "title": "Chat" },
            "text": "ok"
        }),
        "GetUpdates" => json!([]),
        _ => json!(true),
    };
    Json(json!({ "ok": true, "result": result })).into_response()
}
