//! Shared scaffolding for the end-to-end scenario tests (§8 of the
//! design doc): binds the real router to an ephemeral port so protocol
//! tests can drive it with a genuine WebSocket client.

use ocpp_csms::AppState;

pub struct TestServer {
    pub http_base: String,
    pub ws_base: String,
}

pub async fn spawn() -> TestServer {
    let state = AppState::new(None, None);
    let app = ocpp_csms::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        http_base: format!("http://{addr}"),
        ws_base: format!("ws://{addr}"),
    }
}
