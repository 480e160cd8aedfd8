//! Ephemeral loopback HTTP server that receives the OAuth2 authorization
//! redirect for one authorization-code attempt.

use crate::error::{AuthError, Result};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: String,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct ServerState {
    result_tx: Mutex<Option<oneshot::Sender<Result<CallbackResult>>>>,
}

/// Aborts the wrapped task on drop, not just when explicitly told to.
/// This is what makes teardown unconditional: if the `wait_for_callback`
/// future itself is dropped (cancelled by an outer timeout, a `select!`
/// elsewhere, simply discarding the future) before either of its internal
/// `select!` arms resolves, this guard is a local value in that future's
/// state machine and runs its `Drop` as the future unwinds, aborting the
/// spawned server task and releasing the listener.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn handle_callback(
    State(state): State<std::sync::Arc<ServerState>>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let mut guard = state.result_tx.lock().unwrap();
    let Some(tx) = guard.take() else {
        return Html(waiting_page());
    };

    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        warn!(%error, %description, "authorization server returned an error");
        let _ = tx.send(Err(AuthError::authentication_failed(format!(
            "{error}: {description}"
        ))
        .into()));
        return Html(error_page(&error, &description));
    }

    match params.code {
        Some(code) => {
            debug!("received authorization code");
            let _ = tx.send(Ok(CallbackResult {
                code,
                state: params.state,
            }));
            Html(success_page())
        }
        None => {
            let _ = tx.send(Err(AuthError::authentication_failed(
                "callback did not include an authorization code",
            )
            .into()));
            Html(error_page("missing_code", "no authorization code was returned"))
        }
    }
}

async fn handle_root() -> Html<&'static str> {
    Html("<html><body>Waiting for authorization…</body></html>")
}

fn success_page() -> String {
    "<html><body><h3>Authentication complete.</h3><p>You may close this window.</p>\
     <script>window.close()</script></body></html>"
        .to_string()
}

fn error_page(error: &str, description: &str) -> String {
    format!(
        "<html><body><h3>Authentication failed.</h3><p>{error}: {description}</p></body></html>"
    )
}

fn waiting_page() -> String {
    "<html><body>Waiting for authorization…</body></html>".to_string()
}

/// Binds an ephemeral port on `127.0.0.1`, serves exactly `/callback`, and
/// resolves once a result is received or the deadline elapses. The listener
/// and background task are torn down unconditionally: on either branch of
/// the internal race, and also if the returned future itself is dropped
/// before completing (see [`AbortOnDrop`]).
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
}

impl CallbackServer {
    #[instrument]
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let port = listener.local_addr()?.port();
        info!(port, "callback server bound");
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    /// Serves until a callback is received or `timeout` elapses, then shuts
    /// the server down unconditionally.
    #[instrument(skip(self))]
    pub async fn wait_for_callback(self, timeout: Duration) -> Result<CallbackResult> {
        let (result_tx, result_rx) = oneshot::channel();
        let state = std::sync::Arc::new(ServerState {
            result_tx: Mutex::new(Some(result_tx)),
        });

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .route("/", get(handle_root))
            .with_state(state);

        let server_handle = AbortOnDrop(tokio::spawn(async move {
            if let Err(e) = axum::serve(self.listener, app).await {
                error!(error = %e, "callback server task failed");
            }
        }));

        let outcome = tokio::select! {
            result = result_rx => {
                result.unwrap_or_else(|_| Err(AuthError::AuthorizationTimeout.into()))
            }
            _ = tokio::time::sleep(timeout) => {
                warn!("timed out waiting for the authorization callback");
                Err(AuthError::AuthorizationTimeout.into())
            }
        };

        drop(server_handle);
        outcome
    }
}
