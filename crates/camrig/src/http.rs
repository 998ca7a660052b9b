//! HTTP surface: a single `POST /api/shoot`.

use std::error::Error as _;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use camrig_core::{Controller, CoreError};

pub fn create_router(controller: Controller) -> Router {
    Router::new()
        .route("/api/shoot", post(shoot))
        .with_state(controller)
}

/// Serve until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    controller: Controller,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http listening");
    }
    axum::serve(listener, create_router(controller))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn shoot(State(controller): State<Controller>) -> Response {
    match controller.shoot().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "shoot failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_text(&e)).into_response()
        }
    }
}

/// The error and its causes on one line.
fn error_text(err: &CoreError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use camrig_api::{
        IpRoute2, MulticastSender, RegistryClient, ReplyListener, SwitchCredentials,
        TelnetDriver, TransportConfig,
    };
    use camrig_core::Services;

    use super::*;

    /// A controller with no switches; nothing it runs touches the network
    /// apart from the multicast sockets handed to `start`.
    fn idle_controller() -> Controller {
        let fleet = camrig_config::Config::default().to_fleet_config().unwrap();
        let services = Services {
            driver: Arc::new(TelnetDriver::new(SwitchCredentials {
                username: "admin".into(),
                password: "admin".to_owned().into(),
            })),
            registry: Arc::new(
                RegistryClient::new(
                    "http://127.0.0.1:9/api".parse().unwrap(),
                    &TransportConfig::default(),
                )
                .unwrap(),
            ),
            interfaces: Arc::new(IpRoute2::new(24)),
        };
        Controller::new(fleet, services)
    }

    async fn spawn_server(controller: Controller) -> (SocketAddr, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(serve(listener, controller, cancel.clone()));
        (addr, cancel)
    }

    #[tokio::test]
    async fn shoot_before_start_is_a_server_error() {
        let (addr, cancel) = spawn_server(idle_controller()).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/shoot"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.text().await.unwrap(), "Controller has not been started");
        cancel.cancel();
    }

    #[tokio::test]
    async fn shoot_broadcasts_and_returns_no_content() {
        let cameras = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = MulticastSender::from_sockets(
            vec![UdpSocket::bind("127.0.0.1:0").await.unwrap()],
            cameras.local_addr().unwrap(),
        );
        let replies = ReplyListener::from_socket(UdpSocket::bind("127.0.0.1:0").await.unwrap());

        let controller = idle_controller();
        controller.start(Arc::new(sender), replies).await;
        let (addr, cancel) = spawn_server(controller.clone()).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/shoot"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

        // Pings share the socket; wait for the shoot byte.
        let mut buf = [0u8; 16];
        let got_shoot = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let (len, _) = cameras.recv_from(&mut buf).await.unwrap();
                if buf[..len] == [1] {
                    break;
                }
            }
        })
        .await;
        assert!(got_shoot.is_ok());

        cancel.cancel();
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let (addr, cancel) = spawn_server(idle_controller()).await;

        let resp = reqwest::Client::new()
            .get(format!("http://{addr}/api/shoot"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/cameras"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        cancel.cancel();
    }
}
