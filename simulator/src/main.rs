//! Stand-in for the rover controller
//!
//! Speaks just enough HTTP/1.1 to answer the routes the client uses.
//! `GET /sim/fail` makes every later command answer 503 until
//! `GET /sim/recover`; `/ping` keeps working so a reconnect can be tested.

use rover_shared::{limits, Motion};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Default)]
struct Controller {
    failing: AtomicBool,
    duty: AtomicU8,
    requests: AtomicU64,
}

impl Controller {
    /// Sweeps between 8 and 120 cm; every fifth reading is lost
    fn distance_body(&self, n: u64) -> String {
        if n % 5 == 4 {
            return "null".into();
        }
        let cm = 8.0 + (n * 7 % 113) as f64;
        if n % 2 == 0 {
            format!("{:.1}", cm).replace('.', ",")
        } else {
            format!(r#"{{"cm": {:.1}}}"#, cm)
        }
    }

    fn route(&self, target: &str) -> (u16, String) {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let path = path.trim_start_matches('/');

        match path {
            "ping" => return (200, "pong".into()),
            "sim/fail" => {
                self.failing.store(true, Ordering::SeqCst);
                warn!("Failure mode on");
                return (200, "failing".into());
            }
            "sim/recover" => {
                self.failing.store(false, Ordering::SeqCst);
                info!("Failure mode off");
                return (200, "ok".into());
            }
            _ => {}
        }

        if self.failing.load(Ordering::SeqCst) {
            return (503, "unavailable".into());
        }

        match path {
            "distancia" => (200, self.distance_body(n)),
            "velocidad" => {
                let duty = query
                    .and_then(|q| q.strip_prefix("v="))
                    .and_then(|v| v.parse::<u8>().ok());
                match duty {
                    Some(duty) => {
                        self.duty.store(duty, Ordering::SeqCst);
                        info!("Duty -> {}", duty);
                        (200, "ok".into())
                    }
                    None => (400, "bad duty".into()),
                }
            }
            other => match other.parse::<Motion>() {
                Ok(motion) => {
                    info!(
                        "Motion -> {} (duty {}/{})",
                        motion.token(),
                        self.duty.load(Ordering::SeqCst),
                        limits::MAX_DUTY
                    );
                    (200, "ok".into())
                }
                Err(_) => (404, "not found".into()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let bind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&bind).await?;
    info!("Controller simulator listening on {}", bind);

    let controller = Arc::new(Controller::default());

    loop {
        let (socket, addr) = listener.accept().await?;
        debug!("Connection from: {}", addr);

        let controller = controller.clone();
        tokio::spawn(async move {
            if let Err(e) = serve(socket, &controller).await {
                warn!("Request from {} failed: {}", addr, e);
            }
        });
    }
}

/// Answer one request and close
async fn serve(mut socket: TcpStream, controller: &Controller) -> anyhow::Result<()> {
    let mut buf = vec![0u8; 2048];
    let mut len = 0;

    while !buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
        if len == buf.len() {
            anyhow::bail!("request head too large");
        }
        match socket.read(&mut buf[len..]).await? {
            0 => anyhow::bail!("connection closed before request head"),
            n => len += n,
        }
    }

    let head = String::from_utf8_lossy(&buf[..len]);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (status, body) = match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => controller.route(target),
        _ => (405, "method not allowed".into()),
    };
    debug!("{} -> {} {}", request_line, status, body);

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
