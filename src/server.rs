//! The development server: a static file server over the output root and a
//! websocket reload channel on a second port. Pipelines notify the reload
//! handle after writing output; the broadcast thread then pushes `"reload"`
//! to every connected browser tab. Local development only: no auth, no TLS.

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use axum::Router;
use camino::Utf8PathBuf;
use console::style;
use tower_http::services::ServeDir;
use tungstenite::WebSocket;

use crate::config::BuildContext;
use crate::error::ServeError;

/// Cloneable handle to the reload channel. It is a no-op until the serve
/// task installs the live sender, so plain builds and tests run without a
/// server.
#[derive(Clone, Default)]
pub struct ReloadHandle {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

impl ReloadHandle {
    /// Ask connected clients to reload. Best-effort; silently a no-op when
    /// no server is running.
    pub fn notify(&self) {
        if let Some(tx) = &*self.tx.lock().unwrap() {
            tx.send(()).ok();
        }
    }

    fn install(&self, tx: Sender<()>) {
        *self.tx.lock().unwrap() = Some(tx);
    }
}

/// Bind both ports and spawn the server threads. Bind failures surface here
/// synchronously, so a taken port fails the serve task without touching the
/// rest of the build. The spawned threads live for the rest of the process.
pub fn start(ctx: &BuildContext) -> Result<(), ServeError> {
    let reload_listener = TcpListener::bind(("127.0.0.1", ctx.ports.livereload))
        .map_err(ServeError::Bind)?;
    let http_listener =
        TcpListener::bind(("127.0.0.1", ctx.ports.http)).map_err(ServeError::Bind)?;

    let clients = Arc::new(Mutex::new(Vec::new()));

    let _incoming = new_thread_ws_incoming(reload_listener, clients.clone());
    let (tx_reload, _broadcast) = new_thread_ws_reload(clients);
    ctx.reload.install(tx_reload);

    let url = style(format!("http://localhost:{}/", ctx.ports.http)).yellow();
    eprintln!("Serving {} on {url}", ctx.paths.out_dir());

    let _http = new_thread_http(http_listener, ctx.paths.out_dir());

    Ok(())
}

fn new_thread_http(
    listener: TcpListener,
    dir: Utf8PathBuf,
) -> JoinHandle<Result<(), ServeError>> {
    thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ServeError::Runtime)?
            .block_on(serve(listener, dir))
    })
}

async fn serve(listener: TcpListener, dir: Utf8PathBuf) -> Result<(), ServeError> {
    listener.set_nonblocking(true).map_err(ServeError::Runtime)?;
    let listener = tokio::net::TcpListener::from_std(listener).map_err(ServeError::Runtime)?;

    let router = Router::new().fallback_service(ServeDir::new(dir.as_std_path()));

    axum::serve(listener, router)
        .await
        .map_err(ServeError::Runtime)?;

    Ok(())
}

fn new_thread_ws_incoming(
    server: TcpListener,
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!("reload channel accept failed: {err}");
                    continue;
                }
            };

            match tungstenite::accept(stream) {
                Ok(socket) => clients.lock().unwrap().push(socket),
                Err(err) => tracing::warn!("websocket handshake failed: {err}"),
            }
        }
    })
}

fn new_thread_ws_reload(
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> (Sender<()>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let thread = thread::spawn(move || {
        while rx.recv().is_ok() {
            let mut clients = clients.lock().unwrap();
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send("reload".into()) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e))
                        if e.kind() == std::io::ErrorKind::BrokenPipe =>
                    {
                        broken.push(i);
                    }
                    Err(err) => {
                        tracing::warn!("reload push failed: {err}");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Keep the connection list bounded; stale tabs pile up.
            let len = clients.len();
            if len > 10 {
                for mut socket in clients.drain(0..len - 10) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}
