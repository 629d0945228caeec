//! Local HTTP server for randpic
//!
//! ```bash
//! # photos from an S3 bucket
//! IMAGES_BUCKET=my-photos cargo run --features binary --bin randpic-serve
//!
//! # no AWS account needed
//! cargo run --features binary --bin randpic-serve -- --memory
//! ```

use randpic::config::{Config, ConfigError};
use randpic::handler::{PhotoHandler, PhotoHandlerBuilder};
use randpic::http::ExtractMode;
use randpic::store::MemoryStore;
use randpic_aws::S3Store;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tokio::net::TcpListener;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;

use clap::Parser;
use tracing::{debug, error, info};

const MEMORY_BUCKET: &str = "randpic";

#[derive(clap::Parser)]
#[command(name = "randpic-serve")]
#[command(about = "Serves random photos over plain HTTP", long_about = None)]
struct Args {
    /// Host to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value = "8014")]
    port: u16,

    /// Keep objects in memory instead of S3
    #[arg(long)]
    memory: bool,

    /// Match file parts by their Content-Disposition header
    #[arg(long)]
    structured: bool,
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

fn load_config(memory: bool) -> Result<Config, ConfigError> {
    match Config::from_env() {
        Err(ConfigError::Missing(_)) if memory => Ok(Config::new(MEMORY_BUCKET)),
        other => other,
    }
}

async fn serve(handler: Arc<PhotoHandler>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let limit = handler.config().max_upload_size;
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let status = if err.downcast_ref::<LengthLimitError>().is_some() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            debug!(%err, "failed to read request body");
            let mut res = Response::new(Full::new(Bytes::from(status.canonical_reason().unwrap_or_default())));
            *res.status_mut() = status;
            return Ok(res);
        }
    };

    let res = handler.handle(Request::from_parts(parts, body), false).await;
    Ok(res.map(|body| Full::new(Bytes::from(body))))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_tracing();

    let config = load_config(args.memory)?;
    info!(?config, memory = args.memory, "loaded config");

    let handler = {
        let mut b = if args.memory {
            PhotoHandlerBuilder::new(config, MemoryStore::new())
        } else {
            PhotoHandlerBuilder::new(config, S3Store::from_env().await)
        };
        if args.structured {
            b.set_extract_mode(ExtractMode::Structured);
        }
        Arc::new(b.build())
    };

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("server listening on http://{}", addr);
    info!("press Ctrl+C to stop");

    let http_server = ConnBuilder::new(TokioExecutor::new());
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();

    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    loop {
        let (stream, remote_addr) = tokio::select! {
            res = listener.accept() => {
                match res {
                    Ok(conn) => conn,
                    Err(err) => {
                        error!("error accepting connection: {err}");
                        continue;
                    }
                }
            }
            _ = ctrl_c.as_mut() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
        };

        debug!("accepted connection from {}", remote_addr);

        let handler = Arc::clone(&handler);
        let service = hyper::service::service_fn(move |req| serve(Arc::clone(&handler), req));

        let conn = http_server.serve_connection(TokioIo::new(stream), service);
        let conn = graceful.watch(conn.into_owned());

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!("error serving connection: {}", e);
            }
        });
    }

    tokio::select! {
        () = graceful.shutdown() => {
            info!("gracefully shut down");
        },
        () = tokio::time::sleep(Duration::from_secs(10)) => {
            info!("waited 10 seconds for graceful shutdown, aborting...");
        }
    }

    Ok(())
}
