use randpic::config::Config;
use randpic::event::ProxyEvent;
use randpic::handler::PhotoHandlerBuilder;
use randpic::http::ExtractMode;
use randpic_aws::S3Store;

use std::sync::Arc;

use lambda_runtime::{LambdaEvent, service_fn};
use tracing::info;

/// Set to `structured` to match file parts by their `Content-Disposition` header
const EXTRACT_MODE_VAR: &str = "EXTRACT_MODE";

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_ansi(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let config = Config::from_env()?;
    info!(?config, "loaded config");

    let store = S3Store::from_env().await;

    let handler = {
        let mut b = PhotoHandlerBuilder::new(config, store);
        if std::env::var(EXTRACT_MODE_VAR).is_ok_and(|v| v.eq_ignore_ascii_case("structured")) {
            b.set_extract_mode(ExtractMode::Structured);
        }
        Arc::new(b.build())
    };

    lambda_runtime::run(service_fn(move |event: LambdaEvent<ProxyEvent>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, lambda_runtime::Error>(handler.handle_event(&event.payload).await) }
    }))
    .await
    .map_err(|err| anyhow::anyhow!(err))
}
