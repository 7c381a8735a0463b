use std::{net::SocketAddr, sync::Arc};

use agrimarket::{
    init_logging, log_app_bind, log_app_start, log_source_selected, logging_config_from_env,
    market_api_config_from_env, market_router, HttpMarketDataSource, InMemoryMarketSource,
    MarketApiError, MarketDataManager, MarketDataSource, SourceChoice,
};

const COMPONENT: &str = "market_dashboard";

// The HTTP source wraps a blocking client: it is built, bootstrapped and
// finally dropped outside the async runtime.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(COMPONENT, &logging_cfg);

    let addr: SocketAddr = std::env::var("AGRI_DASHBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let source = source_from_env()?;
    let manager = MarketDataManager::bootstrap(source.as_ref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(addr, Arc::clone(&source), manager))?;
    drop(runtime);
    drop(source);

    Ok(())
}

async fn serve(
    addr: SocketAddr,
    source: Arc<dyn MarketDataSource>,
    manager: MarketDataManager,
) -> std::io::Result<()> {
    let app = market_router(source, manager);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(COMPONENT, bound_addr, "/market-data");
    axum::serve(listener, app).await
}

fn source_from_env() -> Result<Arc<dyn MarketDataSource>, MarketApiError> {
    let force_demo = std::env::var("AGRI_DASHBOARD_USE_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if force_demo {
        log_source_selected(
            COMPONENT,
            SourceChoice::Demo {
                reason: "AGRI_DASHBOARD_USE_DEMO",
            },
        );
        return Ok(Arc::new(InMemoryMarketSource::demo()));
    }

    let cfg = market_api_config_from_env();
    log_source_selected(
        COMPONENT,
        SourceChoice::Http {
            base_url: &cfg.base_url,
        },
    );
    Ok(Arc::new(HttpMarketDataSource::new(cfg)?))
}
