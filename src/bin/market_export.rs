use std::path::PathBuf;

use agrimarket::{
    init_logging, log_app_start, log_source_selected, logging_config_from_env,
    market_api_config_from_env, FilterState, HttpMarketDataSource, MarketDataManager,
    SourceChoice,
};

const COMPONENT: &str = "market_export";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(COMPONENT, &logging_cfg);

    let out_dir = std::env::var("AGRI_EXPORT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let filters = FilterState {
        state: env_or_empty("AGRI_FILTER_STATE"),
        district: env_or_empty("AGRI_FILTER_DISTRICT"),
        crop: env_or_empty("AGRI_FILTER_CROP"),
        market: env_or_empty("AGRI_FILTER_MARKET"),
    };

    let cfg = market_api_config_from_env();
    log_source_selected(
        COMPONENT,
        SourceChoice::Http {
            base_url: &cfg.base_url,
        },
    );
    let source = HttpMarketDataSource::new(cfg)?;

    let mut manager = MarketDataManager::new();
    manager.apply_filters(&source, filters);
    if let Some(notice) = manager.take_notice() {
        println!("{}: {}", notice.kind.as_str(), notice.message);
    }

    let export = manager.export_csv()?;
    let path = export.save(&out_dir)?;
    let texts = manager.stats().texts();
    println!(
        "Exported {} records to {} | markets={} avg_price={} volume={} top={}",
        export.row_count,
        path.display(),
        texts.active_markets,
        texts.avg_price,
        texts.total_volume,
        texts.top_commodity
    );

    Ok(())
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}
