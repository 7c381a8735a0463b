//! Agricultural market data dashboard.
//!
//! Current implemented scope:
//! - region selectors and filter state
//! - filtered market queries against the backend, sequenced per request
//! - summary statistics, paginated table view and CSV export
//! - server-rendered market data page

mod dashboard;
mod export;
mod manager;
mod observability;
mod pagination;
mod records;
mod source;
mod summary;

pub use dashboard::{market_router, render_market_page};
pub use export::{records_to_csv, CsvExport, ExportError, CSV_FILENAME, CSV_HEADERS};
pub use manager::{
    FetchDisposition, MarketDataManager, Notice, NoticeKind, RequestTicket, ViewPhase,
    ViewSnapshot, EMPTY_RESULT_MESSAGE, EXPORT_DONE_MESSAGE, EXPORT_EMPTY_MESSAGE,
    FETCH_FAILED_MESSAGE, LOADED_MESSAGE, NOTICE_DISPLAY_MS, NO_DATA_FALLBACK_MESSAGE,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_source_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError, SourceChoice,
};
pub use pagination::{
    paginate, PageState, PagerView, TableRow, TableView, NO_DATA_MESSAGE, PAGE_SIZE,
    TABLE_HEADERS,
};
pub use records::{
    format_display_date, format_en_in, region_key, FilterState, MarketRecord, RegionMap,
    SelectOption, ALL_DISTRICTS_LABEL, ALL_STATES_LABEL,
};
pub use source::{
    demo_records, demo_regions, market_api_config_from_env, HttpMarketDataSource,
    InMemoryMarketSource, MarketApiConfig, MarketApiError, MarketDataPayload, MarketDataResponse,
    MarketDataSource, MARKET_DATA_PATH, NO_DATA_FOUND_ERROR, REGION_DATA_PATH,
};
pub use summary::{SummaryStats, SummaryTexts};
