//! Market data view state: filters, loaded records, summary, paging and
//! notifications, mutated only through `MarketDataManager` methods.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::export::{records_to_csv, CsvExport, ExportError};
use crate::pagination::{paginate, PageState, TableView};
use crate::records::{FilterState, MarketRecord, RegionMap, SelectOption};
use crate::source::{MarketApiError, MarketDataResponse, MarketDataSource};
use crate::summary::{SummaryStats, SummaryTexts};

pub const NOTICE_DISPLAY_MS: u64 = 3_000;

pub const LOADED_MESSAGE: &str = "Market data loaded successfully!";
pub const EMPTY_RESULT_MESSAGE: &str = "No market data found for the selected filters.";
pub const NO_DATA_FALLBACK_MESSAGE: &str = "No data found.";
pub const FETCH_FAILED_MESSAGE: &str = "Failed to load data. Please try again.";
pub const EXPORT_EMPTY_MESSAGE: &str = "No data available to export.";
pub const EXPORT_DONE_MESSAGE: &str = "Data exported successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Transient, auto-dismissing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub display_ms: u64,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            display_ms: NOTICE_DISPLAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPhase {
    Idle,
    Loading,
    Rendered,
}

/// Issued per query; only the latest ticket may change the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub seq: u64,
    pub filters: FilterState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDisposition {
    Applied,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub phase: ViewPhase,
    pub filters: FilterState,
    pub state_options: Vec<SelectOption>,
    pub district_options: Vec<SelectOption>,
    pub stats: SummaryStats,
    pub stats_texts: SummaryTexts,
    pub table: TableView,
    pub total_records: usize,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone)]
pub struct MarketDataManager {
    regions: RegionMap,
    filters: FilterState,
    records: Vec<MarketRecord>,
    stats: SummaryStats,
    page: PageState,
    phase: ViewPhase,
    notice: Option<Notice>,
    latest_seq: u64,
}

impl Default for MarketDataManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataManager {
    pub fn new() -> Self {
        Self {
            regions: RegionMap::default(),
            filters: FilterState::default(),
            records: Vec::new(),
            stats: SummaryStats::default(),
            page: PageState::default(),
            phase: ViewPhase::Idle,
            notice: None,
            latest_seq: 0,
        }
    }

    /// Page-load sequence: region data first, then an unfiltered query.
    pub fn bootstrap(source: &dyn MarketDataSource) -> Self {
        let mut manager = Self::new();
        manager.load_region_data(source);
        manager.apply_filters(source, FilterState::default());
        manager
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn records(&self) -> &[MarketRecord] {
        &self.records
    }

    pub fn stats(&self) -> &SummaryStats {
        &self.stats
    }

    pub fn page(&self) -> PageState {
        self.page
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Hands the current notice to the renderer; it is shown once.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    /// Never fails outward: on error the selector keeps only its default
    /// option.
    pub fn load_region_data(&mut self, source: &dyn MarketDataSource) -> bool {
        self.apply_region_result(source.region_map())
    }

    pub fn apply_region_result(&mut self, result: Result<RegionMap, MarketApiError>) -> bool {
        match result {
            Ok(regions) => {
                info!(
                    component = "market_data",
                    event = "regions.load.finish",
                    states = regions.state_count()
                );
                self.regions = regions;
                true
            }
            Err(err) => {
                warn!(
                    component = "market_data",
                    event = "regions.load.failed",
                    error = %err
                );
                false
            }
        }
    }

    pub fn state_options(&self) -> Vec<SelectOption> {
        self.regions.state_options()
    }

    pub fn district_options(&self) -> Vec<SelectOption> {
        self.regions.district_options(&self.filters.state)
    }

    /// Selecting a state always drops the district selection; the options
    /// returned are those of the new state.
    pub fn on_state_changed(&mut self, state_key: &str) -> Vec<SelectOption> {
        self.filters.state = state_key.trim().to_string();
        self.filters.district.clear();
        self.district_options()
    }

    pub fn begin_fetch(&mut self, filters: FilterState) -> RequestTicket {
        self.latest_seq = self.latest_seq.saturating_add(1);
        self.filters = filters.trimmed();
        self.phase = ViewPhase::Loading;

        info!(
            component = "market_data",
            event = "market.fetch.start",
            seq = self.latest_seq,
            state = %self.filters.state,
            district = %self.filters.district,
            crop = %self.filters.crop,
            market = %self.filters.market
        );

        RequestTicket {
            seq: self.latest_seq,
            filters: self.filters.clone(),
        }
    }

    /// Applies a query outcome. Responses for superseded tickets are
    /// dropped without touching the view.
    pub fn complete_fetch(
        &mut self,
        ticket: &RequestTicket,
        outcome: Result<MarketDataResponse, MarketApiError>,
    ) -> FetchDisposition {
        if ticket.seq != self.latest_seq {
            info!(
                component = "market_data",
                event = "market.fetch.stale",
                seq = ticket.seq,
                latest_seq = self.latest_seq
            );
            return FetchDisposition::Stale;
        }

        match outcome {
            Ok(response) if response.success => {
                self.records = response.data.map(|data| data.markets).unwrap_or_default();
                self.stats = SummaryStats::compute(&self.records);
                self.notice = Some(if self.records.is_empty() {
                    Notice::new(NoticeKind::Warning, EMPTY_RESULT_MESSAGE)
                } else {
                    Notice::new(NoticeKind::Success, LOADED_MESSAGE)
                });
                info!(
                    component = "market_data",
                    event = "market.fetch.applied",
                    seq = ticket.seq,
                    records = self.records.len()
                );
            }
            Ok(response) => {
                let message = response
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| NO_DATA_FALLBACK_MESSAGE.to_string());
                warn!(
                    component = "market_data",
                    event = "market.fetch.rejected",
                    seq = ticket.seq,
                    error = %message
                );
                self.clear_data();
                self.notice = Some(Notice::new(NoticeKind::Warning, message));
            }
            Err(err) => {
                error!(
                    component = "market_data",
                    event = "market.fetch.failed",
                    seq = ticket.seq,
                    error = %err
                );
                self.clear_data();
                self.notice = Some(Notice::new(NoticeKind::Error, FETCH_FAILED_MESSAGE));
            }
        }

        self.page.reset();
        self.phase = ViewPhase::Rendered;
        FetchDisposition::Applied
    }

    pub fn apply_filters(
        &mut self,
        source: &dyn MarketDataSource,
        filters: FilterState,
    ) -> FetchDisposition {
        let ticket = self.begin_fetch(filters);
        let outcome = source.market_data(&ticket.filters);
        self.complete_fetch(&ticket, outcome)
    }

    pub fn clear_filters(&mut self, source: &dyn MarketDataSource) -> FetchDisposition {
        self.apply_filters(source, FilterState::default())
    }

    /// Re-renders only the table; a no-op at either boundary.
    pub fn change_page(&mut self, delta: i64) -> bool {
        self.page.step(delta, self.records.len())
    }

    pub fn table_view(&self) -> TableView {
        paginate(&self.records, &self.page)
    }

    pub fn export_csv(&mut self) -> Result<CsvExport, ExportError> {
        match records_to_csv(&self.records) {
            Ok(export) => {
                info!(
                    component = "market_data",
                    event = "export.csv",
                    rows = export.row_count
                );
                self.notice = Some(Notice::new(NoticeKind::Success, EXPORT_DONE_MESSAGE));
                Ok(export)
            }
            Err(ExportError::NoData) => {
                self.notice = Some(Notice::new(NoticeKind::Warning, EXPORT_EMPTY_MESSAGE));
                Err(ExportError::NoData)
            }
            Err(err) => {
                error!(
                    component = "market_data",
                    event = "export.csv.failed",
                    error = %err
                );
                self.notice = Some(Notice::new(NoticeKind::Error, err.to_string()));
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            phase: self.phase,
            filters: self.filters.clone(),
            state_options: self.state_options(),
            district_options: self.district_options(),
            stats: self.stats.clone(),
            stats_texts: self.stats.texts(),
            table: self.table_view(),
            total_records: self.records.len(),
            notice: self.notice.clone(),
        }
    }

    fn clear_data(&mut self) {
        self.records.clear();
        self.stats = SummaryStats::default();
    }
}
