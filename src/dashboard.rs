//! Market data page: HTML view, filter/paging actions, JSON snapshot and CSV
//! download over axum.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::export::ExportError;
use crate::manager::{MarketDataManager, ViewPhase, ViewSnapshot, EXPORT_EMPTY_MESSAGE};
use crate::pagination::{TableView, TABLE_HEADERS};
use crate::records::{FilterState, SelectOption};
use crate::source::{MarketApiError, MarketDataSource, MARKET_DATA_PATH};

#[derive(Clone)]
struct MarketAppState {
    source: Arc<dyn MarketDataSource>,
    manager: Arc<Mutex<MarketDataManager>>,
}

impl MarketAppState {
    fn manager(&self) -> MutexGuard<'_, MarketDataManager> {
        self.manager
            .lock()
            .expect("market data manager lock should not be poisoned")
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    delta: i64,
}

#[derive(Debug, Default, Deserialize)]
struct DistrictQuery {
    #[serde(default)]
    state: String,
}

pub fn market_router(source: Arc<dyn MarketDataSource>, manager: MarketDataManager) -> Router {
    Router::new()
        .route("/market-data", get(get_market_page))
        .route("/market-data/filter", get(get_apply_filters))
        .route("/market-data/clear", get(get_clear_filters))
        .route("/market-data/page", get(get_change_page))
        .route("/market-data/districts", get(get_districts))
        .route("/market-data/snapshot", get(get_snapshot))
        .route("/market-data/export.csv", get(get_export_csv))
        .with_state(MarketAppState {
            source,
            manager: Arc::new(Mutex::new(manager)),
        })
}

pub fn render_market_page(snapshot: &ViewSnapshot) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Market Data</title>\n");
    out.push_str("<style>:root{--bg:#f3f6ee;--card:#ffffff;--ink:#1d2a1f;--muted:#5d6b60;--line:#d9e2d6;--head:#2f5d35;--accent:#3c8d40}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Inter\",\"Segoe UI\",sans-serif;background:linear-gradient(160deg,var(--bg),#e6efe2);min-height:100vh}.shell{max-width:1280px;margin:0 auto;padding:24px 18px}.hero{background:linear-gradient(135deg,#24482a,#3c8d40);color:#f6fbf4;border-radius:16px;padding:18px 20px}.hero h1{margin:0;font-size:1.5rem}.filters{display:flex;flex-wrap:wrap;gap:10px;margin-top:16px;background:var(--card);border:1px solid var(--line);border-radius:14px;padding:14px}.filters select,.filters input{padding:8px 10px;border:1px solid var(--line);border-radius:8px;min-width:170px}.btn{display:inline-flex;align-items:center;padding:8px 14px;border-radius:8px;border:1px solid rgba(0,0,0,.1);background:var(--accent);color:#fff;font-weight:600;text-decoration:none;cursor:pointer}.btn-muted{background:#eef3ec;color:var(--ink)}.btn[disabled]{opacity:.45;cursor:not-allowed}.cards{display:grid;grid-template-columns:repeat(auto-fit,minmax(200px,1fr));gap:12px;margin-top:16px}.card{background:var(--card);border:1px solid var(--line);border-radius:14px;padding:14px}.card .label{font-size:.78rem;text-transform:uppercase;color:var(--muted)}.card .value{font-size:1.35rem;font-weight:700;margin-top:4px}.table-card{margin-top:16px;background:var(--card);border:1px solid var(--line);border-radius:14px;overflow:hidden}table{width:100%;border-collapse:collapse}thead th{background:var(--head);color:#f2f8f0;font-size:.8rem;text-transform:uppercase;padding:10px;text-align:left}tbody td{padding:9px 10px;border-bottom:1px solid var(--line);font-size:.86rem}.text-center{text-align:center;color:var(--muted)}.pager{display:flex;gap:12px;align-items:center;justify-content:flex-end;padding:10px 14px}#loadingOverlay{position:fixed;inset:0;background:rgba(255,255,255,.6);align-items:center;justify-content:center;font-weight:700}#toastContainer{position:fixed;top:16px;right:16px;display:flex;flex-direction:column;gap:8px}.toast{padding:10px 14px;border-radius:10px;color:#fff;box-shadow:0 6px 18px rgba(0,0,0,.15)}.toast-success{background:#2e7d32}.toast-warning{background:#b26a00}.toast-error{background:#c62828}</style>\n");
    out.push_str("</head><body><main class=\"shell\">\n");

    let overlay_display = if snapshot.phase == ViewPhase::Loading {
        "flex"
    } else {
        "none"
    };
    out.push_str(&format!(
        "<div id=\"loadingOverlay\" style=\"display:{overlay_display}\">Loading market data...</div>\n"
    ));

    out.push_str("<section class=\"hero\"><h1>Market Data</h1></section>\n");
    render_filters(&mut out, snapshot);
    render_summary(&mut out, snapshot);
    render_table(&mut out, &snapshot.table);

    out.push_str("<div id=\"toastContainer\">");
    if let Some(notice) = &snapshot.notice {
        out.push_str(&format!(
            "<div class=\"toast toast-{}\" data-display-ms=\"{}\"><span>",
            notice.kind.as_str(),
            notice.display_ms
        ));
        out.push_str(&escape_html(&notice.message));
        out.push_str("</span></div>");
    }
    out.push_str("</div>\n");

    out.push_str(PAGE_SCRIPT);
    out.push_str("</main></body></html>\n");
    out
}

fn render_filters(out: &mut String, snapshot: &ViewSnapshot) {
    out.push_str(
        "<form id=\"filters-form\" class=\"filters\" method=\"get\" action=\"/market-data/filter\">",
    );
    out.push_str("<select id=\"stateFilter\" name=\"state\">");
    push_options(out, &snapshot.state_options, &snapshot.filters.state);
    out.push_str("</select>");
    out.push_str("<select id=\"districtFilter\" name=\"district\">");
    push_options(out, &snapshot.district_options, &snapshot.filters.district);
    out.push_str("</select>");
    out.push_str(&format!(
        "<input id=\"commodityInput\" name=\"crop\" placeholder=\"Commodity\" value=\"{}\">",
        escape_html(&snapshot.filters.crop)
    ));
    out.push_str(&format!(
        "<input id=\"searchMarket\" name=\"market\" placeholder=\"Search market\" value=\"{}\">",
        escape_html(&snapshot.filters.market)
    ));
    out.push_str("<button id=\"submitFilters\" class=\"btn\" type=\"submit\">Apply</button>");
    out.push_str(
        "<a id=\"clearFilters\" class=\"btn btn-muted\" href=\"/market-data/clear\">Clear</a>",
    );
    out.push_str("<a id=\"exportData\" class=\"btn btn-muted\" href=\"/market-data/export.csv\" download=\"market_data.csv\">Export CSV</a>");
    out.push_str("</form>\n");
}

fn push_options(out: &mut String, options: &[SelectOption], selected: &str) {
    for option in options {
        let marker = if option.value == selected {
            " selected"
        } else {
            ""
        };
        out.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>",
            escape_html(&option.value),
            escape_html(&option.label)
        ));
    }
}

fn render_summary(out: &mut String, snapshot: &ViewSnapshot) {
    let texts = &snapshot.stats_texts;
    let cards = [
        ("activeMarkets", "Active Markets", &texts.active_markets),
        ("avgPrice", "Average Price", &texts.avg_price),
        ("totalVolume", "Total Volume", &texts.total_volume),
        ("topCommodity", "Top Commodity", &texts.top_commodity),
    ];

    out.push_str("<section class=\"cards\">");
    for (id, label, value) in cards {
        out.push_str(&format!(
            "<div class=\"card\"><div class=\"label\">{label}</div><div id=\"{id}\" class=\"value\">{}</div></div>",
            escape_html(value)
        ));
    }
    out.push_str("</section>\n");
}

fn render_table(out: &mut String, table: &TableView) {
    out.push_str("<section class=\"table-card\"><table id=\"marketTable\"><thead><tr>");
    for header in TABLE_HEADERS {
        out.push_str("<th>");
        out.push_str(header);
        out.push_str("</th>");
    }
    out.push_str("</tr></thead><tbody id=\"marketTableBody\">\n");

    match &table.empty_message {
        Some(message) => out.push_str(&format!(
            "<tr><td colspan=\"{}\" class=\"text-center\">{}</td></tr>\n",
            TABLE_HEADERS.len(),
            escape_html(message)
        )),
        None => {
            for row in &table.rows {
                out.push_str("<tr>");
                for cell in row.cells() {
                    out.push_str("<td>");
                    out.push_str(&escape_html(cell));
                    out.push_str("</td>");
                }
                out.push_str("</tr>\n");
            }
        }
    }
    out.push_str("</tbody></table>");

    let pager = &table.pager;
    out.push_str("<div class=\"pager\">");
    push_pager_button(out, "prevPage", "Previous", -1, pager.prev_disabled);
    out.push_str(&format!(
        "<span id=\"pageInfo\">{}</span>",
        escape_html(&pager.page_info)
    ));
    push_pager_button(out, "nextPage", "Next", 1, pager.next_disabled);
    out.push_str("</div></section>\n");
}

fn push_pager_button(out: &mut String, id: &str, label: &str, delta: i64, disabled: bool) {
    if disabled {
        out.push_str(&format!(
            "<button id=\"{id}\" class=\"btn btn-muted\" disabled>{label}</button>"
        ));
    } else {
        out.push_str(&format!(
            "<a id=\"{id}\" class=\"btn btn-muted\" href=\"/market-data/page?delta={delta}\">{label}</a>"
        ));
    }
}

const PAGE_SCRIPT: &str = "<script>\n(function(){\nconst state=document.getElementById('stateFilter');\nconst district=document.getElementById('districtFilter');\nstate.addEventListener('change',function(){\nfetch('/market-data/districts?state='+encodeURIComponent(state.value)).then(function(r){return r.json();}).then(function(options){\ndistrict.innerHTML='';\noptions.forEach(function(o){const el=document.createElement('option');el.value=o.value;el.textContent=o.label;district.appendChild(el);});\n}).catch(function(err){console.error('Error loading districts:',err);});\n});\ndocument.querySelectorAll('#toastContainer .toast').forEach(function(t){\nsetTimeout(function(){t.remove();},Number(t.dataset.displayMs)||3000);\n});\n})();\n</script>\n";

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn log_request(route: &'static str, event: &'static str) {
    info!(component = "market_dashboard", event, route);
}

/// Renders the page and consumes the notice so it is shown once.
fn page_response(state: &MarketAppState) -> Html<String> {
    let snapshot = {
        let mut manager = state.manager();
        let snapshot = manager.snapshot();
        manager.take_notice();
        snapshot
    };
    Html(render_market_page(&snapshot))
}

// The manager lock is released while the query runs; the ticket sequence
// decides whether the result may still be applied.
async fn run_fetch(state: &MarketAppState, filters: FilterState) {
    let ticket = state.manager().begin_fetch(filters);

    let source = Arc::clone(&state.source);
    let query = ticket.filters.clone();
    let outcome = tokio::task::spawn_blocking(move || source.market_data(&query))
        .await
        .unwrap_or_else(|err| {
            Err(MarketApiError::HttpRequest {
                url: MARKET_DATA_PATH.to_string(),
                message: format!("fetch task failed: {err}"),
            })
        });

    state.manager().complete_fetch(&ticket, outcome);
}

async fn get_market_page(State(state): State<MarketAppState>) -> impl IntoResponse {
    log_request("/market-data", "http.page.request");
    page_response(&state)
}

async fn get_apply_filters(
    State(state): State<MarketAppState>,
    Query(filters): Query<FilterState>,
) -> impl IntoResponse {
    log_request("/market-data/filter", "http.filter.request");
    run_fetch(&state, filters).await;
    page_response(&state)
}

async fn get_clear_filters(State(state): State<MarketAppState>) -> impl IntoResponse {
    log_request("/market-data/clear", "http.clear.request");
    run_fetch(&state, FilterState::default()).await;
    page_response(&state)
}

async fn get_change_page(
    State(state): State<MarketAppState>,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    log_request("/market-data/page", "http.page_change.request");
    state.manager().change_page(query.delta);
    page_response(&state)
}

async fn get_districts(
    State(state): State<MarketAppState>,
    Query(query): Query<DistrictQuery>,
) -> impl IntoResponse {
    log_request("/market-data/districts", "http.districts.request");
    let options = state.manager().on_state_changed(&query.state);
    Json(options)
}

async fn get_snapshot(State(state): State<MarketAppState>) -> impl IntoResponse {
    log_request("/market-data/snapshot", "http.snapshot.request");
    let snapshot = state.manager().snapshot();
    Json(snapshot)
}

async fn get_export_csv(State(state): State<MarketAppState>) -> Response {
    log_request("/market-data/export.csv", "http.export.request");
    let result = state.manager().export_csv();

    match result {
        Ok(export) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.content,
        )
            .into_response(),
        Err(ExportError::NoData) => (StatusCode::NOT_FOUND, EXPORT_EMPTY_MESSAGE).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}
