//! Page cursor over the loaded records and the pure table projection.

use serde::{Deserialize, Serialize};

use crate::records::{display_or_missing, format_display_date, format_en_in, MarketRecord};

pub const PAGE_SIZE: usize = 10;
pub const NO_DATA_MESSAGE: &str = "No market data found for the selected filters.";

pub const TABLE_HEADERS: [&str; 7] = [
    "Market",
    "State",
    "District",
    "Commodity",
    "Variety",
    "Price",
    "Date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub current_page: usize,
    pub page_size: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: PAGE_SIZE,
        }
    }
}

impl PageState {
    pub fn total_pages(&self, total_records: usize) -> usize {
        total_records.div_ceil(self.page_size)
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Moves one page back (`-1`) or forward (`1`) when the target page
    /// exists. Any other delta is ignored. Returns whether the cursor moved.
    pub fn step(&mut self, delta: i64, total_records: usize) -> bool {
        let target = match delta {
            -1 => self.current_page.checked_sub(1),
            1 => self.current_page.checked_add(1),
            _ => None,
        };

        match target {
            Some(page) if page >= 1 && page <= self.total_pages(total_records) => {
                self.current_page = page;
                true
            }
            _ => false,
        }
    }

    pub fn bounds(&self) -> (usize, usize) {
        let start = (self.current_page.saturating_sub(1)).saturating_mul(self.page_size);
        (start, start.saturating_add(self.page_size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub market: String,
    pub state: String,
    pub district: String,
    pub commodity: String,
    pub variety: String,
    pub price: String,
    pub date: String,
}

impl TableRow {
    pub fn from_record(record: &MarketRecord) -> Self {
        Self {
            market: display_or_missing(&record.market),
            state: display_or_missing(&record.state),
            district: display_or_missing(&record.district),
            commodity: display_or_missing(&record.commodity),
            variety: display_or_missing(&record.variety),
            price: format!("₹{}", format_en_in(record.price_major())),
            date: format_display_date(&record.date),
        }
    }

    pub fn cells(&self) -> [&str; 7] {
        [
            self.market.as_str(),
            self.state.as_str(),
            self.district.as_str(),
            self.commodity.as_str(),
            self.variety.as_str(),
            self.price.as_str(),
            self.date.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerView {
    pub current_page: usize,
    pub total_pages: usize,
    pub page_info: String,
    pub prev_disabled: bool,
    pub next_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableView {
    pub rows: Vec<TableRow>,
    /// Set when the current slice is empty; rendered as a single row.
    pub empty_message: Option<String>,
    pub pager: PagerView,
}

pub fn paginate(records: &[MarketRecord], page: &PageState) -> TableView {
    let (start, end) = page.bounds();
    let start = start.min(records.len());
    let end = end.min(records.len());

    let rows: Vec<TableRow> = records[start..end]
        .iter()
        .map(TableRow::from_record)
        .collect();
    let empty_message = rows.is_empty().then(|| NO_DATA_MESSAGE.to_string());

    let total_pages = page.total_pages(records.len());
    let pager = PagerView {
        current_page: page.current_page,
        total_pages,
        page_info: format!("Page {} of {}", page.current_page, total_pages.max(1)),
        prev_disabled: page.current_page <= 1,
        next_disabled: total_pages == 0 || page.current_page >= total_pages,
    };

    TableView {
        rows,
        empty_message,
        pager,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(count: usize) -> Vec<MarketRecord> {
        (0..count)
            .map(|idx| MarketRecord {
                market: format!("Market {idx}"),
                state: "Punjab".to_string(),
                district: "Ludhiana".to_string(),
                commodity: "Wheat".to_string(),
                variety: String::new(),
                price: 212_550,
                total_volume: 1.0,
                date: "2025-03-01".to_string(),
            })
            .collect()
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PageState::default();
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(1), 1);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
        assert_eq!(page.total_pages(25), 3);
    }

    #[test]
    fn empty_list_renders_single_no_data_row() {
        let view = paginate(&[], &PageState::default());
        assert!(view.rows.is_empty());
        assert_eq!(view.empty_message.as_deref(), Some(NO_DATA_MESSAGE));
        assert_eq!(view.pager.page_info, "Page 1 of 1");
        assert!(view.pager.prev_disabled);
        assert!(view.pager.next_disabled);
    }

    #[test]
    fn step_is_clamped_at_both_boundaries() {
        let mut page = PageState::default();
        assert!(!page.step(-1, 25));
        assert_eq!(page.current_page, 1);

        assert!(page.step(1, 25));
        assert!(page.step(1, 25));
        assert_eq!(page.current_page, 3);
        assert!(!page.step(1, 25));
        assert_eq!(page.current_page, 3);

        let mut empty = PageState::default();
        assert!(!empty.step(1, 0));
        assert_eq!(empty.current_page, 1);
    }

    #[test]
    fn step_ignores_deltas_other_than_one_page() {
        let mut page = PageState::default();
        assert!(!page.step(2, 25));
        assert!(!page.step(0, 25));
        assert!(!page.step(i64::MAX, 25));
        assert!(!page.step(i64::MIN, 25));
        assert_eq!(page.current_page, 1);

        let mut far = PageState {
            current_page: usize::MAX,
            page_size: PAGE_SIZE,
        };
        assert!(!far.step(1, 25));
        assert_eq!(far.current_page, usize::MAX);
    }

    #[test]
    fn last_page_holds_remainder() {
        let data = records(25);
        let page = PageState {
            current_page: 3,
            page_size: PAGE_SIZE,
        };
        let view = paginate(&data, &page);
        assert_eq!(view.rows.len(), 5);
        assert_eq!(view.rows[0].market, "Market 20");
        assert_eq!(view.pager.page_info, "Page 3 of 3");
        assert!(!view.pager.prev_disabled);
        assert!(view.pager.next_disabled);
    }

    #[test]
    fn rows_project_price_and_missing_fields() {
        let view = paginate(&records(1), &PageState::default());
        let row = &view.rows[0];
        assert_eq!(row.price, "₹2,125.5");
        assert_eq!(row.variety, "N/A");
        assert_eq!(row.date, "01/03/2025");
        assert_eq!(row.cells().len(), TABLE_HEADERS.len());
    }
}
