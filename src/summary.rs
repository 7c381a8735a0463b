//! Aggregate figures for the summary cards.

use serde::{Deserialize, Serialize};

use crate::records::{format_en_in, MarketRecord, MISSING_TEXT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub active_markets: usize,
    /// Major currency units.
    pub avg_price: f64,
    pub total_volume: f64,
    pub top_commodity: String,
}

impl Default for SummaryStats {
    fn default() -> Self {
        Self {
            active_markets: 0,
            avg_price: 0.0,
            total_volume: 0.0,
            top_commodity: MISSING_TEXT.to_string(),
        }
    }
}

impl SummaryStats {
    pub fn compute(records: &[MarketRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let count = records.len();
        // Decoded prices may sit at the i64 limits; widen before summing.
        let price_sum: i128 = records.iter().map(|record| i128::from(record.price)).sum();
        let total_volume: f64 = records.iter().map(|record| record.total_volume).sum();

        Self {
            active_markets: count,
            avg_price: price_sum as f64 / count as f64 / 100.0,
            total_volume,
            top_commodity: top_commodity(records),
        }
    }

    pub fn texts(&self) -> SummaryTexts {
        SummaryTexts {
            active_markets: self.active_markets.to_string(),
            avg_price: format!("₹{}/KG", format_en_in(self.avg_price)),
            total_volume: format!("{} T", format_en_in(self.total_volume)),
            top_commodity: if self.top_commodity.trim().is_empty() {
                MISSING_TEXT.to_string()
            } else {
                self.top_commodity.clone()
            },
        }
    }
}

/// Card texts exactly as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryTexts {
    pub active_markets: String,
    pub avg_price: String,
    pub total_volume: String,
    pub top_commodity: String,
}

// Left-to-right max reduction: the accumulator survives only while strictly
// greater, so ties go to the later record.
fn top_commodity(records: &[MarketRecord]) -> String {
    records
        .iter()
        .reduce(|best, next| {
            if best.total_volume > next.total_volume {
                best
            } else {
                next
            }
        })
        .map(|record| record.commodity.clone())
        .filter(|commodity| !commodity.trim().is_empty())
        .unwrap_or_else(|| MISSING_TEXT.to_string())
}
