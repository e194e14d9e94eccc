//! Bundled offline dataset (market close of 2025-10-10)
//!
//! Served for every symbol when no market-data gateway is configured.

use crate::models::{FilingSummary, Fundamentals, PricePoint, PriceSeries, RawArticle};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub fn prices(symbol: &str) -> PriceSeries {
    let closes = [
        ("2025-10-08", 256.52),
        ("2025-10-09", 254.04),
        ("2025-10-10", 245.27),
    ];

    PriceSeries {
        symbol: symbol.to_uppercase(),
        period: "1y".to_string(),
        points: closes
            .iter()
            .map(|(date, close)| PricePoint {
                date: date.to_string(),
                close: *close,
            })
            .collect(),
    }
}

pub fn fundamentals() -> Fundamentals {
    Fundamentals {
        revenue: 408_625_000_000.0,
        pe_ratio: 33.72,
        gross_profit: 169_148_000_000.0,
        market_cap: 3_910_350_000_000.0,
    }
}

pub fn articles() -> Vec<RawArticle> {
    let items = [
        (
            "Apple (AAPL) Stock Might Be Rotting - 24/7 Wall St.",
            "Doug McIntyre and Lee Jackson both say Apple's innovation has stalled since Steve Jobs' death, as the company keeps releasing only minor updates ...",
            "https://247wallst.com/investing/2025/10/11/apple-aapl-stock-might-be-rotting/",
        ),
        (
            "Apple (NASDAQ:AAPL) Shares Down 3.5% - Here's Why - MarketBeat",
            "Apple Inc. (NASDAQ:AAPL - Get Free Report) shares traded down 3.5% during trading on Friday . The company traded as low as $244.00 and last ...",
            "https://www.marketbeat.com/instant-alerts/apple-nasdaqaapl-shares-down-35-heres-why-2025-10-10/",
        ),
        (
            "Apple (AAPL) Price Target Stays at $220 as UBS Sees Flattening ...",
            "Apple (AAPL) Price Target Stays at $220 as UBS Sees Flattening iPhone Wait Times. By Ghazal Ahmed | October 11, 2025, 8:44 AM ... Stocks slump ...",
            "https://finviz.com/news/189968/apple-aapl-price-target-stays-at-220-as-ubs-sees-flattening-iphone-wait-times",
        ),
        (
            "AAPL Oct 2025 227.500 put (AAPL251017P00227500)",
            "Find the latest AAPL Oct 2025 227.500 put (AAPL251017P00227500) stock quote, history, news and other vital information to help you with your stock trading ...",
            "https://finance.yahoo.com/quote/AAPL251017P00227500/",
        ),
        (
            "Investor Relations - Apple",
            "FY 25 Fourth Quarter Results. Apple's conference call to discuss fourth fiscal quarter results and business updates is scheduled for Thursday, October 30, 2025.",
            "https://investor.apple.com/investor-relations/default.aspx",
        ),
    ];

    items
        .iter()
        .map(|(title, summary, url)| RawArticle {
            title: title.to_string(),
            summary: Some(summary.to_string()),
            url: Some(url.to_string()),
        })
        .collect()
}

pub fn filing(symbol: &str) -> FilingSummary {
    FilingSummary {
        form_type: "10-K".to_string(),
        filed_at: Some("2024-11-01".to_string()),
        summary: "10-K for fiscal year ended Sep 28, 2024. Annual report: Revenue $383B, gross profit $169B."
            .to_string(),
        url: Some(
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/aapl-20240928.htm"
                .to_string(),
        ),
        risk_factors: Some(format!(
            "Key risk factors related to competition and market trends for {}.",
            symbol.to_uppercase()
        )),
        mdna: Some(format!(
            "Management's discussion on financial performance and future outlook for {}.",
            symbol.to_uppercase()
        )),
    }
}

pub fn macro_values(indicator: &str) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    match indicator.to_uppercase().as_str() {
        "GDP" => {
            values.insert("gdp_growth".to_string(), json!("3.3%"));
            values.insert("quarter".to_string(), json!("Q2 2025"));
            values.insert("value".to_string(), json!(30485.729));
        }
        other => {
            values.insert("series".to_string(), json!(other));
            values.insert("available".to_string(), json!(false));
        }
    }
    values
}
