//! Learning extraction from a finished report

use crate::memory::tags;
use crate::models::Report;
use crate::tools::market::HIGH_VOLATILITY_STD_DEV;

/// Tags learned from a finished report, in a fixed order
pub fn extract_learning(report: &Report) -> Vec<String> {
    let mut learned = Vec::new();

    if report
        .financial_analysis()
        .map(|analysis| analysis.risk_score > 0)
        .unwrap_or(false)
    {
        learned.push(tags::HIGH_RISK.to_string());
    }

    // zero classified items never counts as a bias
    if report
        .news_digest()
        .and_then(|digest| digest.negative_fraction())
        .map(|fraction| fraction > 0.5)
        .unwrap_or(false)
    {
        learned.push(tags::NEGATIVE_SENTIMENT_BIAS.to_string());
    }

    let volatile_prices = report
        .price_series()
        .and_then(|series| series.close_std_dev())
        .map(|std_dev| std_dev > HIGH_VOLATILITY_STD_DEV)
        .unwrap_or(false);
    let volatile_analysis = report
        .volatility()
        .map(|v| v.high_volatility)
        .unwrap_or(false);
    if volatile_prices || volatile_analysis {
        learned.push(tags::HIGH_VOLATILITY.to_string());
    }

    learned
}
