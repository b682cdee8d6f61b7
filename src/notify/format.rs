// src/notify/format.rs
//! Telegram (legacy Markdown) rendering of one analyzed headline.

use crate::ingest::types::Article;
use crate::recommendation::Recommendation;

/// Escape characters that legacy Markdown would treat as entity markers.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// URLs end a Markdown link at `)`, so percent-encode the parens.
fn link_target(url: &str) -> String {
    url.replace('(', "%28").replace(')', "%29").replace(' ', "%20")
}

/// Link text is taken literally up to the first `]`; escapes are not honored there.
fn link_text(text: &str) -> String {
    text.replace('[', "(").replace(']', ")")
}

fn link(text: &str, url: Option<&str>) -> String {
    match url {
        Some(u) if !u.is_empty() => format!("[{}]({})", link_text(text), link_target(u)),
        _ => escape_markdown(text),
    }
}

pub fn format_message(article: &Article, rec: &Recommendation) -> String {
    let url = article.url.as_deref();
    let published = article
        .published_at
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let source = article.source_name.as_deref().unwrap_or("N/A");
    let ticker = &rec.ticker;
    let finviz_sector: String = rec
        .sector
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    format!(
        "📰 {title}\n\
         Source: {source} | 🗓️ {published}\n\n\
         *🔍 Analysis*\n\
         Recommendation: *{action}*\n\
         Confidence: {confidence} | Risk: {risk}\n\
         Rationale: {why}\n\n\
         Ticker: `${ticker}` | Sector: {sector}\n\
         [Yahoo Finance](https://finance.yahoo.com/quote/{ticker}) | \
         [Finviz](https://finviz.com/quote.ashx?t={ticker}) | \
         [TradingView](https://www.tradingview.com/symbols/{ticker}/)",
        title = link(&article.title, url),
        source = link(source, url),
        published = published,
        action = rec.action,
        confidence = rec.confidence,
        risk = rec.risk,
        why = escape_markdown(&rec.rationale),
        ticker = ticker,
        sector = link(
            &rec.sector,
            Some(&format!(
                "https://finviz.com/screener.ashx?f=sec_{}&v=211",
                link_target(&finviz_sector)
            ))
        ),
    )
}
