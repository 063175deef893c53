use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::{ExtractionFailure, ExtractionOutcome, StockStatus};
use crate::utils::error::AppError;

/// Candidate locations for product JSON-LD, most specific first.
pub const DEFAULT_SELECTORS: [&str; 3] = [
    "#structuredDataLdJson",
    "#productJSONLD",
    r#"script[type="application/ld+json"]"#,
];

/// Reads schema.org product data out of a page and classifies availability.
#[derive(Debug, Clone)]
pub struct StructuredDataExtractor {
    selectors: Vec<(String, Selector)>,
}

impl StructuredDataExtractor {
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Result<Self, AppError> {
        let mut parsed = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let selector = selector.as_ref();
            let css = Selector::parse(selector).map_err(|_| AppError::InvalidSelector {
                selector: selector.to_string(),
            })?;
            parsed.push((selector.to_string(), css));
        }

        if parsed.is_empty() {
            return Err(AppError::Validation(
                "At least one structured data selector is required".into(),
            ));
        }

        Ok(Self { selectors: parsed })
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.selectors.iter().map(|(raw, _)| raw.as_str())
    }

    /// Accepts either a full HTML document or a single JSON-LD block.
    pub fn extract(&self, content: &str) -> ExtractionOutcome {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return match parse_product_block(trimmed) {
                Ok(product) => classify_product(&product),
                Err(failure) => ExtractionOutcome::Failure(failure),
            };
        }

        self.extract_from_html(content)
    }

    pub fn status(&self, content: &str) -> StockStatus {
        self.extract(content).status()
    }

    fn extract_from_html(&self, html: &str) -> ExtractionOutcome {
        let document = Html::parse_document(html);
        let mut best_failure: Option<ExtractionFailure> = None;

        for (_, selector) in &self.selectors {
            for element in document.select(selector) {
                let text = element.text().collect::<String>();
                match parse_product_block(&text) {
                    Ok(product) => return classify_product(&product),
                    Err(failure) => {
                        let replace = best_failure
                            .as_ref()
                            .map_or(true, |current| failure_rank(&failure) > failure_rank(current));
                        if replace {
                            best_failure = Some(failure);
                        }
                    }
                }
            }
        }

        ExtractionOutcome::Failure(best_failure.unwrap_or(ExtractionFailure::NoStructuredData))
    }

    /// In-page script for the browser strategy. Walks the same selector list
    /// and returns the text of the first block carrying offers, or null.
    pub fn candidate_script(&self) -> String {
        let selectors: Vec<&str> = self.selectors().collect();
        let selectors_json = serde_json::to_string(&selectors).unwrap_or_else(|_| "[]".to_string());

        format!(
            r#"
            (function() {{
                const selectors = {selectors_json};
                const hasOffers = (value) => !!value && (value.offers || value.Offers);
                for (const selector of selectors) {{
                    const elements = document.querySelectorAll(selector);
                    for (const element of elements) {{
                        try {{
                            const content = JSON.parse(element.textContent);
                            const product = Array.isArray(content) ? content[0] : content;
                            if (hasOffers(product)) {{
                                return element.textContent;
                            }}
                        }} catch (e) {{
                            continue;
                        }}
                    }}
                }}
                return null;
            }})()
            "#
        )
    }
}

impl Default for StructuredDataExtractor {
    fn default() -> Self {
        Self::new(&DEFAULT_SELECTORS).expect("default structured data selectors are valid CSS")
    }
}

/// Parse one block and narrow it to the product object that carries offers.
fn parse_product_block(text: &str) -> Result<Value, ExtractionFailure> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| ExtractionFailure::MalformedJson(e.to_string()))?;

    let product = match value {
        Value::Array(items) => items.into_iter().next().ok_or(ExtractionFailure::MissingOffers)?,
        other => other,
    };

    if offers_field(&product).is_none() {
        return Err(ExtractionFailure::MissingOffers);
    }

    Ok(product)
}

fn offers_field(product: &Value) -> Option<&Value> {
    product
        .get("offers")
        .or_else(|| product.get("Offers"))
        .filter(|offers| !offers.is_null())
}

// Only the first offer is consulted.
fn classify_product(product: &Value) -> ExtractionOutcome {
    let first_offer = match offers_field(product) {
        Some(Value::Array(offers)) => offers.first(),
        Some(offer @ Value::Object(_)) => Some(offer),
        Some(_) => None,
        None => return ExtractionOutcome::Failure(ExtractionFailure::MissingOffers),
    };

    let availability = first_offer
        .and_then(|offer| offer.get("availability"))
        .and_then(Value::as_str)
        .filter(|availability| !availability.trim().is_empty());

    match availability {
        Some(availability) => ExtractionOutcome::Status(classify_availability(availability)),
        None => ExtractionOutcome::Failure(ExtractionFailure::MissingAvailability),
    }
}

/// Case-insensitive token match. `OutOfStock` wins over `InStock`; anything
/// else is `Unknown`. Spacing is not collapsed, so "Not in stock" stays Unknown.
pub fn classify_availability(availability: &str) -> StockStatus {
    let normalized = availability.to_ascii_lowercase();

    if normalized.contains("outofstock") {
        StockStatus::OutOfStock
    } else if normalized.contains("instock") {
        StockStatus::InStock
    } else {
        StockStatus::Unknown
    }
}

fn failure_rank(failure: &ExtractionFailure) -> u8 {
    match failure {
        ExtractionFailure::NoStructuredData => 0,
        ExtractionFailure::MalformedJson(_) => 1,
        ExtractionFailure::MissingOffers => 2,
        ExtractionFailure::MissingAvailability => 3,
    }
}
