//! Listing extraction.
//!
//! Strategies are tried in order until one yields at least one item. The
//! heading-link strategy is strict (a listing without a price is dropped);
//! the container fallback is looser and bounded.

use crate::models::ListingItem;
use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

/// Path segment that precedes the listing identifier in detail URLs
const LISTING_SEGMENT: &str = "inzerat";
const FALLBACK_MAX_ITEMS: usize = 100;
const FALLBACK_TITLE_CHARS: usize = 100;

pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{css}': {e:?}"))
}

/// One way of pulling listings out of a page
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, document: &Html, base: &Url) -> Vec<ListingItem>;
}

/// Shared selectors for the listing block internals
struct BlockSelectors {
    listing_link: Selector,
    price: Selector,
    image: Selector,
    description: Selector,
}

impl BlockSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            listing_link: parse_selector(&format!("a[href*=\"/{LISTING_SEGMENT}/\"]"))?,
            price: parse_selector(".inzeratycena")?,
            image: parse_selector("img")?,
            description: parse_selector(".popis")?,
        })
    }

    /// The single listing id every detail link in `element` points at, if there is exactly one.
    fn single_listing_id(&self, element: ElementRef<'_>, base: &Url) -> Option<String> {
        let mut found: Option<String> = None;
        for link in element.select(&self.listing_link) {
            let id = link
                .value()
                .attr("href")
                .and_then(|href| base.join(href).ok())
                .and_then(|url| listing_id(&url))?;
            match &found {
                Some(existing) if *existing != id => return None,
                Some(_) => {}
                None => found = Some(id),
            }
        }
        found
    }

    fn price(&self, block: ElementRef<'_>) -> Option<i64> {
        block
            .select(&self.price)
            .next()
            .and_then(|el| parse_price(&collapse_text(el)))
    }

    fn image(&self, block: ElementRef<'_>, base: &Url) -> Option<String> {
        block
            .select(&self.image)
            .filter_map(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .find(|src| !src.trim().is_empty() && !src.starts_with("data:"))
            .and_then(|src| base.join(src.trim()).ok())
            .map(String::from)
    }

    fn description(&self, block: ElementRef<'_>) -> Option<String> {
        block
            .select(&self.description)
            .next()
            .map(collapse_text)
            .filter(|text| !text.is_empty())
    }
}

/// Primary strategy: heading anchors (`h2 a`) pointing at detail pages.
pub struct HeadingLinks {
    heading_link: Selector,
    block: BlockSelectors,
}

impl HeadingLinks {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading_link: parse_selector("h2 a[href]")?,
            block: BlockSelectors::new()?,
        })
    }

    /// Widest ancestor that still only describes this one listing
    fn listing_block<'a>(&self, anchor: ElementRef<'a>, id: &str, base: &Url) -> ElementRef<'a> {
        let mut block = anchor;
        for parent in anchor.ancestors().filter_map(ElementRef::wrap) {
            match self.block.single_listing_id(parent, base) {
                Some(ref other) if other == id => block = parent,
                _ => break,
            }
        }
        block
    }
}

impl ExtractionStrategy for HeadingLinks {
    fn name(&self) -> &'static str {
        "heading-links"
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<ListingItem> {
        let mut items = Vec::new();

        for anchor in document.select(&self.heading_link) {
            let Some(link) = anchor.value().attr("href").and_then(|href| detail_url(href, base)) else {
                continue;
            };
            let Some(id) = listing_id(&link) else {
                continue;
            };

            let block = self.listing_block(anchor, &id, base);
            let Some(price) = self.block.price(block) else {
                debug!(id = %id, "Dropping listing without price");
                continue;
            };

            items.push(ListingItem {
                id,
                title: collapse_text(anchor),
                price: Some(price),
                link: link.to_string(),
                image_url: self.block.image(block, base),
                description: self.block.description(block),
            });
        }

        items
    }
}

/// Fallback strategy: any `div[id]` wrapping a single detail link.
pub struct ContainerLinks {
    container: Selector,
    block: BlockSelectors,
    max_items: usize,
}

impl ContainerLinks {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: parse_selector("div[id]")?,
            block: BlockSelectors::new()?,
            max_items: FALLBACK_MAX_ITEMS,
        })
    }
}

impl ExtractionStrategy for ContainerLinks {
    fn name(&self) -> &'static str {
        "container-links"
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<ListingItem> {
        let mut items = Vec::new();

        for container in document.select(&self.container) {
            if items.len() >= self.max_items {
                break;
            }
            let Some(id) = self.block.single_listing_id(container, base) else {
                continue;
            };
            let Some(link) = container
                .select(&self.block.listing_link)
                .find_map(|a| a.value().attr("href").and_then(|href| detail_url(href, base)))
            else {
                continue;
            };

            items.push(ListingItem {
                id,
                title: truncate_chars(&collapse_text(container), FALLBACK_TITLE_CHARS),
                price: self.block.price(container),
                link: link.to_string(),
                image_url: self.block.image(container, base),
                description: None,
            });
        }

        items
    }
}

/// Runs the strategies in order and keeps the first non-empty result
pub struct Extractor {
    base: Url,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Extractor {
    /// Heading links first, container links as the fallback
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_strategies(
            base_url,
            vec![Box::new(HeadingLinks::new()?), Box::new(ContainerLinks::new()?)],
        )
    }

    pub fn with_strategies(base_url: &str, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid site base URL: {base_url}"))?;
        Ok(Self { base, strategies })
    }

    pub fn extract(&self, html: &str) -> Vec<ListingItem> {
        let document = Html::parse_document(html);

        for (idx, strategy) in self.strategies.iter().enumerate() {
            let items = dedup_by_id(strategy.extract(&document, &self.base));
            if items.is_empty() {
                info!(strategy = strategy.name(), "No listings found, trying next strategy");
                continue;
            }
            info!(
                strategy = strategy.name(),
                fallback = idx > 0,
                "Found {} listings",
                items.len()
            );
            return items;
        }

        Vec::new()
    }
}

fn dedup_by_id(items: Vec<ListingItem>) -> Vec<ListingItem> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.id.clone())).collect()
}

fn detail_url(href: &str, base: &Url) -> Option<Url> {
    let url = base.join(href.trim()).ok()?;
    listing_id(&url).map(|_| url)
}

/// Identifier is the path segment following `inzerat`:
/// `/inzerat/123456/slug.php` -> `123456`
pub fn listing_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == LISTING_SEGMENT)?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Digits only; `"1 200 €"` -> 1200, `"Dohodou"` -> None
pub fn parse_price(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://sport.bazos.sk";

    fn listing_block(id: &str, title: &str, price: Option<&str>) -> String {
        let price_html = price
            .map(|p| format!(r#"<div class="inzeratycena"><b>{p}</b></div>"#))
            .unwrap_or_default();
        format!(
            r#"<div class="inzeraty inzeratyflex">
                <div class="inzeratynadpis">
                    <a href="/inzerat/{id}/bike.php"><img src="https://www.bazos.sk/img/1t/{id}.jpg" class="obrazek"></a>
                    <h2 class="nadpis"><a href="/inzerat/{id}/bike.php">{title}</a></h2>
                    <div class="popis">Pekný   bicykel,
                        málo jazdený</div>
                </div>
                {price_html}
            </div>"#
        )
    }

    fn page(blocks: &[String]) -> String {
        format!("<html><body><div class=\"maincontent\">{}</div></body></html>", blocks.join("\n"))
    }

    #[test]
    fn heading_links_extract_structured_fields() {
        let html = page(&[listing_block("111", "Kellys Spider 29", Some("120 €"))]);
        let items = Extractor::new(BASE).unwrap().extract(&html);

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, "111");
        assert_eq!(item.title, "Kellys Spider 29");
        assert_eq!(item.price, Some(120));
        assert_eq!(item.link, "https://sport.bazos.sk/inzerat/111/bike.php");
        assert_eq!(item.image_url.as_deref(), Some("https://www.bazos.sk/img/1t/111.jpg"));
        assert_eq!(item.description.as_deref(), Some("Pekný bicykel, málo jazdený"));
    }

    #[test]
    fn heading_links_drop_items_without_price() {
        let html = page(&[
            listing_block("1", "Author", Some("90 €")),
            listing_block("2", "Rockrider", None),
            listing_block("3", "CTM", Some("1 200 €")),
        ]);
        let items = Extractor::new(BASE).unwrap().extract(&html);

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(items[1].price, Some(1200));
    }

    #[test]
    fn price_does_not_leak_from_neighbouring_listing() {
        // Without a block boundary the walk would reach the page and pick up "90 €".
        let html = page(&[
            listing_block("1", "Author", Some("90 €")),
            listing_block("2", "Rockrider", Some("Dohodou")),
        ]);
        let items = Extractor::new(BASE).unwrap().extract(&html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "1");
    }

    #[test]
    fn falls_back_to_containers_when_no_headings() {
        let html = r#"<html><body>
            <div id="outer">
                <div id="a1"><a href="/inzerat/501/x.php">Horský   bicykel</a> Trek Marlin, veľkosť L</div>
                <div id="a2"><a href="/inzerat/502/y.php">Detský bicykel</a><div class="inzeratycena">40 €</div></div>
                <div id="nolink">Reklama</div>
            </div>
        </body></html>"#;
        let items = Extractor::new(BASE).unwrap().extract(html);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "501");
        assert_eq!(items[0].title, "Horský bicykel Trek Marlin, veľkosť L");
        assert_eq!(items[0].price, None);
        assert_eq!(items[1].price, Some(40));
        assert_eq!(items[1].link, "https://sport.bazos.sk/inzerat/502/y.php");
    }

    #[test]
    fn fallback_truncates_titles_and_bounds_count() {
        let long = "a".repeat(300);
        let blocks: Vec<String> = (0..150)
            .map(|i| format!(r#"<div id="d{i}"><a href="/inzerat/{i}/z.php">{long}</a></div>"#))
            .collect();
        let html = format!("<html><body>{}</body></html>", blocks.join(""));
        let items = Extractor::new(BASE).unwrap().extract(&html);

        assert_eq!(items.len(), 100);
        assert!(items.iter().all(|i| i.title.chars().count() <= 100));
    }

    #[test]
    fn duplicate_ids_collapse_to_first() {
        let html = page(&[
            listing_block("7", "First", Some("10 €")),
            listing_block("7", "Second", Some("20 €")),
        ]);
        // Same listing twice on one page; the first occurrence wins.
        let items = Extractor::new(BASE).unwrap().extract(&html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "First");
    }

    #[test]
    fn empty_page_yields_nothing() {
        let items = Extractor::new(BASE).unwrap().extract("<html><body><p>Nič</p></body></html>");
        assert!(items.is_empty());
    }

    #[test]
    fn listing_id_is_stable_path_segment() {
        let url = Url::parse("https://sport.bazos.sk/inzerat/123456/kolo.php?x=1").unwrap();
        assert_eq!(listing_id(&url).as_deref(), Some("123456"));

        let other = Url::parse("https://sport.bazos.sk/horska/").unwrap();
        assert_eq!(listing_id(&other), None);
    }

    #[test]
    fn parses_prices() {
        assert_eq!(parse_price("150 €"), Some(150));
        assert_eq!(parse_price(" 1 200 € "), Some(1200));
        assert_eq!(parse_price("Dohodou"), None);
    }
}
