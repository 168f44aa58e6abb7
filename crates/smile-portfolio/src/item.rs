use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::image::EMBEDDED_PREFIX;

/// Portfolio item identifier.
///
/// Ids are millisecond creation timestamps, so they are unique within a
/// portfolio and roughly ordered by creation time. Uniqueness is the only
/// invariant; list order is insertion order, not id order.
pub type PortfolioId = i64;

/// A single treatment case in the clinic's portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub id: PortfolioId,
    pub title: String,
    pub subtitle: String,
    /// Either an embedded `data:` URI or an external image URL.
    pub img: String,
}

impl PortfolioItem {
    pub fn new(
        id: PortfolioId,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        img: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            subtitle: subtitle.into(),
            img: img.into(),
        }
    }

    /// Whether the image is stored inline as a `data:` URI rather than
    /// linked by URL.
    pub fn has_embedded_image(&self) -> bool {
        self.img.starts_with(EMBEDDED_PREFIX)
    }
}

/// Allocate an id for a new item.
///
/// Uses the current millisecond timestamp, bumped past the largest existing
/// id so an add can never duplicate one (e.g. two adds within the same
/// millisecond).
pub fn allocate_id(existing: &[PortfolioItem]) -> PortfolioId {
    let candidate = Utc::now().timestamp_millis();
    let max = existing.iter().map(|i| i.id).max().unwrap_or(0);
    if candidate > max {
        candidate
    } else {
        max + 1
    }
}

/// The clinic's baseline portfolio, rendered before any remote data loads.
pub fn default_portfolio() -> Vec<PortfolioItem> {
    vec![
        PortfolioItem::new(
            1,
            "Veneers",
            "Cosmetic",
            "https://i.postimg.cc/brmHM73W/unnamed.jpg",
        ),
        PortfolioItem::new(
            2,
            "Whitening",
            "Brightening",
            "https://i.postimg.cc/sDKKMJ1M/Whiting.png",
        ),
        PortfolioItem::new(
            3,
            "Aligners",
            "Orthodontics",
            "https://i.postimg.cc/50s9KGcd/IMG_20251211_WA0020.jpg",
        ),
        PortfolioItem::new(
            4,
            "Root Canal (RCT)",
            "Endodontics",
            "https://i.postimg.cc/TYzdsgs7/IMG_20251211_WA0018.jpg",
        ),
        PortfolioItem::new(
            5,
            "Dental Implants",
            "Restoration",
            "https://i.postimg.cc/L61Rjhsf/IMG_20251211_WA0024.jpg",
        ),
        PortfolioItem::new(
            6,
            "Dental Crowns",
            "Prosthodontics",
            "https://i.postimg.cc/85XDm6W1/IMG_20251211_WA0027.jpg",
        ),
    ]
}
