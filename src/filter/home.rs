//! The MainUI home page lists location cards in `slots.locations[0].config.cardOrder`.
//! Cards name location Items, so they are gated by the Item allow-set.

use serde_json::Value;

use crate::acl::AllowSet;
use crate::error::{AppError, AppResult};
use crate::model::CardEntry;

const LOCATION_CONFIG: &str = "/slots/locations/0/config";

#[derive(Debug, Clone, PartialEq)]
pub struct CardSplit {
    pub kept: Vec<CardEntry>,
    /// Names of the cards removed by this pass.
    pub excluded: Vec<String>,
}

/// Split `cards` into visible entries and excluded card names. Separators and
/// unrecognized entries are never tested. With `collapse`, a separator directly
/// followed by another separator or by the end of the list is dropped.
pub fn filter_cards(cards: &[CardEntry], allow: &AllowSet, collapse: bool) -> CardSplit {
    let mut kept = Vec::with_capacity(cards.len());
    let mut excluded = Vec::new();
    for entry in cards {
        match entry {
            CardEntry::Card(name) if !allow.contains(name) => excluded.push(name.clone()),
            _ => kept.push(entry.clone()),
        }
    }
    if collapse {
        kept = collapse_separators(kept);
    }
    CardSplit { kept, excluded }
}

fn collapse_separators(cards: Vec<CardEntry>) -> Vec<CardEntry> {
    let mut out = Vec::with_capacity(cards.len());
    let mut iter = cards.into_iter().peekable();
    while let Some(entry) = iter.next() {
        if entry.is_separator() && iter.peek().map_or(true, CardEntry::is_separator) {
            continue;
        }
        out.push(entry);
    }
    out
}

/// Fresh copy of a home page with its card order filtered. Excluded cards are
/// appended to the existing `excludedCards`. A page without a card order is
/// returned unchanged.
pub fn filter_home_page(page: &Value, allow: &AllowSet, collapse: bool) -> AppResult<Value> {
    let mut out = page.clone();
    if allow.is_unrestricted() {
        return Ok(out);
    }
    let Some(config) = out.pointer_mut(LOCATION_CONFIG).and_then(Value::as_object_mut) else {
        return Ok(out);
    };
    let Some(order) = config.get("cardOrder") else {
        return Ok(out);
    };
    let cards: Vec<CardEntry> = serde_json::from_value(order.clone())
        .map_err(|e| AppError::internal("invalid_card_order".to_string(), e.to_string()))?;
    let split = filter_cards(&cards, allow, collapse);
    let mut excluded = config.get("excludedCards").and_then(Value::as_array).cloned().unwrap_or_default();
    excluded.extend(split.excluded.into_iter().map(Value::String));
    let kept = serde_json::to_value(split.kept).map_err(|e| AppError::internal("invalid_card_order".to_string(), e.to_string()))?;
    config.insert("cardOrder".to_string(), kept);
    config.insert("excludedCards".to_string(), Value::Array(excluded));
    Ok(out)
}
