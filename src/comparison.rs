use ::serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// Per-type cap on simultaneously compared items
pub const MAX_ITEMS_PER_KIND: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonKind {
    School,
    Course,
    Tutor,
}

impl ComparisonKind {
    pub fn new_from_string(s: &str) -> Option<ComparisonKind> {
        match s {
            "school" => Some(ComparisonKind::School),
            "course" => Some(ComparisonKind::Course),
            "tutor" => Some(ComparisonKind::Tutor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonKind::School => "school",
            ComparisonKind::Course => "course",
            ComparisonKind::Tutor => "tutor",
        }
    }
}

/// One entry in the comparison set. `data` is an opaque snapshot of the
/// listed entity at add-time; the derived winner computations read prices
/// and seat counts out of it without otherwise interpreting it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ComparisonKind,
    pub data: Value,
}

/// Capacity rejection. An expected, recoverable condition surfaced to the
/// user, not a system error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapacityError {
    pub kind: ComparisonKind,
    pub max: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "comparison already holds {} items of type {}",
            self.max,
            self.kind.as_str()
        )
    }
}

impl std::error::Error for CapacityError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// The bounded, typed collection a user builds to view side by side.
/// Insertion order is meaningful and preserved per type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComparisonSet {
    items: Vec<ComparisonItem>,
}

impl ComparisonSet {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Idempotent on (id, type): a duplicate add is a no-op success.
    /// Rejects instead of evicting once the per-type cap is reached.
    pub fn add_item(&mut self, item: ComparisonItem) -> Result<AddOutcome, CapacityError> {
        if self.is_in_comparison(item.id, item.kind) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        if !self.can_add_more(item.kind) {
            return Err(CapacityError {
                kind: item.kind,
                max: MAX_ITEMS_PER_KIND,
            });
        }

        self.items.push(item);

        Ok(AddOutcome::Added)
    }

    /// Removing something that isn't there is a no-op.
    pub fn remove_item(&mut self, id: i64, kind: ComparisonKind) {
        self.items
            .retain(|item| !(item.id == id && item.kind == kind));
    }

    pub fn is_in_comparison(&self, id: i64, kind: ComparisonKind) -> bool {
        self.items
            .iter()
            .any(|item| item.id == id && item.kind == kind)
    }

    pub fn can_add_more(&self, kind: ComparisonKind) -> bool {
        self.count_by_kind(kind) < MAX_ITEMS_PER_KIND
    }

    pub fn count_by_kind(&self, kind: ComparisonKind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }

    pub fn items_by_kind(&self, kind: ComparisonKind) -> Vec<&ComparisonItem> {
        self.items.iter().filter(|item| item.kind == kind).collect()
    }

    pub fn items(&self) -> &Vec<ComparisonItem> {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// Snapshots come from the front-end in camelCase but our own records
// serialize in snake_case, so winner lookups accept either spelling.
fn snapshot_number(data: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(number) = data.get(*key).and_then(|v| v.as_f64()) {
            return Some(number);
        }
    }

    None
}

/// Index of the cheapest item. Items without a price never win; on a tie
/// the first item in insertion order wins.
pub fn cheapest_index(items: &[&ComparisonItem]) -> Option<usize> {
    let mut winner: Option<(usize, f64)> = None;

    for (index, item) in items.iter().enumerate() {
        let price = match snapshot_number(&item.data, &["price"]) {
            Some(price) => price,
            None => continue,
        };

        match winner {
            Some((_, best)) if price >= best => {}
            _ => winner = Some((index, price)),
        }
    }

    winner.map(|(index, _)| index)
}

/// Index of the item with the most open seats (max capacity minus current
/// occupancy). Same first-wins tie break as `cheapest_index`.
pub fn most_available_index(items: &[&ComparisonItem]) -> Option<usize> {
    let mut winner: Option<(usize, f64)> = None;

    for (index, item) in items.iter().enumerate() {
        let capacity = match snapshot_number(&item.data, &["maxCapacity", "max_capacity"]) {
            Some(capacity) => capacity,
            None => continue,
        };

        let occupancy =
            snapshot_number(&item.data, &["currentOccupancy", "current_occupancy"]).unwrap_or(0.0);

        let open = capacity - occupancy;

        match winner {
            Some((_, best)) if open <= best => {}
            _ => winner = Some((index, open)),
        }
    }

    winner.map(|(index, _)| index)
}
