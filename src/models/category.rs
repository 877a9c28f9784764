use serde::{Deserialize, Serialize};

// Входная форма категории от организатора события
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDef {
    pub name: String,
    pub price: f64,
    pub color: String,
    pub rows: Vec<String>,
    pub seats_per_row: i32,
    #[serde(default)]
    pub aisle_after: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatCategory {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price: f64,
    // Display only, no invariant attached
    pub color: String,
    pub rows: Vec<String>,
    pub seats_per_row: i32,
    // Visual gap after these seat positions; no effect on seat identity
    pub aisle_after: Vec<i32>,
    pub sort_order: i32,
}
