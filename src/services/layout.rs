//! Построение схемы зала: разворачивает описания категорий в конкретную
//! сетку мест.
//!
//! Materialization is deterministic: the same definitions always produce the
//! same grid, so both storage backends agree on ids. Persisting the result
//! (and the rebuild lock once tickets are sold) lives in the store layer.

use std::collections::HashSet;

use crate::error::SeatingError;
use crate::models::{CategoryDef, EventSeat, SeatCategory, SeatLayout, SeatStatus};

/// Validates the category definitions and expands them into a full
/// `SeatLayout` with every seat AVAILABLE.
///
/// Category and seat ids are assigned sequentially per event, seats in
/// (category, row, number) order with rows compared lexicographically.
pub fn build_layout(event_id: i64, defs: &[CategoryDef]) -> Result<SeatLayout, SeatingError> {
    if defs.is_empty() {
        return Err(SeatingError::EmptyCategories);
    }

    for def in defs {
        validate_def(def)?;
    }

    // Ряд принадлежит ровно одной категории: повтор внутри одной категории —
    // та же ошибка конструирования, что и пересечение между категориями.
    let mut seen_rows = HashSet::new();
    for def in defs {
        for label in &def.rows {
            if !seen_rows.insert(label.as_str()) {
                return Err(SeatingError::DuplicateRow {
                    label: label.clone(),
                });
            }
        }
    }

    let mut categories = Vec::with_capacity(defs.len());
    let mut seats = Vec::new();
    let mut next_seat_id: i64 = 1;

    for (idx, def) in defs.iter().enumerate() {
        let category_id = idx as i64 + 1;

        // Rows are ordered lexicographically for display, not by declaration
        // order.
        let mut rows = def.rows.clone();
        rows.sort();

        for row_label in &rows {
            for seat_number in 1..=def.seats_per_row {
                seats.push(EventSeat {
                    id: next_seat_id,
                    event_id,
                    category_id,
                    row_label: row_label.clone(),
                    seat_number,
                    price: def.price,
                    status: SeatStatus::Available,
                    booking_id: None,
                });
                next_seat_id += 1;
            }
        }

        let mut aisle_after = def.aisle_after.clone();
        aisle_after.sort_unstable();
        aisle_after.dedup();

        categories.push(SeatCategory {
            id: category_id,
            event_id,
            name: def.name.clone(),
            price: def.price,
            color: def.color.clone(),
            rows,
            seats_per_row: def.seats_per_row,
            aisle_after,
            sort_order: idx as i32,
        });
    }

    Ok(SeatLayout {
        event_id,
        categories,
        seats,
    })
}

fn validate_def(def: &CategoryDef) -> Result<(), SeatingError> {
    let invalid = |reason: &str| SeatingError::InvalidCategory {
        name: def.name.clone(),
        reason: reason.to_string(),
    };

    if def.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if def.rows.is_empty() {
        return Err(invalid("at least one row is required"));
    }
    if def.rows.iter().any(|r| r.trim().is_empty()) {
        return Err(invalid("row labels must not be empty"));
    }
    if def.seats_per_row < 1 {
        return Err(invalid("seats_per_row must be at least 1"));
    }
    if def.price <= 0.0 {
        return Err(invalid("price must be positive"));
    }
    // An aisle sits strictly between two seats; a position at or past the end
    // of the row is meaningless.
    if def
        .aisle_after
        .iter()
        .any(|&a| a < 1 || a >= def.seats_per_row)
    {
        return Err(invalid(
            "aisle_after positions must lie strictly inside the row",
        ));
    }
    Ok(())
}
