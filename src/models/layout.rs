use serde::{Deserialize, Serialize};

use super::{EventSeat, SeatCategory};

// Read-only projection of one event's materialized seat grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLayout {
    pub event_id: i64,
    pub categories: Vec<SeatCategory>,
    pub seats: Vec<EventSeat>,
}

impl SeatLayout {
    pub fn total_seats(&self) -> usize {
        self.seats.len()
    }

    pub fn seat(&self, seat_id: i64) -> Option<&EventSeat> {
        self.seats.iter().find(|s| s.id == seat_id)
    }
}
