use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Available,
    Booked,
    Blocked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Booked => "BOOKED",
            SeatStatus::Blocked => "BLOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<SeatStatus> {
        match s {
            "AVAILABLE" => Some(SeatStatus::Available),
            "BOOKED" => Some(SeatStatus::Booked),
            "BLOCKED" => Some(SeatStatus::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSeat {
    pub id: i64,
    pub event_id: i64,
    pub category_id: i64,
    pub row_label: String,
    pub seat_number: i32,
    // Copied from the category at materialization time; later category edits
    // never reach already-created seats.
    pub price: f64,
    pub status: SeatStatus,
    pub booking_id: Option<i64>,
}

impl EventSeat {
    // Display label, e.g. "A1"
    pub fn label(&self) -> String {
        format!("{}{}", self.row_label, self.seat_number)
    }
}
