use thiserror::Error;

/// Ошибки построения схемы зала и работы движка бронирования.
///
/// Every variant carries the identifiers the caller needs to present an
/// actionable message or retry with a corrected request. None of these are
/// retried internally; only `Storage { transient: true }` is eligible for the
/// engine's bounded retry.
#[derive(Debug, Error)]
pub enum SeatingError {
    #[error("row {label:?} is assigned to more than one category")]
    DuplicateRow { label: String },

    #[error("invalid category {name:?}: {reason}")]
    InvalidCategory { name: String, reason: String },

    #[error("no categories supplied")]
    EmptyCategories,

    #[error("layout for event {event_id} is locked: seats already booked")]
    LayoutLocked { event_id: i64 },

    #[error("no seat layout exists for event {event_id}")]
    LayoutNotFound { event_id: i64 },

    #[error("seats {seat_ids:?} are not available")]
    SeatsUnavailable { seat_ids: Vec<i64> },

    #[error("seats {seat_ids:?} do not exist for event {event_id}")]
    UnknownSeats { event_id: i64, seat_ids: Vec<i64> },

    #[error("seat {seat_id} is booked and cannot be blocked")]
    SeatOccupied { seat_id: i64 },

    #[error("seat {seat_id} is not in a state that allows this transition")]
    InvalidTransition { seat_id: i64 },

    #[error("booking {booking_id} not found")]
    BookingNotFound { booking_id: i64 },

    #[error("empty seat selection")]
    EmptySelection,

    #[error("seat selection contains duplicate ids")]
    DuplicateSelection,

    // Indicates data corruption; logged where detected and surfaced to the
    // caller as an internal error, never swallowed.
    #[error("seat grid invariant violated: {0}")]
    InvariantViolation(String),

    #[error("storage error: {message}")]
    Storage { message: String, transient: bool },
}

impl SeatingError {
    pub fn storage(message: impl Into<String>) -> Self {
        SeatingError::Storage {
            message: message.into(),
            transient: false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SeatingError::Storage { transient: true, .. })
    }
}

impl From<sqlx::Error> for SeatingError {
    fn from(e: sqlx::Error) -> Self {
        // Connection loss and serialization/deadlock aborts are worth a
        // bounded retry; everything else is fatal.
        let transient = match &e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
            sqlx::Error::Database(db) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        };
        SeatingError::Storage {
            message: e.to_string(),
            transient,
        }
    }
}
