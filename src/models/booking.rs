use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub trek: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide: Option<ObjectId>,
    pub start_date: DateTime,
    pub participants: i32,
    pub total_price: f64,
    pub status: BookingStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Completed and already-cancelled bookings are terminal.
    pub fn is_cancellable(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// Total price is always participants times the trek's unit price at the
/// time of the mutation; there is no price lock at booking time.
pub fn total_price(participants: i32, unit_price: f64) -> f64 {
    f64::from(participants) * unit_price
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingDto {
    pub trek_id: String,
    pub start_date: ChronoDateTime<Utc>,
    #[validate(range(min = 1, message = "At least one participant is required"))]
    pub participants: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingDto {
    pub start_date: Option<ChronoDateTime<Utc>>,
    #[validate(range(min = 1, message = "At least one participant is required"))]
    pub participants: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateBookingDto {
    pub status: Option<BookingStatus>,
    pub guide_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_price_is_participants_times_unit_price() {
        assert_eq!(total_price(3, 1200.0), 3600.0);
        assert_eq!(total_price(1, 499.5), 499.5);
        assert_eq!(total_price(10, 0.0), 0.0);
    }

    #[test]
    fn status_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::from_str::<BookingStatus>("\"cancelled\"").unwrap(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn only_pending_and_confirmed_bookings_are_cancellable() {
        assert!(BookingStatus::Pending.is_cancellable());
        assert!(BookingStatus::Confirmed.is_cancellable());
        assert!(!BookingStatus::Cancelled.is_cancellable());
        assert!(!BookingStatus::Completed.is_cancellable());
    }
}
