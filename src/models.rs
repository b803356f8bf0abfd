use serde::Serialize;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";

/// Booking lifecycle states. Stored as uppercase text; inbound tokens are
/// normalized before comparison because older clients send lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn parse(token: &str) -> Option<BookingStatus> {
        match token.trim().to_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// The legal transition table. Everything not listed here is rejected,
    /// including same-status writes.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration: i64,
    pub image_url: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BarberRow {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Booking joined with the service and barber names, the shape every
/// surface works with.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingDetailRow {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub service_id: String,
    pub barber_id: String,
    pub date: String,
    pub time_slot_id: String,
    pub status: String,
    pub notes: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub service_name: Option<String>,
    pub barber_name: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration: i64,
    pub image_url: String,
    pub active: bool,
    pub created_at: String,
}

impl From<ServiceRow> for ServiceDto {
    fn from(row: ServiceRow) -> Self {
        ServiceDto {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            duration: row.duration,
            image_url: row.image_url,
            active: row.active == 1,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarberDto {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub active: bool,
    pub created_at: String,
}

impl From<BarberRow> for BarberDto {
    fn from(row: BarberRow) -> Self {
        BarberDto {
            id: row.id,
            name: row.name,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            active: row.active == 1,
            created_at: row.created_at,
        }
    }
}

/// User payload with the password hash stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRow> for UserDto {
    fn from(row: UserRow) -> Self {
        UserDto {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDto {
    pub message: String,
    pub created_at: String,
}

impl From<ActivityRow> for ActivityDto {
    fn from(row: ActivityRow) -> Self {
        ActivityDto {
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BookingStatus;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(
            BookingStatus::parse("pending"),
            Some(BookingStatus::Pending)
        );
        assert_eq!(
            BookingStatus::parse("  Confirmed "),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(
            BookingStatus::parse("CANCELLED"),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(BookingStatus::parse("declined"), None);
        assert_eq!(BookingStatus::parse(""), None);
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use BookingStatus::*;

        let legal = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];

        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for to in BookingStatus::ALL {
            assert!(!BookingStatus::Completed.can_transition_to(to));
            assert!(!BookingStatus::Cancelled.can_transition_to(to));
        }
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
    }
}
