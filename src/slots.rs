use std::collections::HashSet;
use std::env;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::ApiError;
use crate::models::BookingStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
}

/// The daily slot template. Built once at startup from the opening-hours
/// config and shared read-only; slot ids are positions in the template, so
/// they stay stable as long as the opening hours do.
#[derive(Clone, Debug)]
pub struct SlotCatalog {
    slots: Vec<TimeSlot>,
    closed_weekdays: Vec<Weekday>,
}

impl SlotCatalog {
    pub fn from_windows(
        windows: &[(NaiveTime, NaiveTime)],
        slot_minutes: i64,
        closed_weekdays: Vec<Weekday>,
    ) -> Self {
        // Slot lengths outside a calendar day fall back to hour slots.
        let step = if (1..=1440).contains(&slot_minutes) {
            Duration::minutes(slot_minutes)
        } else {
            Duration::minutes(60)
        };
        let mut slots = Vec::new();
        for &(open, close) in windows {
            let mut cursor = open;
            while cursor < close {
                let (next, wrapped) = cursor.overflowing_add_signed(step);
                let end = if wrapped != 0 || next <= cursor || next > close {
                    close
                } else {
                    next
                };
                slots.push(TimeSlot {
                    id: (slots.len() + 1).to_string(),
                    start_time: cursor.format("%H:%M").to_string(),
                    end_time: end.format("%H:%M").to_string(),
                });
                if wrapped != 0 || next <= cursor {
                    break;
                }
                cursor = next;
            }
        }
        SlotCatalog {
            slots,
            closed_weekdays,
        }
    }

    /// Reads SALON_OPEN_HOURS, SALON_SLOT_MINUTES and SALON_CLOSED_WEEKDAYS.
    /// Each variable falls back to its own default when unparseable rather
    /// than refusing to start.
    pub fn from_env() -> Self {
        let open_hours = env::var("SALON_OPEN_HOURS").ok();
        let slot_minutes = env::var("SALON_SLOT_MINUTES").ok();
        let closed_weekdays = env::var("SALON_CLOSED_WEEKDAYS").ok();
        SlotCatalog::from_env_values(
            open_hours.as_deref(),
            slot_minutes.as_deref(),
            closed_weekdays.as_deref(),
        )
    }

    fn from_env_values(
        open_hours: Option<&str>,
        slot_minutes: Option<&str>,
        closed_weekdays: Option<&str>,
    ) -> Self {
        let windows = match open_hours {
            Some(raw) => match parse_windows(raw) {
                Some(windows) => windows,
                None => {
                    log::warn!("Ignoring malformed SALON_OPEN_HOURS {raw:?}");
                    default_windows()
                }
            },
            None => default_windows(),
        };

        let slot_minutes = slot_minutes
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|m| (1..=1440).contains(m))
            .unwrap_or(60);

        let closed_weekdays = match closed_weekdays {
            Some(raw) => raw
                .split(',')
                .filter_map(|token| {
                    let token = token.trim();
                    if token.is_empty() {
                        return None;
                    }
                    match token.parse::<Weekday>() {
                        Ok(day) => Some(day),
                        Err(_) => {
                            log::warn!("Ignoring unknown weekday {token:?} in SALON_CLOSED_WEEKDAYS");
                            None
                        }
                    }
                })
                .collect(),
            None => vec![Weekday::Sun],
        };

        SlotCatalog::from_windows(&windows, slot_minutes, closed_weekdays)
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn contains(&self, slot_id: &str) -> bool {
        self.slots.iter().any(|slot| slot.id == slot_id)
    }

    pub fn is_closed(&self, date: NaiveDate) -> bool {
        self.closed_weekdays.contains(&date.weekday())
    }
}

impl Default for SlotCatalog {
    fn default() -> Self {
        SlotCatalog::from_windows(&default_windows(), 60, vec![Weekday::Sun])
    }
}

fn default_windows() -> Vec<(NaiveTime, NaiveTime)> {
    vec![
        (hm(9, 0), hm(12, 0)),
        (hm(13, 0), hm(18, 0)),
    ]
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_windows(raw: &str) -> Option<Vec<(NaiveTime, NaiveTime)>> {
    let mut windows = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (open, close) = part.split_once('-')?;
        let open = NaiveTime::parse_from_str(open.trim(), "%H:%M").ok()?;
        let close = NaiveTime::parse_from_str(close.trim(), "%H:%M").ok()?;
        if open >= close {
            return None;
        }
        windows.push((open, close));
    }
    if windows.is_empty() {
        None
    } else {
        Some(windows)
    }
}

/// Accepts both plain `YYYY-MM-DD` and full RFC 3339 timestamps; only the
/// calendar day matters for grouping.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityMeta {
    pub date: String,
    pub closed: bool,
    pub service_id: String,
    pub service_duration: i64,
    pub barber_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub time_slots: Vec<TimeSlot>,
    pub meta: AvailabilityMeta,
}

/// Subtracts the barber's non-cancelled bookings for the day from the
/// catalog. Pure read; catalog order is chronological already. Closed days
/// come back empty with the `closed` flag set.
pub async fn resolve_available_slots(
    pool: &SqlitePool,
    catalog: &SlotCatalog,
    date: &str,
    service_id: &str,
    barber_id: &str,
) -> Result<Availability, ApiError> {
    let day = parse_day(date).ok_or_else(|| ApiError::validation("Invalid date format"))?;

    let service = sqlx::query_as::<_, (i64,)>("SELECT duration FROM services WHERE id = ? LIMIT 1")
        .bind(service_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    sqlx::query_as::<_, (String,)>("SELECT id FROM barbers WHERE id = ? LIMIT 1")
        .bind(barber_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Barber not found"))?;

    let closed = catalog.is_closed(day);
    let meta = AvailabilityMeta {
        date: day_key(day),
        closed,
        service_id: service_id.to_string(),
        service_duration: service.0,
        barber_id: barber_id.to_string(),
    };

    if closed {
        return Ok(Availability {
            time_slots: Vec::new(),
            meta,
        });
    }

    let booked = sqlx::query_as::<_, (String,)>(
        r#"SELECT time_slot_id FROM bookings
           WHERE barber_id = ? AND substr(date, 1, 10) = ? AND status <> ?"#,
    )
    .bind(barber_id)
    .bind(day_key(day))
    .bind(BookingStatus::Cancelled.as_str())
    .fetch_all(pool)
    .await?;

    let taken: HashSet<&str> = booked.iter().map(|row| row.0.as_str()).collect();
    let time_slots = catalog
        .slots()
        .iter()
        .filter(|slot| !taken.contains(slot.id.as_str()))
        .cloned()
        .collect();

    Ok(Availability { time_slots, meta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn default_catalog_skips_the_lunch_hour() {
        let catalog = SlotCatalog::default();
        let starts: Vec<&str> = catalog
            .slots()
            .iter()
            .map(|s| s.start_time.as_str())
            .collect();
        assert_eq!(
            starts,
            vec!["09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00"]
        );
        let ids: Vec<&str> = catalog.slots().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
        assert_eq!(catalog.slots()[2].end_time, "12:00");
        assert_eq!(catalog.slots()[7].end_time, "18:00");
    }

    #[test]
    fn catalog_honours_slot_granularity() {
        let catalog = SlotCatalog::from_windows(&[(hm(9, 0), hm(10, 30))], 30, Vec::new());
        let starts: Vec<&str> = catalog
            .slots()
            .iter()
            .map(|s| s.start_time.as_str())
            .collect();
        assert_eq!(starts, vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn short_final_slot_is_capped_at_closing_time() {
        let catalog = SlotCatalog::from_windows(&[(hm(9, 0), hm(10, 30))], 60, Vec::new());
        let slots = catalog.slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].start_time, "10:00");
        assert_eq!(slots[1].end_time, "10:30");
    }

    #[test]
    fn catalog_stops_at_midnight() {
        let catalog = SlotCatalog::from_windows(&[(hm(23, 0), hm(23, 59))], 60, Vec::new());
        let slots = catalog.slots();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, "23:00");
        assert_eq!(slots[0].end_time, "23:59");
    }

    #[test]
    fn closed_weekdays_are_detected() {
        let catalog = SlotCatalog::default();
        // 2025-06-01 is a Sunday, 2025-06-02 a Monday.
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert!(catalog.is_closed(sunday));
        assert!(!catalog.is_closed(monday));
    }

    #[test]
    fn parse_day_takes_the_calendar_prefix() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(parse_day("2025-06-02"), Some(expected));
        assert_eq!(parse_day("2025-06-02T10:30:00.000Z"), Some(expected));
        assert_eq!(parse_day("02/06/2025"), None);
        assert_eq!(parse_day("soon"), None);
    }

    #[test]
    fn window_parsing_rejects_inverted_ranges() {
        assert!(parse_windows("09:00-12:00,13:00-18:00").is_some());
        assert!(parse_windows("12:00-09:00").is_none());
        assert!(parse_windows("").is_none());
        assert!(parse_windows("open-close").is_none());
    }

    #[test]
    fn out_of_range_slot_lengths_fall_back_to_hour_slots() {
        let extreme = SlotCatalog::from_windows(&default_windows(), i64::MAX, Vec::new());
        assert_eq!(extreme.slots().len(), 8);
        assert_eq!(extreme.slots()[0].end_time, "10:00");
        let zero = SlotCatalog::from_windows(&default_windows(), 0, Vec::new());
        assert_eq!(zero.slots().len(), 8);
    }

    #[test]
    fn malformed_open_hours_keep_the_other_settings() {
        let catalog = SlotCatalog::from_env_values(Some("open-close"), Some("30"), Some("mon"));
        assert_eq!(catalog.slots().len(), 16);
        assert_eq!(catalog.slots()[0].end_time, "09:30");
        // 2025-06-01 is a Sunday, 2025-06-02 a Monday.
        assert!(catalog.is_closed(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()));
        assert!(!catalog.is_closed(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
    }

    #[test]
    fn unparseable_env_values_leave_the_defaults() {
        let catalog = SlotCatalog::from_env_values(None, Some("banana"), None);
        assert_eq!(catalog.slots().len(), 8);
        assert!(catalog.is_closed(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
    }

    #[actix_web::test]
    async fn availability_excludes_booked_slots_in_order() {
        let pool = test_support::test_pool().await;
        let catalog = SlotCatalog::default();
        let service = test_support::insert_service(&pool, "Haircut", 45).await;
        let barber = test_support::insert_barber(&pool, "Tony").await;

        for slot in ["2", "5"] {
            test_support::insert_booking(&pool, &service, &barber, "2025-06-02", slot, "PENDING")
                .await;
        }
        // Cancelled bookings do not block the slot.
        test_support::insert_booking(&pool, &service, &barber, "2025-06-02", "7", "CANCELLED")
            .await;

        let availability =
            resolve_available_slots(&pool, &catalog, "2025-06-02", &service, &barber)
                .await
                .unwrap();

        let ids: Vec<&str> = availability
            .time_slots
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3", "4", "6", "7", "8"]);
        assert_eq!(availability.meta.service_duration, 45);
        assert!(!availability.meta.closed);
    }

    #[actix_web::test]
    async fn availability_is_empty_on_closed_days() {
        let pool = test_support::test_pool().await;
        let catalog = SlotCatalog::default();
        let service = test_support::insert_service(&pool, "Haircut", 45).await;
        let barber = test_support::insert_barber(&pool, "Tony").await;

        // 2025-06-01 is a Sunday.
        let availability =
            resolve_available_slots(&pool, &catalog, "2025-06-01", &service, &barber)
                .await
                .unwrap();
        assert!(availability.meta.closed);
        assert!(availability.time_slots.is_empty());
    }

    #[actix_web::test]
    async fn availability_rejects_unknown_references() {
        let pool = test_support::test_pool().await;
        let catalog = SlotCatalog::default();
        let service = test_support::insert_service(&pool, "Haircut", 45).await;

        let err = resolve_available_slots(&pool, &catalog, "2025-06-02", &service, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = resolve_available_slots(&pool, &catalog, "2025-06-02", "missing", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let barber = test_support::insert_barber(&pool, "Tony").await;
        let err = resolve_available_slots(&pool, &catalog, "junk", &service, &barber)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }
}
