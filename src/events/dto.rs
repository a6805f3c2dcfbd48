use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{
    format_description::well_known::{Iso8601, Rfc3339},
    OffsetDateTime, PrimitiveDateTime,
};

use crate::error::{ApiError, ApiResult};
use crate::events::repo::{Event, NewEvent};

/// Event projection returned to clients.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: i64,
    pub title: String,
    pub sport: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    pub address: Option<String>,
    pub capacity: i32,
    pub price: i32,
    pub is_free: bool,
    pub user_id: i64,
    pub image_url: Option<String>,
}

impl From<Event> for EventView {
    fn from(e: Event) -> Self {
        Self {
            id: e.id,
            title: e.title,
            sport: e.sport,
            description: e.description,
            datetime: e.datetime,
            address: e.address,
            capacity: e.capacity,
            price: e.price,
            is_free: e.is_free,
            user_id: e.user_id,
            image_url: e.image_url,
        }
    }
}

/// Request body for event creation. Required fields are validated in
/// `into_new_event` so a missing key maps to 400, not a serde rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub sport: Option<String>,
    pub description: Option<String>,
    pub datetime: Option<String>,
    pub address: Option<String>,
    pub capacity: Option<Value>,
    pub price: Option<Value>,
    pub image_url: Option<String>,
}

impl CreateEventRequest {
    pub fn into_new_event(self) -> ApiResult<NewEvent> {
        let (Some(title), Some(sport), Some(datetime), Some(address), Some(capacity), Some(price)) = (
            self.title,
            self.sport,
            self.datetime,
            self.address,
            self.capacity,
            self.price,
        ) else {
            return Err(ApiError::Validation("Missing required fields".into()));
        };

        let datetime = parse_event_datetime(&datetime)?;
        let capacity = coerce_int("capacity", &capacity)?;
        let price = coerce_int("price", &price)?;
        check_ranges(capacity, price)?;

        Ok(NewEvent {
            title,
            sport,
            description: self.description,
            datetime,
            address,
            capacity,
            price,
            image_url: self.image_url,
        })
    }
}

/// Partial update for an event. Every field goes through a typed coercer,
/// so a string column stays a string no matter what JSON type arrived.
#[derive(Debug, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<Value>,
    pub sport: Option<Value>,
    pub description: Option<Value>,
    pub address: Option<Value>,
    pub datetime: Option<Value>,
    pub capacity: Option<Value>,
    pub price: Option<Value>,
}

impl EventPatch {
    /// Coerce every provided field first, then assign; a bad value leaves
    /// the event untouched. `is_free` is recomputed unconditionally.
    pub fn apply(&self, event: &mut Event) -> ApiResult<()> {
        let title = self.title.as_ref().map(|v| coerce_string("title", v)).transpose()?;
        let sport = self.sport.as_ref().map(|v| coerce_string("sport", v)).transpose()?;
        let description = self
            .description
            .as_ref()
            .map(|v| coerce_string("description", v))
            .transpose()?;
        let address = self
            .address
            .as_ref()
            .map(|v| coerce_string("address", v))
            .transpose()?;
        let datetime = self
            .datetime
            .as_ref()
            .map(|v| coerce_string("datetime", v).and_then(|s| parse_event_datetime(&s)))
            .transpose()?;
        let capacity = self.capacity.as_ref().map(|v| coerce_int("capacity", v)).transpose()?;
        let price = self.price.as_ref().map(|v| coerce_int("price", v)).transpose()?;

        check_ranges(
            capacity.unwrap_or(event.capacity),
            price.unwrap_or(event.price),
        )?;

        if let Some(v) = title {
            event.title = v;
        }
        if let Some(v) = sport {
            event.sport = v;
        }
        if let Some(v) = description {
            event.description = Some(v);
        }
        if let Some(v) = address {
            event.address = Some(v);
        }
        if let Some(v) = datetime {
            event.datetime = v;
        }
        if let Some(v) = capacity {
            event.capacity = v;
        }
        if let Some(v) = price {
            event.price = v;
        }

        event.is_free = event.price == 0;
        Ok(())
    }
}

/// Parse an ISO-8601 timestamp. Accepts an explicit offset ("Z" included)
/// and a naive timestamp, which is taken as UTC.
pub(crate) fn parse_event_datetime(raw: &str) -> ApiResult<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
        return Ok(dt);
    }
    PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
        .map(|dt| dt.assume_utc())
        .map_err(|_| ApiError::Validation("Invalid datetime format (use ISO 8601)".into()))
}

pub(crate) fn coerce_int(field: &str, value: &Value) -> ApiResult<i32> {
    let parsed = match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                i32::try_from(v).ok()
            } else {
                // Whole-number floats are fine; 10.5 is not an integer.
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .and_then(|f| {
                        if f >= i32::MIN as f64 && f <= i32::MAX as f64 {
                            Some(f as i32)
                        } else {
                            None
                        }
                    })
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::Validation(format!("Field '{}' must be an integer", field)))
}

pub(crate) fn coerce_string(field: &str, value: &Value) -> ApiResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ApiError::Validation(format!(
            "Field '{}' must be a string",
            field
        ))),
    }
}

fn check_ranges(capacity: i32, price: i32) -> ApiResult<()> {
    if price < 0 {
        return Err(ApiError::Validation("Price cannot be negative".into()));
    }
    if capacity < 1 {
        return Err(ApiError::Validation("Capacity must be at least 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Event {
        Event {
            id: 1,
            title: "5-a-side".into(),
            sport: "football".into(),
            description: None,
            datetime: time::macros::datetime!(2025-01-01 10:00:00 UTC),
            address: Some("Park".into()),
            capacity: 10,
            price: 0,
            is_free: true,
            user_id: 1,
            image_url: None,
        }
    }

    #[test]
    fn parses_utc_z_designator() {
        let dt = parse_event_datetime("2025-01-01T10:00:00Z").unwrap();
        assert_eq!(dt, time::macros::datetime!(2025-01-01 10:00:00 UTC));
    }

    #[test]
    fn parses_explicit_offset() {
        let dt = parse_event_datetime("2025-01-01T12:00:00+02:00").unwrap();
        assert_eq!(dt, time::macros::datetime!(2025-01-01 10:00:00 UTC));
    }

    #[test]
    fn naive_timestamp_is_taken_as_utc() {
        let dt = parse_event_datetime("2025-01-01T10:00:00").unwrap();
        assert_eq!(dt, time::macros::datetime!(2025-01-01 10:00:00 UTC));
    }

    #[test]
    fn rejects_garbage_datetime() {
        assert!(parse_event_datetime("next tuesday").is_err());
        assert!(parse_event_datetime("").is_err());
    }

    #[test]
    fn coerce_int_accepts_numbers_and_numeric_strings() {
        assert_eq!(coerce_int("capacity", &json!(10)).unwrap(), 10);
        assert_eq!(coerce_int("capacity", &json!("10")).unwrap(), 10);
        assert_eq!(coerce_int("capacity", &json!(" 7 ")).unwrap(), 7);
        assert_eq!(coerce_int("price", &json!(10.0)).unwrap(), 10);
    }

    #[test]
    fn coerce_int_rejects_non_numeric() {
        assert!(coerce_int("capacity", &json!("abc")).is_err());
        assert!(coerce_int("capacity", &json!(10.5)).is_err());
        assert!(coerce_int("capacity", &json!(true)).is_err());
        assert!(coerce_int("capacity", &json!(null)).is_err());
    }

    #[test]
    fn coerce_string_keeps_columns_textual() {
        assert_eq!(coerce_string("title", &json!("padel")).unwrap(), "padel");
        assert_eq!(coerce_string("title", &json!(5)).unwrap(), "5");
        assert!(coerce_string("title", &json!([1, 2])).is_err());
    }

    #[test]
    fn create_computes_fields_and_validates() {
        let req = CreateEventRequest {
            title: Some("5-a-side".into()),
            sport: Some("football".into()),
            datetime: Some("2025-01-01T10:00:00Z".into()),
            address: Some("Park".into()),
            capacity: Some(json!(10)),
            price: Some(json!(0)),
            ..Default::default()
        };
        let new = req.into_new_event().unwrap();
        assert_eq!(new.capacity, 10);
        assert_eq!(new.price, 0);
    }

    #[test]
    fn create_rejects_missing_required_fields() {
        let req = CreateEventRequest {
            title: Some("5-a-side".into()),
            ..Default::default()
        };
        let err = req.into_new_event().unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn create_rejects_bad_datetime() {
        let req = CreateEventRequest {
            title: Some("t".into()),
            sport: Some("s".into()),
            datetime: Some("not-a-date".into()),
            address: Some("a".into()),
            capacity: Some(json!(5)),
            price: Some(json!(0)),
            ..Default::default()
        };
        assert!(matches!(
            req.into_new_event().unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn create_rejects_negative_price_and_zero_capacity() {
        let base = |capacity: Value, price: Value| CreateEventRequest {
            title: Some("t".into()),
            sport: Some("s".into()),
            datetime: Some("2025-01-01T10:00:00Z".into()),
            address: Some("a".into()),
            capacity: Some(capacity),
            price: Some(price),
            ..Default::default()
        };
        assert!(base(json!(10), json!(-1)).into_new_event().is_err());
        assert!(base(json!(0), json!(0)).into_new_event().is_err());
    }

    #[test]
    fn patch_price_recomputes_is_free() {
        let mut event = sample_event();
        assert!(event.is_free);

        let patch = EventPatch {
            price: Some(json!(5)),
            ..Default::default()
        };
        patch.apply(&mut event).unwrap();
        assert_eq!(event.price, 5);
        assert!(!event.is_free);

        let patch = EventPatch {
            price: Some(json!("0")),
            ..Default::default()
        };
        patch.apply(&mut event).unwrap();
        assert_eq!(event.price, 0);
        assert!(event.is_free);
    }

    #[test]
    fn patch_coerces_each_field_to_its_column_type() {
        let mut event = sample_event();
        let patch = EventPatch {
            title: Some(json!(42)),
            capacity: Some(json!("12")),
            datetime: Some(json!("2025-06-01T18:30:00Z")),
            ..Default::default()
        };
        patch.apply(&mut event).unwrap();
        assert_eq!(event.title, "42");
        assert_eq!(event.capacity, 12);
        assert_eq!(
            event.datetime,
            time::macros::datetime!(2025-06-01 18:30:00 UTC)
        );
    }

    #[test]
    fn failed_patch_leaves_event_untouched() {
        let mut event = sample_event();
        let patch = EventPatch {
            title: Some(json!("new title")),
            capacity: Some(json!("not-a-number")),
            ..Default::default()
        };
        assert!(patch.apply(&mut event).is_err());
        assert_eq!(event.title, "5-a-side");
        assert_eq!(event.capacity, 10);
    }

    #[test]
    fn view_serializes_datetime_as_iso8601() {
        let view: EventView = sample_event().into();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["datetime"], "2025-01-01T10:00:00Z");
        assert_eq!(json["is_free"], true);
    }
}
