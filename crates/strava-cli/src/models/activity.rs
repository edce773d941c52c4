//! Activity data models for the Strava API
//!
//! Activity payloads are loosely typed: the same field can arrive as a number
//! or a numeric string, durations as plain seconds or as structured parts,
//! and the activity type either bare or wrapped. [`Activity::normalize`]
//! applies one explicit rule per field and yields a fully typed record.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StravaError};

/// Type reported when the payload carries neither `type` nor `sport_type`
const UNKNOWN_TYPE: &str = "Unknown";

/// Normalized activity record
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// API-assigned identifier
    pub id: u64,
    pub name: String,
    /// Activity type, e.g. "Run" or "Ride"
    pub activity_type: String,
    pub description: Option<String>,

    /// Moving time in whole seconds
    pub moving_time: u64,
    /// Elapsed time in whole seconds (including pauses)
    pub elapsed_time: u64,
    /// Start instant
    pub start_date: DateTime<Utc>,
    /// Start wall-clock time in the athlete's timezone
    pub start_date_local: NaiveDateTime,

    /// Distance in meters
    pub distance: f64,
    /// Total elevation gain in meters
    pub total_elevation_gain: f64,
    /// Average speed in m/s
    pub average_speed: Option<f64>,
    /// Maximum speed in m/s
    pub max_speed: Option<f64>,
    /// Average heart rate in bpm
    pub average_heartrate: Option<f64>,
    /// Maximum heart rate in bpm
    pub max_heartrate: Option<f64>,
    /// Kilocalories
    pub calories: Option<f64>,

    pub gear_id: Option<String>,
    pub trainer: bool,
    pub commute: bool,
    pub private: bool,
}

/// Activity type, bare or wrapped in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeField {
    Plain(String),
    Wrapped { root: String },
}

impl TypeField {
    fn into_string(self) -> String {
        match self {
            TypeField::Plain(s) | TypeField::Wrapped { root: s } => s,
        }
    }
}

/// Numeric value sent either as a JSON number or a numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberField {
    Number(f64),
    Text(String),
}

impl NumberField {
    fn to_f64(&self, field: &str) -> Result<f64> {
        let value = match self {
            NumberField::Number(n) => *n,
            NumberField::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| StravaError::malformed(field, format!("'{}' is not a number", s)))?,
        };

        if !value.is_finite() {
            return Err(StravaError::malformed(field, "is not a finite number"));
        }
        Ok(value)
    }
}

/// Duration components, as produced by serializing a time delta
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DurationParts {
    days: f64,
    hours: f64,
    minutes: f64,
    seconds: f64,
    microseconds: f64,
}

/// Duration sent as a count of seconds or as structured parts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationField {
    Seconds(NumberField),
    Structured(DurationParts),
}

impl DurationField {
    /// Whole seconds, fractional part truncated toward zero
    fn to_seconds(&self, field: &str) -> Result<u64> {
        let total = match self {
            DurationField::Seconds(n) => n.to_f64(field)?,
            DurationField::Structured(p) => {
                p.days * 86_400.0
                    + p.hours * 3_600.0
                    + p.minutes * 60.0
                    + p.seconds
                    + p.microseconds / 1_000_000.0
            }
        };

        if !total.is_finite() || total < 0.0 {
            return Err(StravaError::malformed(field, "is not a non-negative duration"));
        }
        Ok(total.trunc() as u64)
    }
}

/// Deserialize `key` from the payload; absent and `null` both yield `None`.
fn field<'a, T>(obj: &'a Map<String, Value>, key: &str) -> Result<Option<T>>
where
    T: Deserialize<'a>,
{
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|e| StravaError::malformed(key, format!("has unexpected shape: {}", e))),
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    field::<NumberField>(obj, key)?
        .map(|n| n.to_f64(key))
        .transpose()
}

fn duration(obj: &Map<String, Value>, key: &str) -> Result<u64> {
    Ok(field::<DurationField>(obj, key)?
        .map(|d| d.to_seconds(key))
        .transpose()?
        .unwrap_or(0))
}

fn flag(obj: &Map<String, Value>, key: &str) -> Result<bool> {
    Ok(field::<bool>(obj, key)?.unwrap_or(false))
}

fn parse_instant(raw: &str, key: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StravaError::malformed(key, format!("'{}' is not an RFC 3339 timestamp: {}", raw, e)))
}

/// Local wall-clock time; any offset (Strava appends a meaningless `Z`) is dropped.
fn parse_wall_clock(raw: &str, key: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    raw.parse::<NaiveDateTime>()
        .map_err(|e| StravaError::malformed(key, format!("'{}' is not an ISO-8601 timestamp: {}", raw, e)))
}

fn optional_json(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn format_hm(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}

impl Activity {
    /// Map a raw API payload into a typed record.
    ///
    /// Fails with `MalformedActivity` when `id` or `name` is missing or of the
    /// wrong kind, when `start_date` is missing, or when a present field cannot
    /// be interpreted. Missing optional fields never fail.
    pub fn normalize(payload: &Value) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| StravaError::malformed("payload", "is not a JSON object"))?;

        let id = match obj.get("id") {
            None | Some(Value::Null) => return Err(StravaError::malformed("id", "is missing")),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| StravaError::malformed("id", "must be a non-negative integer"))?,
        };

        let name = match obj.get("name") {
            None | Some(Value::Null) => return Err(StravaError::malformed("name", "is missing")),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(StravaError::malformed("name", "must be a string")),
        };

        let activity_type = match field::<TypeField>(obj, "type")? {
            Some(t) => t.into_string(),
            None => field::<TypeField>(obj, "sport_type")?
                .map(TypeField::into_string)
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
        };

        let start_date = field::<String>(obj, "start_date")?
            .ok_or_else(|| StravaError::malformed("start_date", "is missing"))
            .and_then(|raw| parse_instant(&raw, "start_date"))?;

        let start_date_local = match field::<String>(obj, "start_date_local")? {
            Some(raw) => parse_wall_clock(&raw, "start_date_local")?,
            None => start_date.naive_utc(),
        };

        Ok(Self {
            id,
            name,
            activity_type,
            description: field(obj, "description")?,
            moving_time: duration(obj, "moving_time")?,
            elapsed_time: duration(obj, "elapsed_time")?,
            start_date,
            start_date_local,
            distance: number(obj, "distance")?.unwrap_or(0.0),
            total_elevation_gain: number(obj, "total_elevation_gain")?.unwrap_or(0.0),
            average_speed: number(obj, "average_speed")?,
            max_speed: number(obj, "max_speed")?,
            average_heartrate: number(obj, "average_heartrate")?,
            max_heartrate: number(obj, "max_heartrate")?,
            calories: number(obj, "calories")?,
            gear_id: field(obj, "gear_id")?,
            trainer: flag(obj, "trainer")?,
            commute: flag(obj, "commute")?,
            private: flag(obj, "private")?,
        })
    }

    /// JSON-safe representation with a fixed field order.
    ///
    /// Absent optional fields are rendered as `null`; feeding the result back
    /// through [`normalize`](Self::normalize) yields an equal record.
    pub fn to_transport(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("name".into(), Value::from(self.name.clone()));
        map.insert("type".into(), Value::from(self.activity_type.clone()));
        map.insert("distance".into(), Value::from(self.distance));
        map.insert("moving_time".into(), Value::from(self.moving_time));
        map.insert("elapsed_time".into(), Value::from(self.elapsed_time));
        map.insert(
            "total_elevation_gain".into(),
            Value::from(self.total_elevation_gain),
        );
        map.insert(
            "start_date".into(),
            Value::from(self.start_date.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        map.insert(
            "start_date_local".into(),
            Value::from(
                self.start_date_local
                    .format("%Y-%m-%dT%H:%M:%S%.f")
                    .to_string(),
            ),
        );
        map.insert("average_speed".into(), optional_json(self.average_speed));
        map.insert("max_speed".into(), optional_json(self.max_speed));
        map.insert(
            "average_heartrate".into(),
            optional_json(self.average_heartrate),
        );
        map.insert("max_heartrate".into(), optional_json(self.max_heartrate));
        map.insert(
            "description".into(),
            self.description.clone().map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("calories".into(), optional_json(self.calories));
        map.insert(
            "gear_id".into(),
            self.gear_id.clone().map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("trainer".into(), Value::from(self.trainer));
        map.insert("commute".into(), Value::from(self.commute));
        map.insert("private".into(), Value::from(self.private));
        map
    }

    /// Formatted cells for the activity list table, in column order
    pub fn to_display_row(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ID", self.id.to_string()),
            (
                "Date",
                self.start_date_local.format("%Y-%m-%d %H:%M").to_string(),
            ),
            ("Name", self.name.clone()),
            ("Type", self.activity_type.clone()),
            ("Distance", format!("{:.2} km", self.distance_km())),
            ("Time", format_hm(self.moving_time)),
            ("Elevation", format!("{:.0} m", self.total_elevation_gain)),
        ]
    }

    /// Label/value pairs for the single-activity view.
    ///
    /// Metrics that are absent or zero are left out.
    pub fn detail_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Type", self.activity_type.clone()),
            (
                "Date",
                self.start_date_local
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            ("Distance", format!("{:.2} km", self.distance_km())),
            ("Moving Time", format_hms(self.moving_time)),
            ("Elapsed Time", format_hms(self.elapsed_time)),
            (
                "Elevation Gain",
                format!("{:.0} m", self.total_elevation_gain),
            ),
        ];

        let reported = |v: Option<f64>| v.filter(|x| *x != 0.0);

        if let Some(speed) = reported(self.average_speed) {
            rows.push(("Average Speed", format!("{:.2} km/h", speed * 3.6)));
        }
        if let Some(speed) = reported(self.max_speed) {
            rows.push(("Max Speed", format!("{:.2} km/h", speed * 3.6)));
        }
        if let Some(hr) = reported(self.average_heartrate) {
            rows.push(("Average HR", format!("{:.0} bpm", hr)));
        }
        if let Some(hr) = reported(self.max_heartrate) {
            rows.push(("Max HR", format!("{:.0} bpm", hr)));
        }
        if let Some(kcal) = reported(self.calories) {
            rows.push(("Calories", format!("{:.0}", kcal)));
        }

        rows.push(("Trainer", yes_no(self.trainer)));
        rows.push(("Commute", yes_no(self.commute)));

        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            rows.push(("Description", description.to_string()));
        }

        rows
    }

    /// Distance in kilometers
    pub fn distance_km(&self) -> f64 {
        self.distance / 1000.0
    }
}

fn yes_no(value: bool) -> String {
    let label = if value { "Yes" } else { "No" };
    label.to_string()
}

/// Editable activity fields; unset fields are left untouched by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// An empty string clears the description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub commute: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gear_id: Option<String>,
}

impl ActivityUpdate {
    /// True when no field would be changed
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.activity_type.is_none()
            && self.commute.is_none()
            && self.trainer.is_none()
            && self.gear_id.is_none()
    }
}
