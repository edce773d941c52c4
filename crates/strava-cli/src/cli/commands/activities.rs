//! Activity commands for strava-cli

use chrono::{Local, NaiveDate, TimeZone};
use serde_json::{json, Value};

use crate::cli::output::{print_json, render_details, render_table};
use crate::client::{ActivityQuery, StravaClient};
use crate::config::Config;
use crate::error::{Result, StravaError};
use crate::models::{Activity, ActivityUpdate};

use super::auth::authenticate;

/// List activities
pub async fn list(
    config: &Config,
    limit: u32,
    after: Option<String>,
    before: Option<String>,
    json_output: bool,
) -> Result<()> {
    let query = ActivityQuery {
        limit,
        after: after.as_deref().map(parse_date_bound).transpose()?,
        before: before.as_deref().map(parse_date_bound).transpose()?,
    };

    let token = authenticate(config).await?;
    let client = StravaClient::new()?;

    let activities = client
        .list_activities(&token, &query)
        .await?
        .iter()
        .map(Activity::normalize)
        .collect::<Result<Vec<_>>>()?;

    if json_output {
        let payload: Vec<Value> = activities
            .iter()
            .map(|a| Value::Object(a.to_transport()))
            .collect();
        return print_json(&json!({
            "activities": payload,
            "count": activities.len(),
        }));
    }

    if activities.is_empty() {
        println!("No activities found.");
        return Ok(());
    }

    println!("Your Strava Activities (showing {})\n", activities.len());
    let rows: Vec<_> = activities.iter().map(Activity::to_display_row).collect();
    print!("{}", render_table(&rows));

    Ok(())
}

/// Get activity details
pub async fn get(config: &Config, id: u64, json_output: bool) -> Result<()> {
    let token = authenticate(config).await?;
    let client = StravaClient::new()?;

    let activity = Activity::normalize(&client.get_activity(&token, id).await?)?;

    if json_output {
        return print_json(&Value::Object(activity.to_transport()));
    }

    println!("\nActivity: {}", activity.name);
    println!("ID: {}\n", activity.id);
    print!("{}", render_details(&activity.detail_rows()));
    println!();

    Ok(())
}

/// Update activity fields
pub async fn update(
    config: &Config,
    id: u64,
    changes: ActivityUpdate,
    json_output: bool,
) -> Result<()> {
    if changes.is_empty() {
        println!("No updates specified. Use --help to see available options.");
        return Ok(());
    }

    let token = authenticate(config).await?;
    let client = StravaClient::new()?;

    tracing::debug!(id, ?changes, "updating activity");
    let activity = Activity::normalize(&client.update_activity(&token, id, &changes).await?)?;

    if json_output {
        return print_json(&Value::Object(activity.to_transport()));
    }

    println!("Activity {} updated successfully!", id);
    println!("\n{}", activity.name);
    if let Some(description) = activity.description.as_deref().filter(|d| !d.is_empty()) {
        println!("{}", description);
    }

    Ok(())
}

/// Parse a `YYYY-MM-DD` bound into the Unix timestamp of local midnight
fn parse_date_bound(s: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| StravaError::InvalidDateFormat(s.to_string()))?;
    let midnight = date.and_time(chrono::NaiveTime::MIN);

    // a DST gap can swallow midnight; fall back to UTC then
    let timestamp = Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| midnight.and_utc().timestamp());

    Ok(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_bound() {
        let ts = parse_date_bound("2024-03-10").unwrap();
        let local = Local.timestamp_opt(ts, 0).unwrap();
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2024-03-10 00:00");
    }

    #[test]
    fn test_parse_date_bound_rejects_bad_input() {
        for input in ["2024/03/10", "10-03-2024", "2024-13-01", ""] {
            assert!(matches!(
                parse_date_bound(input),
                Err(StravaError::InvalidDateFormat(_))
            ));
        }
    }
}
