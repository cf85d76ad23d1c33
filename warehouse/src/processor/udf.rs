use common::Result;
use datafusion::arrow::array::{Int32Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::DataType;
use datafusion::common::DataFusionError;
use datafusion::logical_expr::ColumnarValue;
use datafusion::logical_expr::{create_udf, ScalarUDF, Volatility};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use std::sync::Arc;

/// Render format of the event timestamp column: UTC, second resolution.
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Epoch milliseconds rendered as a UTC calendar string. Null or out-of-range
/// inputs yield null.
pub fn event_time_udf() -> ScalarUDF {
    create_udf(
        "event_time_from_ms",
        vec![DataType::Int64],
        DataType::Utf8,
        Volatility::Immutable,
        Arc::new(|args| format_event_time(args).map_err(|e| DataFusionError::Internal(e.to_string()))),
    )
}

pub fn hour_udf() -> ScalarUDF {
    part_udf("event_hour", |dt| dt.hour() as i32)
}

pub fn day_udf() -> ScalarUDF {
    part_udf("event_day", |dt| dt.day() as i32)
}

/// ISO week of year, 1 through 53.
pub fn week_udf() -> ScalarUDF {
    part_udf("event_week", |dt| dt.iso_week().week() as i32)
}

pub fn month_udf() -> ScalarUDF {
    part_udf("event_month", |dt| dt.month() as i32)
}

pub fn year_udf() -> ScalarUDF {
    part_udf("event_year", |dt| dt.year())
}

/// Day of week numbered 1 = Sunday through 7 = Saturday.
pub fn weekday_udf() -> ScalarUDF {
    part_udf("event_weekday", |dt| dt.weekday().number_from_sunday() as i32)
}

fn part_udf(name: &str, part: fn(&NaiveDateTime) -> i32) -> ScalarUDF {
    create_udf(
        name,
        vec![DataType::Utf8],
        DataType::Int32,
        Volatility::Immutable,
        Arc::new(move |args| {
            extract_part(args, part).map_err(|e| DataFusionError::Internal(e.to_string()))
        }),
    )
}

/// Formats epoch milliseconds as an EVENT_TIME_FORMAT string
fn format_event_time(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let ts_array = match &args[0] {
        ColumnarValue::Array(array) => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| DataFusionError::Internal("Expected int64 array".to_string()))?,
        ColumnarValue::Scalar(_) => {
            return Err(DataFusionError::Internal("Scalar inputs not supported".to_string()).into());
        }
    };

    let result: StringArray = ts_array
        .iter()
        .map(|opt_ts| {
            opt_ts.and_then(|ts| {
                DateTime::from_timestamp_millis(ts)
                    .map(|dt| dt.naive_utc().format(EVENT_TIME_FORMAT).to_string())
            })
        })
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}

/// Extracts one calendar part from a formatted event time string. Strings
/// that do not parse yield null rather than an error.
fn extract_part(args: &[ColumnarValue], part: fn(&NaiveDateTime) -> i32) -> Result<ColumnarValue> {
    let time_array = match &args[0] {
        ColumnarValue::Array(array) => array
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| DataFusionError::Internal("Expected string array".to_string()))?,
        ColumnarValue::Scalar(_) => {
            return Err(DataFusionError::Internal("Scalar inputs not supported".to_string()).into());
        }
    };

    let result: Int32Array = time_array
        .iter()
        .map(|opt_time| {
            opt_time
                .and_then(|s| NaiveDateTime::parse_from_str(s, EVENT_TIME_FORMAT).ok())
                .map(|dt| part(&dt))
        })
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}
