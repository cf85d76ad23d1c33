use arrow::datatypes::{DataType, Field, Schema};
use lazy_static::lazy_static;

// Raw source schemas. Reads never infer: both layouts are declared up front,
// unknown JSON keys in the files are ignored and missing keys read as null.
pub fn raw_song_schema() -> Schema {
    Schema::new(vec![
        Field::new("song_id", DataType::Utf8, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("artist_name", DataType::Utf8, true),
        Field::new("artist_location", DataType::Utf8, true),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
        Field::new("year", DataType::Int64, true),
        Field::new("duration", DataType::Float64, true),
    ])
}

pub fn raw_log_schema() -> Schema {
    Schema::new(vec![
        Field::new("userId", DataType::Utf8, true),
        Field::new("firstName", DataType::Utf8, true),
        Field::new("lastName", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("page", DataType::Utf8, true),
        Field::new("song", DataType::Utf8, true),
        Field::new("ts", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("userAgent", DataType::Utf8, true),
    ])
}

// Lazy-loaded static schemas
lazy_static! {
    pub static ref RAW_SONG_SCHEMA: Schema = raw_song_schema();
    pub static ref RAW_LOG_SCHEMA: Schema = raw_log_schema();
}
