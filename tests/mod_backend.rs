use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tempfile::tempdir;
use timegrain::backend::by_name;
use timegrain::backends::fs::{FILEPATH_FORMAT_DEFAULT, FileSystemBackend};
use timegrain::backends::print::PrintBackend;
use timegrain::{Backend, FieldType, Point, Storage, StoreError, TableSchema, Value};

fn weather_schema() -> Arc<TableSchema> {
    Arc::new(
        TableSchema::builder("weather")
            .dimension("city", FieldType::text(32))
            .attribute("temperature", FieldType::decimal(10, 2))
            .attribute("rainfall", FieldType::Integer)
            .attribute(
                "description",
                FieldType::enumeration([("SUNNY", 0u16), ("CLOUDY", 1), ("SNOWY", 2)]),
            )
            .build()
            .unwrap(),
    )
}

fn weather_point(schema: &Arc<TableSchema>, timestamp: DateTime<Utc>) -> Point {
    Point::new(schema, timestamp)
        .with("city", Value::Text("Sao Paulo".to_string()))
        .with("temperature", Value::Decimal(Decimal::new(2150, 2)))
        .with("rainfall", Value::Integer(0))
        .with("description", Value::Enum("SUNNY".to_string()))
}

fn sao_paulo() -> HashMap<String, Value> {
    HashMap::from([("city".to_string(), Value::Text("Sao Paulo".to_string()))])
}

fn collect(
    backend: &mut FileSystemBackend,
    schema: &Arc<TableSchema>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Vec<Point> {
    backend
        .query(schema, &sao_paulo(), start, end)
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

#[test]
fn test_single_point_round_trip() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();
    backend.prepare_type(&schema).unwrap();

    let point = weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap());
    backend.persist(&point).unwrap();
    backend.commit().unwrap();

    let day_file = dir.path().join("weather/city/Sao Paulo/2023/04/01");
    assert_eq!(fs::metadata(&day_file).unwrap().len(), 46);

    let results = collect(
        &mut backend,
        &schema,
        Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(),
        Some(Utc.with_ymd_and_hms(2023, 4, 1, 23, 59, 59).unwrap()),
    );
    assert_eq!(results, vec![point]);
}

#[test]
fn test_out_of_order_appends_come_back_sorted() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();

    let base = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
    for seconds in [10i64, 2, 9, 4, 7, 1, 5, 3, 8, 6] {
        backend.persist(&weather_point(&schema, base + chrono::TimeDelta::seconds(seconds))).unwrap();
    }
    backend.commit().unwrap();

    let results = collect(&mut backend, &schema, base, None);
    let seconds: Vec<i64> = results.iter().map(|point| point.timestamp().timestamp() - base.timestamp()).collect();
    assert_eq!(seconds, (1..=10).collect::<Vec<i64>>());
}

#[test]
fn test_second_session_merges_into_the_first() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let base = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();

    let mut session_a = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();
    for seconds in [1i64, 3, 5, 7, 9] {
        session_a.persist(&weather_point(&schema, base + chrono::TimeDelta::seconds(seconds))).unwrap();
    }
    session_a.commit().unwrap();

    let mut session_b = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();
    for seconds in [2i64, 4, 6, 8, 10] {
        session_b.persist(&weather_point(&schema, base + chrono::TimeDelta::seconds(seconds))).unwrap();
    }
    session_b.commit().unwrap();

    let results = collect(&mut session_b, &schema, base, None);
    let seconds: Vec<i64> = results.iter().map(|point| point.timestamp().timestamp() - base.timestamp()).collect();
    assert_eq!(seconds, (1..=10).collect::<Vec<i64>>());
}

#[test]
fn test_range_query_prunes_other_days() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();

    for day in 1..=3 {
        backend
            .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, day, 12, 0, 0).unwrap()))
            .unwrap();
    }
    backend.commit().unwrap();
    assert!(dir.path().join("weather/city/Sao Paulo/2023/04/01").is_file());
    assert!(dir.path().join("weather/city/Sao Paulo/2023/04/03").is_file());

    let results = collect(
        &mut backend,
        &schema,
        Utc.with_ymd_and_hms(2023, 4, 2, 0, 0, 0).unwrap(),
        Some(Utc.with_ymd_and_hms(2023, 4, 2, 23, 59, 59).unwrap()),
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].timestamp(), Utc.with_ymd_and_hms(2023, 4, 2, 12, 0, 0).unwrap());
}

#[test]
fn test_query_spans_days_in_ascending_date_order() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();

    // persisted newest-first on purpose
    for day in [3u32, 1, 2] {
        backend
            .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, day, 12, 0, 0).unwrap()))
            .unwrap();
    }
    backend.commit().unwrap();

    let results = collect(&mut backend, &schema, Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None);
    let days: Vec<u32> = results.iter().map(|point| chrono::Datelike::day(&point.timestamp())).collect();
    assert_eq!(days, vec![1, 2, 3]);
}

#[test]
fn test_end_time_stops_inside_a_day_file() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();

    for hour in [8u32, 10, 12, 14] {
        backend
            .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, hour, 0, 0).unwrap()))
            .unwrap();
    }
    backend.commit().unwrap();

    let results = collect(
        &mut backend,
        &schema,
        Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(),
        Some(Utc.with_ymd_and_hms(2023, 4, 1, 11, 0, 0).unwrap()),
    );
    let hours: Vec<u32> = results.iter().map(|point| chrono::Timelike::hour(&point.timestamp())).collect();
    assert_eq!(hours, vec![8, 10]);
}

#[test]
fn test_other_dimension_values_are_not_visited() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();

    backend
        .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap()))
        .unwrap();
    backend.commit().unwrap();

    let dimensions = HashMap::from([("city".to_string(), Value::Text("Rio".to_string()))]);
    let results: Vec<Point> = backend
        .query(&schema, &dimensions, Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert!(results.is_empty());
}

#[test]
fn test_template_without_dimensions_flattens_the_tree() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend =
        FileSystemBackend::new(dir.path(), "{table}/{year}/{month:02d}/{day:02d}").unwrap();

    backend
        .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap()))
        .unwrap();
    backend.commit().unwrap();

    assert!(dir.path().join("weather/2023/04/01").is_file());
}

#[test]
fn test_query_before_any_write_is_empty() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();
    let results = collect(&mut backend, &schema, Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None);
    assert!(results.is_empty());
}

#[test]
fn test_unbound_query_dimension_fails() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();
    let result = backend.query(&schema, &HashMap::new(), Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None);
    assert!(matches!(result, Err(StoreError::Schema(_))));
}

#[test]
fn test_commit_is_reusable_within_a_session() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let mut backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();

    backend
        .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 8, 0, 0).unwrap()))
        .unwrap();
    backend.commit().unwrap();
    backend.commit().unwrap();

    backend
        .persist(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 9, 0, 0).unwrap()))
        .unwrap();
    backend.commit().unwrap();

    let results = collect(&mut backend, &schema, Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None);
    assert_eq!(results.len(), 2);
}

#[test]
fn test_storage_frontend_round_trip() {
    let dir = tempdir().unwrap();
    let schema = weather_schema();
    let backend = FileSystemBackend::new(dir.path(), FILEPATH_FORMAT_DEFAULT).unwrap();
    let mut storage = Storage::with_backend(Box::new(backend));
    storage.prepare_type(&schema).unwrap();

    let point = weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap());
    storage.add(&point).unwrap();
    storage.commit().unwrap();

    let results: Vec<Point> = storage
        .query(&schema, &sao_paulo(), Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(results, vec![point]);
}

#[test]
fn test_print_backend_accepts_writes_and_yields_nothing() {
    let schema = weather_schema();
    let mut storage = Storage::with_backend(Box::new(PrintBackend::new()));
    storage.prepare_type(&schema).unwrap();
    storage
        .add(&weather_point(&schema, Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap()))
        .unwrap();
    let results: Vec<Point> = storage
        .query(&schema, &sao_paulo(), Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap(), None)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert!(results.is_empty());
    storage.commit().unwrap();
}

#[test]
fn test_unknown_backend_name_fails() {
    assert!(matches!(by_name("carrier-pigeon"), Err(StoreError::Config(_))));
}
