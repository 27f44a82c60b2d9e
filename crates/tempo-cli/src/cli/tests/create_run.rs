//! Tests for create and run subcommands.

use chrono::NaiveDate;
use tempo_core::model::{QualityTier, Weekdays};

use super::{parse, parse_err};
use crate::cli::CliCommand;

#[test]
fn cli_parse_create_preset() {
    match parse(&[
        "tempo", "create", "--region", "houston", "--start", "2024-06-14", "--end", "2024-06-15",
    ]) {
        CliCommand::Create {
            region,
            start,
            end,
            products,
            hours,
            workers,
            ..
        } => {
            assert_eq!(region.region.as_deref(), Some("houston"));
            assert!(region.bbox.is_none() && region.center.is_none());
            assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
            assert_eq!(end, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
            assert_eq!(products, "no2");
            assert!(hours.is_none());
            assert!(workers.is_none());
        }
        _ => panic!("expected Create"),
    }
}

#[test]
fn cli_parse_create_bbox_with_negative_longitudes() {
    match parse(&[
        "tempo",
        "create",
        "--bbox",
        "-119.68,32.23,-116.38,35.73",
        "--start",
        "2024-06-14",
        "--end",
        "2024-06-14",
        "--products",
        "no2,hcho",
        "--min-quality",
        "high",
        "--weekdays",
        "weekdays",
    ]) {
        CliCommand::Create {
            region,
            products,
            min_quality,
            weekdays,
            ..
        } => {
            assert_eq!(region.bbox, Some([-119.68, 32.23, -116.38, 35.73]));
            assert_eq!(products, "no2,hcho");
            assert_eq!(min_quality, Some(QualityTier::High));
            assert_eq!(weekdays, Some("weekdays".parse::<Weekdays>().unwrap()));
        }
        _ => panic!("expected Create with --bbox"),
    }
}

#[test]
fn cli_parse_create_center() {
    match parse(&[
        "tempo", "create", "--center", "40.76,-111.89", "--radius-km", "25", "--start",
        "2024-06-14", "--end", "2024-06-20", "--hours", "16-20", "--workers", "3",
    ]) {
        CliCommand::Create {
            region,
            radius_km,
            hours,
            workers,
            ..
        } => {
            assert_eq!(region.center, Some((40.76, -111.89)));
            assert_eq!(radius_km, 25.0);
            assert_eq!(hours.as_deref(), Some("16-20"));
            assert_eq!(workers, Some(3));
        }
        _ => panic!("expected Create with --center"),
    }
}

#[test]
fn cli_create_requires_exactly_one_region() {
    parse_err(&["tempo", "create", "--start", "2024-06-14", "--end", "2024-06-14"]);
    parse_err(&[
        "tempo", "create", "--region", "houston", "--center", "40,-111", "--start", "2024-06-14",
        "--end", "2024-06-14",
    ]);
    parse_err(&[
        "tempo", "create", "--bbox", "1,2,3", "--start", "2024-06-14", "--end", "2024-06-14",
    ]);
}

#[test]
fn cli_parse_run() {
    match parse(&["tempo", "run"]) {
        CliCommand::Run { id, workers } => {
            assert!(id.is_none());
            assert!(workers.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_one_job_with_workers() {
    match parse(&["tempo", "run", "7", "--workers", "2"]) {
        CliCommand::Run { id, workers } => {
            assert_eq!(id, Some(7));
            assert_eq!(workers, Some(2));
        }
        _ => panic!("expected Run with id"),
    }
}
