//! `astroplanner` command-line tool
//!
//! ```text
//! astroplanner tonight <snapshot.json> [YYYY-MM-DD]
//! astroplanner export <snapshot.json> <target-id> [YYYY-MM-DD]
//! ```
//!
//! The night defaults to today's local date at the observer.

mod logging;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};

use astroplanner_planner::hms::format_hms_short;
use astroplanner_planner::{
    export_for_target, recommend_tonight, LowPrecisionEphemeris, PlannerSnapshot, Recommendation, TargetId,
};

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Tonight {
        snapshot: PathBuf,
        night: Option<NaiveDate>,
    },
    Export {
        snapshot: PathBuf,
        target: TargetId,
        night: Option<NaiveDate>,
    },
}

const USAGE: &str = "Usage:\n  astroplanner tonight <snapshot.json> [YYYY-MM-DD]\n  astroplanner export <snapshot.json> <target-id> [YYYY-MM-DD]";

fn parse_night(arg: Option<&String>) -> Result<Option<NaiveDate>> {
    arg.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{}'", s)))
        .transpose()
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        Some("tonight") if (2..=3).contains(&args.len()) => Ok(Command::Tonight {
            snapshot: PathBuf::from(&args[1]),
            night: parse_night(args.get(2))?,
        }),
        Some("export") if (3..=4).contains(&args.len()) => {
            let id: i64 = args[2]
                .parse()
                .with_context(|| format!("invalid target id '{}'", args[2]))?;
            Ok(Command::Export {
                snapshot: PathBuf::from(&args[1]),
                target: TargetId(id),
                night: parse_night(args.get(3))?,
            })
        }
        _ => bail!("{}", USAGE),
    }
}

/// Today's date in the observer's timezone
fn default_night(snapshot: &PlannerSnapshot) -> NaiveDate {
    let now = Utc::now();
    match snapshot.settings.observer.as_ref().and_then(|o| o.timezone().ok()) {
        Some(tz) => now.with_timezone(&tz).date_naive(),
        None => now.date_naive(),
    }
}

fn load(path: &Path) -> Result<PlannerSnapshot> {
    PlannerSnapshot::load(path).with_context(|| format!("failed to load snapshot {}", path.display()))
}

fn print_recommendation(rec: &Recommendation) {
    println!("Night of {}", rec.night);
    match rec.best() {
        Some(best) => println!("Tonight: {} ({})\n", best.name, best.rationale),
        None => println!("Nothing observable tonight\n"),
    }

    for (i, result) in rec.ranking.iter().enumerate() {
        let window = rec
            .windows
            .get(&result.id)
            .and_then(|w| w.effective)
            .map(|span| {
                format!(
                    "{} - {} UTC ({})",
                    span.start.format("%H:%M"),
                    span.end.format("%H:%M"),
                    format_hms_short(span.duration().num_seconds() as f64)
                )
            })
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>2}. {:<20} {:>6.3}  {:<28} {}",
            i + 1,
            result.name,
            result.score,
            window,
            result.rationale
        );
    }

    for skipped in &rec.skipped {
        println!("    skipped {} '{}': {}", skipped.id, skipped.name, skipped.reason);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Tonight { snapshot, night } => {
            let snapshot = load(&snapshot)?;
            let night = night.unwrap_or_else(|| default_night(&snapshot));
            let rec = recommend_tonight(&snapshot, night, &LowPrecisionEphemeris)?;
            print_recommendation(&rec);
        }
        Command::Export {
            snapshot,
            target,
            night,
        } => {
            let snapshot = load(&snapshot)?;
            let night = night.unwrap_or_else(|| default_night(&snapshot));
            let doc = export_for_target(&snapshot, target, night, Utc::now(), &LowPrecisionEphemeris)
                .with_context(|| format!("export of target {} failed", target))?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let _guard = logging::init(env::var_os(logging::LOG_DIR_ENV).map(PathBuf::from));

    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_command(&args)?;
    tracing::debug!("Running {:?}", command);
    run(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_tonight() {
        let cmd = parse_command(&args(&["tonight", "snap.json", "2025-10-15"])).unwrap();
        assert_eq!(
            cmd,
            Command::Tonight {
                snapshot: PathBuf::from("snap.json"),
                night: NaiveDate::from_ymd_opt(2025, 10, 15),
            }
        );
        let cmd = parse_command(&args(&["tonight", "snap.json"])).unwrap();
        assert!(matches!(cmd, Command::Tonight { night: None, .. }));
    }

    #[test]
    fn test_parse_export() {
        let cmd = parse_command(&args(&["export", "snap.json", "7"])).unwrap();
        assert!(matches!(cmd, Command::Export { target: TargetId(7), night: None, .. }));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command(&args(&[])).is_err());
        assert!(parse_command(&args(&["tonight"])).is_err());
        assert!(parse_command(&args(&["export", "snap.json", "seven"])).is_err());
        assert!(parse_command(&args(&["tonight", "snap.json", "15/10/2025"])).is_err());
        assert!(parse_command(&args(&["launch", "snap.json"])).is_err());
    }
}
