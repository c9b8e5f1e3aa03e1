use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use strongpoint_server::announce::NullSink;
use strongpoint_server::clock::ManualClock;
use strongpoint_server::constants::{MAX_POINTS, TICK_MS};
use strongpoint_server::engine::GameEngine;
use strongpoint_server::sensing::{PresenceFrame, SharedPresenceSource};
use strongpoint_server::types::{
    GameConfig, GameEvent, ModeKind, Phase, RoundOutcome, Snapshot, Team,
};

/// Squad stances persist for two seconds of simulated time, long enough that
/// an absent team actually ages out of the proximity window.
const STANCE_WINDOW_TICKS: u64 = 2_000 / TICK_MS;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    minutes: Option<u64>,
    #[arg(long)]
    points: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    mode: ModeKind,
    used: [bool; MAX_POINTS],
    #[serde(rename = "captureMs")]
    capture_ms: u64,
    #[serde(rename = "timeLimitMs")]
    time_limit_ms: u64,
    #[serde(rename = "bonusMs")]
    bonus_ms: u64,
    #[serde(rename = "bluePresence")]
    blue_presence: f64,
    #[serde(rename = "redResistance")]
    red_resistance: f64,
    #[serde(rename = "sensorDropout")]
    sensor_dropout: f64,
    seed: u64,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    mode: ModeKind,
    #[serde(rename = "usedPoints")]
    used_points: usize,
    outcome: Option<RoundOutcome>,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    #[serde(rename = "extensionMs")]
    extension_ms: u64,
    #[serde(rename = "captureStarts")]
    capture_starts: i32,
    captures: i32,
    contests: i32,
    extensions: i32,
    overtime: bool,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    #[serde(rename = "finishedTick")]
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "mode": scenario.mode,
                "timeLimitMs": scenario.time_limit_ms,
                "bluePresence": scenario.blue_presence,
                "redResistance": scenario.red_resistance,
            }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_duration_ms += scenario_run.result.duration_ms;
        *outcome_counts
            .entry(outcome_key(scenario_run.result.outcome))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_tick),
            json!({
                "outcome": scenario_run.result.outcome,
                "durationMs": scenario_run.result.duration_ms,
                "captures": scenario_run.result.captures,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run).expect("scenario result should serialize")
        );
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        run_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results,
        outcome_counts,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let clock = Arc::new(ManualClock::new(0));
    let source = Arc::new(SharedPresenceSource::new());
    let mut engine = GameEngine::new(clock.clone(), source.clone(), Box::new(NullSink));
    let config = GameConfig {
        mode: scenario.mode,
        capture_ms: scenario.capture_ms,
        time_limit_ms: scenario.time_limit_ms,
        start_delay_ms: 0,
        bonus_ms: scenario.bonus_ms,
        presence_decay_ms: 2_000,
        used: scenario.used,
    };
    engine
        .start_round(config)
        .expect("scenario config should be valid");

    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let mut capture_starts = 0;
    let mut captures = 0;
    let mut contests = 0;
    let mut extensions = 0;
    let mut overtime_seen = false;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut tick = 0u64;
    let max_ticks =
        (scenario.time_limit_ms + scenario.bonus_ms * (MAX_POINTS as u64 + 1) + 60_000) / TICK_MS;

    let mut owners = [Team::Nobody; MAX_POINTS];
    let mut blue_on = false;
    let mut red_on = false;
    while engine.phase() != Phase::Ended {
        clock.advance(TICK_MS);
        tick += 1;
        if tick % STANCE_WINDOW_TICKS == 1 {
            blue_on = rng.random_bool(scenario.blue_presence);
            red_on = rng.random_bool(scenario.red_resistance);
        }
        if !rng.random_bool(scenario.sensor_dropout) {
            source.publish(script_frame(&mut rng, scenario, &owners, blue_on, red_on));
        }
        engine.step();
        let snapshot = engine.snapshot(true);

        for (slot, point) in owners.iter_mut().zip(&snapshot.points) {
            *slot = point.owner;
        }
        overtime_seen |= snapshot.overtime;
        for event in &snapshot.events {
            match event {
                GameEvent::CaptureStarted { .. } => capture_starts += 1,
                GameEvent::Captured { .. } => captures += 1,
                GameEvent::Contested { .. } => contests += 1,
                GameEvent::TimeExtended { .. } => extensions += 1,
                _ => {}
            }
        }
        for message in collect_snapshot_anomalies(&snapshot, scenario) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                tick,
                message,
            );
        }

        if tick > max_ticks {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = engine.take_summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            mode: scenario.mode,
            used_points: scenario.used.iter().filter(|&&u| u).count(),
            outcome: summary.as_ref().map(|s| s.outcome),
            duration_ms: summary.as_ref().map(|s| s.duration_ms).unwrap_or(0),
            extension_ms: summary.as_ref().map(|s| s.extension_ms).unwrap_or(0),
            capture_starts,
            captures,
            contests,
            extensions,
            overtime: overtime_seen,
            anomalies,
        },
        anomaly_records,
        finished_tick: tick,
    }
}

/// One tick of scripted team behavior. Squad stances are rolled per window,
/// not per tick, so absences are long enough to outlast the presence decay.
/// Blue pushes its next objective, red holds that same point; headcounts
/// carry per-tick jitter.
fn script_frame(
    rng: &mut StdRng,
    scenario: &Scenario,
    owners: &[Team; MAX_POINTS],
    blue_on: bool,
    red_on: bool,
) -> PresenceFrame {
    let mut frame = PresenceFrame::default();

    if let Some(target) = advance_target(scenario.mode, &scenario.used, owners, Team::Blue) {
        if blue_on {
            frame.points[target].blue = rng.random_range(1..=3);
        }
        if red_on {
            frame.points[target].red = rng.random_range(1..=2);
        }
    }

    if scenario.mode == ModeKind::ThreePoint && red_on {
        if let Some(target) = advance_target(scenario.mode, &scenario.used, owners, Team::Red) {
            frame.points[target].red = frame.points[target].red.max(rng.random_range(1..=2));
        }
    }

    // Rare unclassified sightings; kept well below the rate that would read
    // as sustained presence through the decay window.
    for point in frame.points.iter_mut() {
        if rng.random_bool(0.002) {
            point.unknown = 1;
        }
    }
    frame
}

/// Next point the team would move on: lowest unowned used point for the
/// attack march, center first on the three-point layout.
fn advance_target(
    mode: ModeKind,
    used: &[bool; MAX_POINTS],
    owners: &[Team; MAX_POINTS],
    team: Team,
) -> Option<usize> {
    match mode {
        ModeKind::AttackDefend => (0..MAX_POINTS).find(|&i| used[i] && owners[i] != team),
        ModeKind::ThreePoint => {
            if owners[1] != team {
                return Some(1);
            }
            [0usize, 2].into_iter().find(|&i| owners[i] != team)
        }
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, scenario: &Scenario) -> Vec<String> {
    let mut anomalies = Vec::new();
    for point in &snapshot.points {
        if !point.progress_percent.is_finite()
            || point.progress_percent < 0.0
            || point.progress_percent > 100.0
        {
            anomalies.push(format!(
                "point {} progress out of range: {}",
                point.index, point.progress_percent
            ));
        }
        if !point.used && (point.capturing != Team::Nobody || point.progress_percent > 0.0) {
            anomalies.push(format!("unused point {} is active", point.index));
        }
        if point.owner == Team::Both {
            anomalies.push(format!("point {} owned by both teams", point.index));
        }
        if point.contested != (point.on == Team::Both) {
            anomalies.push(format!("point {} contested flag mismatch", point.index));
        }
    }

    let ceiling_s = scenario.time_limit_ms / 1_000 + snapshot.extension_seconds;
    if snapshot.remaining_seconds > ceiling_s {
        anomalies.push(format!(
            "remaining {}s exceeds limit plus extension {}s",
            snapshot.remaining_seconds, ceiling_s
        ));
    }
    if snapshot.phase == Phase::Ended && snapshot.outcome.is_none() {
        anomalies.push("ended without outcome".to_string());
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli.seed.unwrap_or_else(now_ms);
    let mode = cli
        .mode
        .as_deref()
        .and_then(ModeKind::parse)
        .unwrap_or(ModeKind::AttackDefend);

    if cli.single || cli.mode.is_some() || cli.minutes.is_some() || cli.points.is_some() {
        let minutes = cli.minutes.unwrap_or(2).clamp(1, 30);
        let point_count = match mode {
            ModeKind::AttackDefend => cli.points.unwrap_or(2).clamp(1, MAX_POINTS),
            ModeKind::ThreePoint => MAX_POINTS,
        };
        let mut used = [false; MAX_POINTS];
        for slot in used.iter_mut().take(point_count) {
            *slot = true;
        }
        return vec![Scenario {
            name: format!("custom-{}p", point_count),
            mode,
            used,
            capture_ms: 10_000,
            time_limit_ms: minutes * 60_000,
            bonus_ms: 30_000,
            blue_presence: 0.85,
            red_resistance: 0.35,
            sensor_dropout: 0.1,
            seed,
        }];
    }

    vec![
        Scenario {
            name: "ad-sweep-2p".to_string(),
            mode: ModeKind::AttackDefend,
            used: [true, true, false],
            capture_ms: 8_000,
            time_limit_ms: 120_000,
            bonus_ms: 30_000,
            blue_presence: 0.9,
            red_resistance: 0.2,
            sensor_dropout: 0.05,
            seed,
        },
        Scenario {
            name: "ad-holdout-3p".to_string(),
            mode: ModeKind::AttackDefend,
            used: [true, true, true],
            capture_ms: 12_000,
            time_limit_ms: 90_000,
            bonus_ms: 20_000,
            blue_presence: 0.6,
            red_resistance: 0.8,
            sensor_dropout: 0.1,
            seed: seed.wrapping_add(1),
        },
        Scenario {
            name: "3p-center-fight".to_string(),
            mode: ModeKind::ThreePoint,
            used: [true, true, true],
            capture_ms: 8_000,
            time_limit_ms: 120_000,
            bonus_ms: 15_000,
            blue_presence: 0.75,
            red_resistance: 0.65,
            sensor_dropout: 0.1,
            seed: seed.wrapping_add(2),
        },
    ]
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u64, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_ms = if scenario_count == 0 {
        0
    } else {
        total_duration_ms / scenario_count as u64
    };
    RunSummary {
        run_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        outcome_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    scenario: Option<&str>,
    seed: Option<u64>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn outcome_key(outcome: Option<RoundOutcome>) -> String {
    match outcome {
        Some(RoundOutcome::RedVictory) => "red_victory",
        Some(RoundOutcome::BlueVictory) => "blue_victory",
        Some(RoundOutcome::Stalemate) => "stalemate",
        None => "aborted",
    }
    .to_string()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}
