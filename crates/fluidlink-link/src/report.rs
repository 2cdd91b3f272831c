//! Report line parsing
//!
//! Turns one received line of controller output into snapshot-field
//! updates. Parsing is pure with respect to everything except the passed
//! snapshot: it never fails, never panics, and a malformed or partially
//! recognized line updates only the fields it can positively identify.
//!
//! Connection/health bookkeeping is NOT done here; the returned
//! [`LineClass`] tells the engine which side effects apply.

use fluidlink_core::{
    CoolantMode, CoordinateSystem, DistanceMode, FeedRateMode, MachineSnapshot, MachineState,
    MotionMode, PlaneSelect, Position, ProbeResult, SpindleMode, UnitsMode,
};
use std::time::Instant;

/// Substring the controller sends when `$Report/Interval` took effect.
/// Matched case-insensitively anywhere in a bracketed feedback line.
pub const AUTO_REPORT_ACK: &str = "report interval set";

/// What kind of line was just applied, so the engine can run the
/// corresponding health/connection bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    /// A `<...>` status report; proof the link and reporting both work
    StatusReport,
    /// A `[GC:...]` parser-state report
    ParserState,
    /// A `[PRB:...]` probe result, surfaced to the listener not the snapshot
    Probe(ProbeResult),
    /// Confirmation that the auto-report interval was accepted
    AutoReportAck,
    /// Any other bracketed feedback line, stored as the last message
    Feedback,
    /// A line the protocol layer has no interest in (ok, error:, banners)
    Other,
}

/// Apply one line of controller output to the snapshot.
///
/// `now` stamps the snapshot and drives job elapsed-time bookkeeping;
/// it is injected so time-sensitive behavior is testable.
pub fn apply_line(snapshot: &mut MachineSnapshot, line: &str, now: Instant) -> LineClass {
    let line = line.trim();
    if line.is_empty() {
        return LineClass::Other;
    }

    if line.starts_with('<') {
        apply_status_report(snapshot, line, now);
        return LineClass::StatusReport;
    }

    if line.starts_with("[GC:") {
        apply_parser_state(snapshot, line);
        return LineClass::ParserState;
    }

    if line.starts_with('[') {
        return apply_feedback(snapshot, line);
    }

    LineClass::Other
}

/// Parse a comma-separated coordinate triplet.
fn parse_triplet(value: &str) -> Option<Position> {
    let mut coords = value.split(',').map(|s| s.trim().parse::<f32>());
    let x = coords.next()?.ok()?;
    let y = coords.next()?.ok()?;
    let z = coords.next()?.ok()?;
    Some(Position::new(x, y, z))
}

/// Status report family: `<STATE|KEY:v,v,v|KEY:v,v|...>`.
///
/// Fields are optional and unordered beyond the state being first.
/// Unknown keys are skipped. `MPos`/`WCO` apply before the derived work
/// position is recomputed; an explicit `WPos` then overrides it.
fn apply_status_report(snapshot: &mut MachineSnapshot, line: &str, now: Instant) {
    let body = line
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('|');

    let mut fields = body.split('|');

    if let Some(token) = fields.next() {
        if let Some(state) = MachineState::from_report_token(token.trim()) {
            snapshot.state = state;
        }
    }

    let mut wpos_override: Option<Position> = None;
    let mut sd_seen = false;

    for field in fields {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };

        match key {
            "MPos" => {
                if let Some(p) = parse_triplet(value) {
                    snapshot.set_machine_position(p);
                }
            }
            "WCO" => {
                if let Some(p) = parse_triplet(value) {
                    snapshot.set_work_offset(p);
                }
            }
            "WPos" => {
                wpos_override = parse_triplet(value);
            }
            "FS" => {
                let mut parts = value.split(',');
                if let (Some(f), Some(s)) = (parts.next(), parts.next()) {
                    if let (Ok(f), Ok(s)) = (f.trim().parse(), s.trim().parse()) {
                        snapshot.feed_rate = f;
                        snapshot.spindle_speed = s;
                    }
                }
            }
            "Ov" => {
                let mut parts = value.split(',').map(|s| s.trim().parse::<f32>());
                if let (Some(Ok(f)), Some(Ok(r)), Some(Ok(s))) =
                    (parts.next(), parts.next(), parts.next())
                {
                    snapshot.feed_override = f;
                    snapshot.rapid_override = r;
                    snapshot.spindle_override = s;
                }
            }
            "SD" => {
                if let Some((percent, filename)) = value.split_once(',') {
                    if let Ok(percent) = percent.trim().parse::<f32>() {
                        snapshot.job.update(percent, filename.trim(), now);
                        sd_seen = true;
                    }
                }
            }
            _ => {
                tracing::debug!(key, "ignoring unknown status field");
            }
        }
    }

    // Explicit work position wins over the derived MPos - WCO value.
    if let Some(p) = wpos_override {
        snapshot.set_work_position(p);
    }

    // No SD field in this report means no job is running; absence is the
    // only completion signal the protocol has.
    if !sd_seen {
        snapshot.job.clear();
    }

    snapshot.last_update = Some(now);
}

/// Parser-state family: `[GC:G0 G54 G17 G21 G90 G94 M5 M9 T0 F0 S0]`.
///
/// Each token is tested against the fixed modal vocabularies; unmatched
/// tokens are skipped, unseen groups keep their previous value.
fn apply_parser_state(snapshot: &mut MachineSnapshot, line: &str) {
    let body = line.trim_start_matches("[GC:").trim_end_matches(']');

    for token in body.split_ascii_whitespace() {
        match token {
            "G0" => snapshot.motion_mode = MotionMode::Rapid,
            "G1" => snapshot.motion_mode = MotionMode::Linear,
            "G2" => snapshot.motion_mode = MotionMode::ArcCw,
            "G3" => snapshot.motion_mode = MotionMode::ArcCcw,
            "G80" => snapshot.motion_mode = MotionMode::None,
            "G54" => snapshot.coordinate_system = CoordinateSystem::G54,
            "G55" => snapshot.coordinate_system = CoordinateSystem::G55,
            "G56" => snapshot.coordinate_system = CoordinateSystem::G56,
            "G57" => snapshot.coordinate_system = CoordinateSystem::G57,
            "G58" => snapshot.coordinate_system = CoordinateSystem::G58,
            "G59" => snapshot.coordinate_system = CoordinateSystem::G59,
            "G17" => snapshot.plane = PlaneSelect::Xy,
            "G18" => snapshot.plane = PlaneSelect::Zx,
            "G19" => snapshot.plane = PlaneSelect::Yz,
            "G20" => snapshot.units_mode = UnitsMode::Inch,
            "G21" => snapshot.units_mode = UnitsMode::Mm,
            "G90" => snapshot.distance_mode = DistanceMode::Absolute,
            "G91" => snapshot.distance_mode = DistanceMode::Incremental,
            "G93" => snapshot.feed_rate_mode = FeedRateMode::InverseTime,
            "G94" => snapshot.feed_rate_mode = FeedRateMode::UnitsPerMinute,
            "G95" => snapshot.feed_rate_mode = FeedRateMode::UnitsPerRev,
            "M3" => snapshot.spindle_mode = SpindleMode::Cw,
            "M4" => snapshot.spindle_mode = SpindleMode::Ccw,
            "M5" => snapshot.spindle_mode = SpindleMode::Off,
            "M7" => snapshot.coolant_mode = CoolantMode::Mist,
            "M8" => snapshot.coolant_mode = CoolantMode::Flood,
            "M9" => snapshot.coolant_mode = CoolantMode::Off,
            _ => apply_parser_word(snapshot, token),
        }
    }
}

/// `Tn`, `Fn`, and `Sn` parser-state words.
///
/// Feed and spindle carry the PROGRAMMED values here, while status
/// reports carry the current ones. The zero-guard keeps a stale `$G`
/// poll from overwriting a fresher status-report value.
fn apply_parser_word(snapshot: &mut MachineSnapshot, token: &str) {
    let Some(letter) = token.chars().next() else {
        return;
    };
    let value = &token[letter.len_utf8()..];

    match letter {
        'T' => {
            if let Ok(tool) = value.parse::<u32>() {
                snapshot.tool = tool;
            }
        }
        'F' => {
            if snapshot.feed_rate == 0.0 {
                if let Ok(feed) = value.parse::<f32>() {
                    snapshot.feed_rate = feed;
                }
            }
        }
        'S' => {
            if snapshot.spindle_speed == 0.0 {
                if let Ok(speed) = value.parse::<f32>() {
                    snapshot.spindle_speed = speed;
                }
            }
        }
        _ => {}
    }
}

/// Realtime feedback family: `[PRB:...]`, `[MSG:...]`, and free-form
/// bracketed lines.
fn apply_feedback(snapshot: &mut MachineSnapshot, line: &str) -> LineClass {
    if let Some(body) = line.strip_prefix("[PRB:") {
        if let Some(result) = parse_probe(body.trim_end_matches(']')) {
            return LineClass::Probe(result);
        }
        // Unparseable probe line falls through to the message path.
    }

    if line.to_ascii_lowercase().contains(AUTO_REPORT_ACK) {
        if let Some(body) = line.strip_prefix("[MSG:") {
            snapshot.set_message(body.trim_end_matches(']'));
        }
        return LineClass::AutoReportAck;
    }

    if let Some(body) = line.strip_prefix("[MSG:") {
        snapshot.set_message(body.trim_end_matches(']'));
        return LineClass::Feedback;
    }

    snapshot.set_message(line);
    LineClass::Feedback
}

/// `x,y,z:success` probe payload; success is `0` or `1`.
fn parse_probe(body: &str) -> Option<ProbeResult> {
    let (coords, success) = body.rsplit_once(':')?;
    let p = parse_triplet(coords)?;
    let success = match success.trim() {
        "1" => true,
        "0" => false,
        _ => return None,
    };
    Some(ProbeResult {
        x: p.x,
        y: p.y,
        z: p.z,
        success,
    })
}
