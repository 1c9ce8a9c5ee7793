#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and pose-trace loading for the VBT pipeline.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section is optional; an empty file yields the stock thresholds.
//! - The pose-trace CSV loader enforces headers and groups keypoint rows
//!   into per-frame detections for replay.
use serde::Deserialize;
use vbt_traits::{Detection, Keypoint, PoseFrame};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PresenceCfg {
    /// Stage 1 passes when any keypoint reaches this score.
    pub min_usable_score: f32,
    /// Strict per-keypoint threshold; reported in diagnostics and used for
    /// scale inference, never for the stage 1/2 decision.
    pub min_keypoint_score: f32,
}

impl Default for PresenceCfg {
    fn default() -> Self {
        Self {
            min_usable_score: 0.3,
            min_keypoint_score: 0.6,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StabilityCfg {
    pub required_stable_frames: u32,
    pub decay_rate: u32,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            required_stable_frames: 5,
            decay_rate: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrackingCfg {
    pub confidence_threshold: f32,
    /// Keypoint selected at session start, e.g. "right_wrist".
    pub point: Option<String>,
}

impl Default for TrackingCfg {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            point: None,
        }
    }
}

/// Known real-world length between two keypoints, used to infer the
/// meters-per-unit scale each frame.
#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceSegment {
    pub from: String,
    pub to: String,
    pub meters: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FiltersCfg {
    /// Minimum normalized displacement for stage 4.
    pub movement_threshold: f32,
    /// Minimum velocity (m/s) for stage 5.
    pub velocity_threshold_mps: f32,
    /// Fixed conversion from normalized units to meters.
    pub meters_per_unit: f32,
    pub reference_segment: Option<ReferenceSegment>,
}

impl Default for FiltersCfg {
    fn default() -> Self {
        Self {
            movement_threshold: 0.02,
            velocity_threshold_mps: 0.05,
            meters_per_unit: 1.0,
            reference_segment: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStart {
    /// Accept the request in READY and enter RECORDING once TRACKING is reached.
    #[default]
    AwaitTracking,
    /// Enter RECORDING right away, even before the tracking point resolves.
    Immediate,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoseLossWhileRecording {
    /// Keep the recorded reps and resume once the pose is reacquired.
    #[default]
    Pause,
    /// Discard the in-progress recording.
    Abort,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    /// Consecutive unusable frames before the machine resets to INITIALIZING.
    pub pose_loss_frames: u32,
    pub recording_start: RecordingStart,
    pub pose_loss_while_recording: PoseLossWhileRecording,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            pose_loss_frames: 10,
            recording_start: RecordingStart::AwaitTracking,
            pose_loss_while_recording: PoseLossWhileRecording::Pause,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepDirection {
    /// Concentric phase moves toward the top of the frame (y decreasing).
    #[default]
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RepsCfg {
    pub enabled: bool,
    /// Minimum vertical travel (normalized) for a concentric phase to count.
    pub min_displacement: f32,
    pub direction: RepDirection,
}

impl Default for RepsCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            min_displacement: 0.05,
            direction: RepDirection::Up,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReplayCfg {
    /// Pacing rate for paced replay.
    pub fps: u32,
    /// Abort a paced replay when no frame arrives for this long.
    pub stall_ms: u64,
}

impl Default for ReplayCfg {
    fn default() -> Self {
        Self {
            fps: 30,
            stall_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub presence: PresenceCfg,
    pub stability: StabilityCfg,
    pub tracking: TrackingCfg,
    pub filters: FiltersCfg,
    pub session: SessionCfg,
    pub reps: RepsCfg,
    pub replay: ReplayCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn unit_interval(v: f32) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Presence
        if !unit_interval(self.presence.min_usable_score) {
            eyre::bail!("presence.min_usable_score must be in [0.0, 1.0]");
        }
        if !unit_interval(self.presence.min_keypoint_score) {
            eyre::bail!("presence.min_keypoint_score must be in [0.0, 1.0]");
        }

        // Stability
        if self.stability.required_stable_frames == 0 {
            eyre::bail!("stability.required_stable_frames must be >= 1");
        }
        if self.stability.decay_rate == 0 {
            eyre::bail!("stability.decay_rate must be >= 1");
        }
        if self.stability.decay_rate > self.stability.required_stable_frames {
            eyre::bail!("stability.decay_rate must be <= stability.required_stable_frames");
        }

        // Tracking
        if !unit_interval(self.tracking.confidence_threshold) {
            eyre::bail!("tracking.confidence_threshold must be in [0.0, 1.0]");
        }
        if let Some(p) = &self.tracking.point
            && p.trim().is_empty()
        {
            eyre::bail!("tracking.point must not be empty when set");
        }

        // Filters
        if !unit_interval(self.filters.movement_threshold) {
            eyre::bail!("filters.movement_threshold must be in [0.0, 1.0]");
        }
        if !self.filters.velocity_threshold_mps.is_finite()
            || self.filters.velocity_threshold_mps < 0.0
        {
            eyre::bail!("filters.velocity_threshold_mps must be >= 0.0");
        }
        if !self.filters.meters_per_unit.is_finite() || self.filters.meters_per_unit <= 0.0 {
            eyre::bail!("filters.meters_per_unit must be > 0.0");
        }
        if let Some(seg) = &self.filters.reference_segment {
            if seg.from.trim().is_empty() || seg.to.trim().is_empty() {
                eyre::bail!("filters.reference_segment needs both `from` and `to` keypoints");
            }
            if seg.from == seg.to {
                eyre::bail!("filters.reference_segment endpoints must differ");
            }
            if !seg.meters.is_finite() || seg.meters <= 0.0 {
                eyre::bail!("filters.reference_segment.meters must be > 0.0");
            }
        }

        // Session
        if self.session.pose_loss_frames == 0 {
            eyre::bail!("session.pose_loss_frames must be >= 1");
        }

        // Reps
        if !unit_interval(self.reps.min_displacement) || self.reps.min_displacement == 0.0 {
            eyre::bail!("reps.min_displacement must be in (0.0, 1.0]");
        }

        // Replay
        if self.replay.fps == 0 {
            eyre::bail!("replay.fps must be > 0");
        }
        if self.replay.fps > 1000 {
            eyre::bail!("replay.fps is unreasonably large (>1000)");
        }
        if self.replay.stall_ms == 0 {
            eyre::bail!("replay.stall_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}

/// Pose-trace CSV schema.
///
/// Expected headers:
/// frame,timestamp_ms,keypoint,x,y,score
///
/// One row per keypoint. A row with an empty `keypoint` stands for a frame in
/// which the detector produced no keypoints.
///
/// Example:
/// frame,timestamp_ms,keypoint,x,y,score
/// 1,0,right_wrist,0.50,0.50,0.9
/// 1,0,nose,0.48,0.20,0.8
/// 2,33,,,,
#[derive(Debug, Deserialize, Clone)]
pub struct PoseRow {
    pub frame: u64,
    pub timestamp_ms: u64,
    pub keypoint: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub score: Option<f32>,
}

const POSE_HEADERS: [&str; 6] = ["frame", "timestamp_ms", "keypoint", "x", "y", "score"];

/// Largest run of skipped frame numbers between two rows (about five
/// minutes at 30 fps). Each skipped number becomes a `Detection::Missed`.
pub const MAX_FRAME_GAP: u64 = 9_000;

/// Group keypoint rows into per-frame detections.
///
/// Frame numbers must be non-decreasing; numbers skipped between rows become
/// `Detection::Missed` so replay keeps the original frame cadence.
pub fn detections_from_rows(rows: Vec<PoseRow>) -> eyre::Result<Vec<Detection>> {
    let mut out: Vec<Detection> = Vec::new();
    let mut current: Option<PoseFrame> = None;

    for (idx, row) in rows.into_iter().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = idx + 2;
        if let Some(frame) = current.as_mut()
            && frame.seq == row.frame
        {
            if frame.timestamp_ms != row.timestamp_ms {
                eyre::bail!(
                    "row {line}: frame {} has conflicting timestamps ({} vs {})",
                    row.frame,
                    frame.timestamp_ms,
                    row.timestamp_ms
                );
            }
        } else {
            if let Some(prev) = current.take() {
                if row.frame < prev.seq {
                    eyre::bail!(
                        "row {line}: frame numbers must be non-decreasing ({} after {})",
                        row.frame,
                        prev.seq
                    );
                }
                let gap = row.frame - prev.seq - 1;
                if gap > MAX_FRAME_GAP {
                    eyre::bail!(
                        "row {line}: frame gap of {gap} exceeds {MAX_FRAME_GAP} ({} after {})",
                        row.frame,
                        prev.seq
                    );
                }
                out.push(Detection::Pose(prev));
                out.extend(std::iter::repeat_n(Detection::Missed, gap as usize));
            }
            current = Some(PoseFrame::new(row.frame, row.timestamp_ms, Vec::new()));
        }

        if row.keypoint.trim().is_empty() {
            continue;
        }
        let (Some(x), Some(y), Some(score)) = (row.x, row.y, row.score) else {
            eyre::bail!(
                "row {line}: keypoint {:?} is missing x, y or score",
                row.keypoint
            );
        };
        if !x.is_finite() || !y.is_finite() {
            eyre::bail!("row {line}: keypoint {:?} has non-finite coordinates", row.keypoint);
        }
        if !unit_interval(score) {
            eyre::bail!("row {line}: score must be in [0.0, 1.0], got {score}");
        }
        if let Some(frame) = current.as_mut() {
            frame
                .keypoints
                .push(Keypoint::new(row.keypoint.trim(), x, y, score));
        }
    }

    if let Some(last) = current {
        out.push(Detection::Pose(last));
    }
    Ok(out)
}

/// Read a pose trace from any reader (strict headers).
pub fn read_pose_csv<R: std::io::Read>(reader: R) -> eyre::Result<Vec<Detection>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read pose CSV headers: {e}"))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != POSE_HEADERS {
        eyre::bail!(
            "pose CSV must have headers '{}', got: {}",
            POSE_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<PoseRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    detections_from_rows(rows)
}

pub fn load_pose_csv(path: &std::path::Path) -> eyre::Result<Vec<Detection>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open pose CSV {:?}: {}", path, e))?;
    read_pose_csv(file)
}
