use crate::error::MixError;
use crate::state::snapshot::{
    COMPRESSOR_RATIO_RANGE, COMPRESSOR_THRESHOLD_RANGE, COMPRESSOR_TIME_RANGE_MS, LIMITER_THRESHOLD_RANGE,
    MASTER_VOLUME_RANGE,
};
use crate::state::track::{DELAY_TIME_RANGE, EQ_RANGE, PAN_RANGE, SEND_RANGE, VOLUME_RANGE};
use crate::state::{
    reducers, CompressorSettings, EffectFamily, EqSettings, MixSnapshot, Region, Track, TrackEffects, TrackId,
};

/// One logical user edit of the mix
///
/// Numeric arguments are raw user input and are clamped when applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Track mix commands
    /// Set track volume (0..100)
    SetVolume(TrackId, i32),
    /// Set track pan (-100 = left, 100 = right)
    SetPan(TrackId, i32),
    ToggleMute(TrackId),
    ToggleSolo(TrackId),

    // Effect commands
    /// Replace every effect setting of a track
    SetEffects(TrackId, TrackEffects),
    /// Set reverb send (0..100)
    SetReverb(TrackId, i32),
    /// Set delay (time ms, feedback %, mix %)
    SetDelay(TrackId, i32, i32, i32),
    /// Set the three EQ band gains in dB
    SetEq(TrackId, EqSettings),
    ToggleEffectBypass(TrackId, EffectFamily),

    // Track list commands
    /// Move the track at the first index to the second
    ReorderTracks(usize, usize),
    AddTrack(Track),
    RemoveTrack(TrackId),
    ResetTrack(TrackId),
    ResetAll,
    SetRegions(TrackId, Vec<Region>),

    // Master bus commands
    SetMasterVolume(i32),
    SetMasterEq(EqSettings),
    ToggleMasterEq,
    SetMasterCompressor(CompressorSettings),
    ToggleMasterCompressor,
    /// Set limiter threshold in dB
    SetLimiterThreshold(f32),
    ToggleLimiter,
}

impl Command {
    /// Compute the snapshot that follows `snapshot` under this edit
    pub fn apply(&self, snapshot: &MixSnapshot) -> MixSnapshot {
        match self {
            Command::SetVolume(id, volume) => reducers::set_volume(snapshot, id, *volume),
            Command::SetPan(id, pan) => reducers::set_pan(snapshot, id, *pan),
            Command::ToggleMute(id) => reducers::toggle_mute(snapshot, id),
            Command::ToggleSolo(id) => reducers::toggle_solo(snapshot, id),
            Command::SetEffects(id, effects) => reducers::set_effects(snapshot, id, *effects),
            Command::SetReverb(id, reverb) => reducers::set_reverb(snapshot, id, *reverb),
            Command::SetDelay(id, time, feedback, mix) => reducers::set_delay(snapshot, id, *time, *feedback, *mix),
            Command::SetEq(id, eq) => reducers::set_eq(snapshot, id, *eq),
            Command::ToggleEffectBypass(id, family) => reducers::toggle_effect_bypass(snapshot, id, *family),
            Command::ReorderTracks(from, to) => reducers::reorder_tracks(snapshot, *from, *to),
            Command::AddTrack(track) => reducers::add_track(snapshot, track.clone()),
            Command::RemoveTrack(id) => reducers::remove_track(snapshot, id),
            Command::ResetTrack(id) => reducers::reset_track(snapshot, id),
            Command::ResetAll => reducers::reset_all(snapshot),
            Command::SetRegions(id, regions) => reducers::set_regions(snapshot, id, regions.clone()),
            Command::SetMasterVolume(volume) => reducers::set_master_volume(snapshot, *volume),
            Command::SetMasterEq(eq) => reducers::set_master_eq(snapshot, *eq),
            Command::ToggleMasterEq => reducers::toggle_master_eq(snapshot),
            Command::SetMasterCompressor(settings) => reducers::set_master_compressor(snapshot, *settings),
            Command::ToggleMasterCompressor => reducers::toggle_master_compressor(snapshot),
            Command::SetLimiterThreshold(db) => reducers::set_limiter_threshold(snapshot, *db),
            Command::ToggleLimiter => reducers::toggle_limiter(snapshot),
        }
    }

    /// Arguments that lie outside their range and will be clamped by
    /// [`apply`](Self::apply)
    pub fn out_of_range(&self) -> Vec<MixError> {
        let mut found = Vec::new();
        match self {
            Command::SetVolume(_, volume) => check_int(&mut found, "volume", *volume, VOLUME_RANGE),
            Command::SetPan(_, pan) => check_int(&mut found, "pan", *pan, PAN_RANGE),
            Command::SetReverb(_, reverb) => check_int(&mut found, "reverb", *reverb, SEND_RANGE),
            Command::SetDelay(_, time, feedback, mix) => {
                check_int(&mut found, "delay.time", *time, DELAY_TIME_RANGE);
                check_int(&mut found, "delay.feedback", *feedback, SEND_RANGE);
                check_int(&mut found, "delay.mix", *mix, SEND_RANGE);
            }
            Command::SetMasterVolume(volume) => check_int(&mut found, "master.volume", *volume, MASTER_VOLUME_RANGE),
            Command::SetEffects(_, effects) => check_effects(&mut found, effects),
            Command::AddTrack(track) => {
                check_int(&mut found, "pan", track.pan as i32, PAN_RANGE);
                check_effects(&mut found, &track.effects);
            }
            Command::SetEq(_, eq) => check_eq(&mut found, TRACK_EQ, eq),
            Command::SetMasterEq(eq) => check_eq(&mut found, MASTER_EQ, eq),
            Command::SetMasterCompressor(c) => {
                check_float(&mut found, "compressor.threshold", c.threshold_db, COMPRESSOR_THRESHOLD_RANGE);
                check_float(&mut found, "compressor.ratio", c.ratio, COMPRESSOR_RATIO_RANGE);
                check_float(&mut found, "compressor.attack", c.attack_ms, COMPRESSOR_TIME_RANGE_MS);
                check_float(&mut found, "compressor.release", c.release_ms, COMPRESSOR_TIME_RANGE_MS);
            }
            Command::SetLimiterThreshold(db) => check_float(&mut found, "limiter.threshold", *db, LIMITER_THRESHOLD_RANGE),
            _ => {}
        }
        found
    }

    /// Whether the edit changes the set of tracks (not just their values)
    pub fn is_structural(&self) -> bool {
        matches!(self, Command::AddTrack(_) | Command::RemoveTrack(_))
    }
}

fn range_f64((min, max): (i32, i32)) -> (f64, f64) {
    (min as f64, max as f64)
}

fn check(found: &mut Vec<MixError>, name: &'static str, value: f64, (min, max): (f64, f64)) {
    let clamped = if value.is_nan() { min.max(0.0).min(max) } else { value.clamp(min, max) };
    if value.is_nan() || clamped != value {
        found.push(MixError::InvalidParameter { name, value, clamped });
    }
}

fn check_int(found: &mut Vec<MixError>, name: &'static str, value: i32, range: (i32, i32)) {
    check(found, name, value as f64, range_f64(range));
}

fn check_float(found: &mut Vec<MixError>, name: &'static str, value: f32, (min, max): (f32, f32)) {
    check(found, name, value as f64, (min as f64, max as f64));
}

const TRACK_EQ: [&str; 3] = ["eq.low", "eq.mid", "eq.high"];
const MASTER_EQ: [&str; 3] = ["master.eq.low", "master.eq.mid", "master.eq.high"];

fn check_eq(found: &mut Vec<MixError>, names: [&'static str; 3], eq: &EqSettings) {
    for (name, value) in names.into_iter().zip([eq.low, eq.mid, eq.high]) {
        check_float(found, name, value, EQ_RANGE);
    }
}

fn check_effects(found: &mut Vec<MixError>, effects: &TrackEffects) {
    let sends = [
        ("reverb", effects.reverb as f64, SEND_RANGE),
        ("delay.time", effects.delay.time as f64, DELAY_TIME_RANGE),
        ("delay.feedback", effects.delay.feedback as f64, SEND_RANGE),
        ("delay.mix", effects.delay.mix as f64, SEND_RANGE),
    ];
    for (name, value, range) in sends {
        check(found, name, value, range_f64(range));
    }
    check_eq(found, TRACK_EQ, &effects.eq);
}

/// Lifecycle events raised by the live session for the host
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A track's duration in seconds became known
    DurationKnown(TrackId, f64),
    /// A track started (true) or stopped (false) playing
    PlayingChanged(TrackId, bool),
    /// A track reached the end of its audio
    Ended(TrackId),
    /// A track's source failed to load
    LoadFailed(TrackId, String),
}
