//! Pure snapshot transitions
//!
//! Every function takes the previous snapshot by reference and returns the
//! next one. Out-of-range numbers are clamped, unknown ids leave the
//! snapshot unchanged.

use super::snapshot::{
    CompressorSettings, MixSnapshot, COMPRESSOR_RATIO_RANGE, COMPRESSOR_THRESHOLD_RANGE, COMPRESSOR_TIME_RANGE_MS,
    LIMITER_THRESHOLD_RANGE, MASTER_VOLUME_RANGE,
};
use super::track::{
    DelaySettings, EffectFamily, EqSettings, Region, Track, TrackEffects, TrackId, DELAY_TIME_RANGE, EQ_RANGE,
    PAN_RANGE, SEND_RANGE, VOLUME_RANGE,
};

fn clamp_int(name: &str, value: i32, (min, max): (i32, i32)) -> i32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::debug!("{} = {} clamped to {}", name, value, clamped);
    }
    clamped
}

fn clamp_float(name: &str, value: f32, (min, max): (f32, f32)) -> f32 {
    if value.is_nan() {
        log::debug!("{} is NaN, using {}", name, min.max(0.0).min(max));
        return min.max(0.0).min(max);
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::debug!("{} = {} clamped to {}", name, value, clamped);
    }
    clamped
}

fn update_track(snapshot: &MixSnapshot, id: &TrackId, update: impl FnOnce(&mut Track)) -> MixSnapshot {
    let mut next = snapshot.clone();
    match next.tracks.iter_mut().find(|t| &t.id == id) {
        Some(track) => update(track),
        None => log::debug!("no track '{}' in snapshot, ignoring edit", id),
    }
    next
}

fn clamp_delay(delay: DelaySettings) -> DelaySettings {
    DelaySettings {
        time: clamp_int("delay.time", delay.time as i32, DELAY_TIME_RANGE) as u16,
        feedback: clamp_int("delay.feedback", delay.feedback as i32, SEND_RANGE) as u8,
        mix: clamp_int("delay.mix", delay.mix as i32, SEND_RANGE) as u8,
    }
}

fn clamp_eq(eq: EqSettings) -> EqSettings {
    EqSettings {
        low: clamp_float("eq.low", eq.low, EQ_RANGE),
        mid: clamp_float("eq.mid", eq.mid, EQ_RANGE),
        high: clamp_float("eq.high", eq.high, EQ_RANGE),
    }
}

fn clamp_effects(effects: TrackEffects) -> TrackEffects {
    TrackEffects {
        reverb: clamp_int("reverb", effects.reverb as i32, SEND_RANGE) as u8,
        delay: clamp_delay(effects.delay),
        eq: clamp_eq(effects.eq),
    }
}

pub fn set_volume(snapshot: &MixSnapshot, id: &TrackId, volume: i32) -> MixSnapshot {
    let volume = clamp_int("volume", volume, VOLUME_RANGE) as u8;
    update_track(snapshot, id, |t| t.volume = volume)
}

pub fn set_pan(snapshot: &MixSnapshot, id: &TrackId, pan: i32) -> MixSnapshot {
    let pan = clamp_int("pan", pan, PAN_RANGE) as i8;
    update_track(snapshot, id, |t| t.pan = pan)
}

pub fn toggle_mute(snapshot: &MixSnapshot, id: &TrackId) -> MixSnapshot {
    update_track(snapshot, id, |t| t.muted = !t.muted)
}

pub fn toggle_solo(snapshot: &MixSnapshot, id: &TrackId) -> MixSnapshot {
    update_track(snapshot, id, |t| t.solo = !t.solo)
}

pub fn set_effects(snapshot: &MixSnapshot, id: &TrackId, effects: TrackEffects) -> MixSnapshot {
    let effects = clamp_effects(effects);
    update_track(snapshot, id, |t| t.effects = effects)
}

pub fn set_reverb(snapshot: &MixSnapshot, id: &TrackId, reverb: i32) -> MixSnapshot {
    let reverb = clamp_int("reverb", reverb, SEND_RANGE) as u8;
    update_track(snapshot, id, |t| t.effects.reverb = reverb)
}

pub fn set_delay(snapshot: &MixSnapshot, id: &TrackId, time: i32, feedback: i32, mix: i32) -> MixSnapshot {
    let delay = DelaySettings {
        time: clamp_int("delay.time", time, DELAY_TIME_RANGE) as u16,
        feedback: clamp_int("delay.feedback", feedback, SEND_RANGE) as u8,
        mix: clamp_int("delay.mix", mix, SEND_RANGE) as u8,
    };
    update_track(snapshot, id, |t| t.effects.delay = delay)
}

pub fn set_eq(snapshot: &MixSnapshot, id: &TrackId, eq: EqSettings) -> MixSnapshot {
    let eq = clamp_eq(eq);
    update_track(snapshot, id, |t| t.effects.eq = eq)
}

pub fn toggle_effect_bypass(snapshot: &MixSnapshot, id: &TrackId, family: EffectFamily) -> MixSnapshot {
    update_track(snapshot, id, |t| t.effects_bypassed.toggle(family))
}

/// Move the track at `from` to `to`, shifting the ones in between
pub fn reorder_tracks(snapshot: &MixSnapshot, from: usize, to: usize) -> MixSnapshot {
    let mut next = snapshot.clone();
    let len = next.tracks.len();
    if from >= len || to >= len {
        log::debug!("reorder {} -> {} out of range for {} tracks", from, to, len);
        return next;
    }
    let track = next.tracks.remove(from);
    next.tracks.insert(to, track);
    next
}

/// Append a track. Ids must be unique; a duplicate is ignored.
pub fn add_track(snapshot: &MixSnapshot, track: Track) -> MixSnapshot {
    let mut next = snapshot.clone();
    if next.track(&track.id).is_some() {
        log::warn!("track '{}' already exists, not adding", track.id);
        return next;
    }
    let mut track = track;
    track.volume = track.volume.min(VOLUME_RANGE.1 as u8);
    track.pan = clamp_int("pan", track.pan as i32, PAN_RANGE) as i8;
    track.effects = clamp_effects(track.effects);
    track.regions = track.regions.into_iter().map(Region::normalized).collect();
    next.tracks.push(track);
    next
}

pub fn remove_track(snapshot: &MixSnapshot, id: &TrackId) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.tracks.retain(|t| &t.id != id);
    next
}

pub fn reset_track(snapshot: &MixSnapshot, id: &TrackId) -> MixSnapshot {
    update_track(snapshot, id, Track::reset)
}

/// Reset every track and the master volume
pub fn reset_all(snapshot: &MixSnapshot) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.tracks.iter_mut().for_each(Track::reset);
    next.master.volume = 100;
    next
}

pub fn set_regions(snapshot: &MixSnapshot, id: &TrackId, regions: Vec<Region>) -> MixSnapshot {
    let regions: Vec<Region> = regions.into_iter().map(Region::normalized).collect();
    update_track(snapshot, id, |t| t.regions = regions)
}

/// Give a track its whole-length default region if it has none yet
pub fn ensure_default_region(snapshot: &MixSnapshot, id: &TrackId, duration: f64) -> MixSnapshot {
    update_track(snapshot, id, |t| {
        if t.regions.is_empty() {
            t.regions.push(Region::default_for(&t.id, duration));
        }
    })
}

pub fn set_master_volume(snapshot: &MixSnapshot, volume: i32) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.volume = clamp_int("master.volume", volume, MASTER_VOLUME_RANGE) as u8;
    next
}

pub fn set_master_eq(snapshot: &MixSnapshot, eq: EqSettings) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.eq = clamp_eq(eq);
    next
}

pub fn toggle_master_eq(snapshot: &MixSnapshot) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.eq_enabled = !next.master.eq_enabled;
    next
}

pub fn set_master_compressor(snapshot: &MixSnapshot, compressor: CompressorSettings) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.compressor = CompressorSettings {
        threshold_db: clamp_float("compressor.threshold", compressor.threshold_db, COMPRESSOR_THRESHOLD_RANGE),
        ratio: clamp_float("compressor.ratio", compressor.ratio, COMPRESSOR_RATIO_RANGE),
        attack_ms: clamp_float("compressor.attack", compressor.attack_ms, COMPRESSOR_TIME_RANGE_MS),
        release_ms: clamp_float("compressor.release", compressor.release_ms, COMPRESSOR_TIME_RANGE_MS),
    };
    next
}

pub fn toggle_master_compressor(snapshot: &MixSnapshot) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.compressor_enabled = !next.master.compressor_enabled;
    next
}

pub fn set_limiter_threshold(snapshot: &MixSnapshot, threshold_db: f32) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.limiter.threshold_db = clamp_float("limiter.threshold", threshold_db, LIMITER_THRESHOLD_RANGE);
    next
}

pub fn toggle_limiter(snapshot: &MixSnapshot) -> MixSnapshot {
    let mut next = snapshot.clone();
    next.master.limiter.enabled = !next.master.limiter.enabled;
    next
}
