use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stem_mixer::audio::TrackParam;
use stem_mixer::config::{EngineConfig, ExportConfig, ImpulseConfig};
use stem_mixer::error::SourceError;
use stem_mixer::io::encode_wav;
use stem_mixer::state::{any_solo, EffectFamily, EqSettings, Region};
use stem_mixer::{
    AudioSource, CollectingNotifier, Command, MemorySource, MixError, MixSession, SessionEvent, Track, TrackId,
};

const RATE: u32 = 1000;

fn config() -> EngineConfig {
    EngineConfig {
        sample_rate: RATE,
        impulse: ImpulseConfig {
            duration_secs: 0.05,
            seed: Some(11),
            ..Default::default()
        },
        export: ExportConfig {
            sample_rate: RATE,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn constant(value: f32, seconds: f64) -> Vec<u8> {
    let frames = (seconds * RATE as f64) as usize;
    encode_wav(&vec![value; frames * 2], 2, RATE)
}

/// Source whose contents can change after the session took ownership
#[derive(Clone, Default)]
struct SharedSource(Arc<Mutex<MemorySource>>);

impl SharedSource {
    fn insert(&self, url: &str, bytes: Vec<u8>) {
        self.0.lock().insert(url, bytes);
    }
}

impl AudioSource for SharedSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.0.lock().fetch(url)
    }
}

fn id(s: &str) -> TrackId {
    TrackId::from(s)
}

fn open(tracks: Vec<Track>, source: SharedSource) -> (MixSession, CollectingNotifier) {
    let notifier = CollectingNotifier::new();
    let session = MixSession::open(config(), "Night Drive", tracks, Box::new(source), Box::new(notifier.clone()))
        .expect("session opens");
    (session, notifier)
}

fn three_track_session() -> (MixSession, CollectingNotifier) {
    let source = SharedSource::default();
    for url in ["a.wav", "b.wav", "c.wav", "d.wav"] {
        source.insert(url, constant(0.25, 1.0));
    }
    open(
        vec![
            Track::new("a", "A", "a.wav"),
            Track::new("b", "B", "b.wav"),
            Track::new("c", "C", "c.wav"),
        ],
        source,
    )
}

#[test]
fn test_effective_mute_follows_solo() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let tracks: Vec<Track> = (0..5)
            .map(|i| {
                let mut t = Track::new(format!("t{}", i), "", "");
                t.muted = rng.gen_bool(0.4);
                t.solo = rng.gen_bool(0.2);
                t
            })
            .collect();
        let soloed = any_solo(&tracks);
        for t in &tracks {
            let expected = if soloed { !t.solo || t.muted } else { t.muted };
            assert_eq!(t.is_effectively_muted(soloed), expected);
        }
    }
}

#[test]
fn test_solo_scenario_gains() {
    let (mut session, _) = three_track_session();
    session.dispatch(Command::SetVolume(id("a"), 80));
    session.dispatch(Command::SetVolume(id("b"), 60));
    session.dispatch(Command::SetVolume(id("c"), 40));
    session.dispatch(Command::ToggleSolo(id("b")));

    let gains = |s: &MixSession| {
        ["a", "b", "c"].map(|t| s.parameter(&id(t), TrackParam::Gain).unwrap())
    };
    assert_eq!(gains(&session), [0.0, 0.6, 0.0]);

    // Mute flags on the others change nothing
    session.dispatch(Command::ToggleMute(id("a")));
    session.dispatch(Command::ToggleMute(id("c")));
    assert_eq!(gains(&session), [0.0, 0.6, 0.0]);

    // Unsolo: only explicit mutes apply
    session.dispatch(Command::ToggleSolo(id("b")));
    assert_eq!(gains(&session), [0.0, 0.6, 0.0]);
    session.dispatch(Command::ToggleMute(id("a")));
    assert_eq!(gains(&session), [0.8, 0.6, 0.0]);
}

#[test]
fn test_parameters_are_clamped() {
    let (mut session, notifier) = three_track_session();
    session.dispatch(Command::SetVolume(id("a"), -10));
    assert_eq!(session.snapshot().track(&id("a")).unwrap().volume, 0);
    assert_eq!(
        notifier.drain(),
        vec![MixError::InvalidParameter {
            name: "volume",
            value: -10.0,
            clamped: 0.0
        }]
    );
    session.dispatch(Command::SetVolume(id("a"), 150));
    assert_eq!(session.snapshot().track(&id("a")).unwrap().volume, 100);
    session.dispatch(Command::SetPan(id("a"), 200));
    assert_eq!(session.snapshot().track(&id("a")).unwrap().pan, 100);
    assert_eq!(session.parameter(&id("a"), TrackParam::Pan), Some(1.0));
    session.dispatch(Command::SetEq(id("a"), EqSettings { low: 40.0, mid: -40.0, high: 3.0 }));
    assert_eq!(session.parameter(&id("a"), TrackParam::EqLow), Some(12.0));
    assert_eq!(session.parameter(&id("a"), TrackParam::EqMid), Some(-12.0));

    // Volume, pan and both EQ bands were reported once each
    assert_eq!(notifier.len(), 4);
    session.dispatch(Command::SetVolume(id("a"), 50));
    assert_eq!(notifier.len(), 4);
}

#[test]
fn test_undo_redo_round_trip() {
    let (mut session, _) = three_track_session();
    let s0 = session.snapshot().clone();

    assert!(session.dispatch(Command::SetVolume(id("a"), 30)));
    assert!(session.dispatch(Command::SetReverb(id("b"), 50)));
    assert!(session.dispatch(Command::ReorderTracks(0, 2)));
    let s3 = session.snapshot().clone();

    for _ in 0..3 {
        assert!(session.undo());
    }
    assert_eq!(session.snapshot(), &s0);
    assert!(!session.undo());
    assert_eq!(session.parameter(&id("a"), TrackParam::Gain), Some(1.0));

    for _ in 0..3 {
        assert!(session.redo());
    }
    assert_eq!(session.snapshot(), &s3);
    assert!(!session.redo());
    assert_eq!(session.parameter(&id("b"), TrackParam::ReverbWet), Some(0.5));
}

#[test]
fn test_new_edit_discards_redo() {
    let (mut session, _) = three_track_session();
    session.dispatch(Command::SetVolume(id("a"), 10));
    session.dispatch(Command::SetVolume(id("a"), 20));
    session.undo();
    session.dispatch(Command::SetPan(id("a"), -50));
    assert!(!session.can_redo());
    assert!(!session.redo());
    let track = session.snapshot().track(&id("a")).unwrap();
    assert_eq!((track.volume, track.pan), (10, -50));
}

#[test]
fn test_noop_edits_leave_history_alone() {
    let (mut session, _) = three_track_session();
    assert!(!session.dispatch(Command::SetVolume(id("zz"), 10)));
    assert!(!session.dispatch(Command::ReorderTracks(1, 1)));
    assert!(!session.dispatch(Command::SetVolume(id("a"), 100)));
    assert!(!session.can_undo());
}

#[test]
fn test_reorder_is_stable() {
    let (mut session, _) = three_track_session();
    session.dispatch(Command::AddTrack(Track::new("d", "D", "d.wav")));
    session.dispatch(Command::SetPan(id("c"), 25));
    let before = session.snapshot().tracks.clone();

    session.dispatch(Command::ReorderTracks(2, 0));
    let after = &session.snapshot().tracks;
    assert_eq!(after, &vec![before[2].clone(), before[0].clone(), before[1].clone(), before[3].clone()]);
}

#[test]
fn test_bypass_forces_neutral_eq() {
    let (mut session, _) = three_track_session();
    session.dispatch(Command::SetEq(id("a"), EqSettings { low: 10.0, mid: 0.0, high: 0.0 }));
    assert_eq!(session.parameter(&id("a"), TrackParam::EqLow), Some(10.0));

    session.dispatch(Command::ToggleEffectBypass(id("a"), EffectFamily::Eq));
    assert_eq!(session.parameter(&id("a"), TrackParam::EqLow), Some(0.0));
    // The stored value survives the bypass
    assert_eq!(session.snapshot().track(&id("a")).unwrap().effects.eq.low, 10.0);
}

#[test]
fn test_default_region_once_duration_is_known() {
    let source = SharedSource::default();
    source.insert("a.wav", constant(0.1, 2.0));
    let (mut session, notifier) = open(
        vec![Track::new("a", "A", "a.wav"), Track::new("late", "Late", "late.wav")],
        source.clone(),
    );

    let a = session.snapshot().track(&id("a")).unwrap();
    assert_eq!(a.regions, vec![Region::default_for(&id("a"), 2.0)]);
    assert!(session.snapshot().track(&id("late")).unwrap().regions.is_empty());
    assert!(matches!(&notifier.drain()[..], [MixError::SourceDecode { .. }]));
    // Amending regions is not an undo step
    assert!(!session.can_undo());

    source.insert("late.wav", constant(0.1, 1.5));
    assert!(session.retry(&id("late")));
    let late = session.snapshot().track(&id("late")).unwrap();
    assert_eq!(late.regions.len(), 1);
    assert_eq!((late.regions[0].start, late.regions[0].end), (0.0, 1.5));

    // Regions that were already set are kept
    let custom = vec![Region {
        id: "x".into(),
        start: 0.2,
        end: 0.4,
        label: Some("hook".into()),
    }];
    session.dispatch(Command::SetRegions(id("a"), custom.clone()));
    session.dispatch(Command::RemoveTrack(id("a")));
    session.undo();
    assert_eq!(session.snapshot().track(&id("a")).unwrap().regions, custom);
}

#[test]
fn test_loop_window_clamps_seek() {
    let source = SharedSource::default();
    source.insert("long.wav", constant(0.1, 30.0));
    let (mut session, _) = open(vec![Track::new("long", "Long", "long.wav")], source);

    assert_eq!(session.loop_window().end, 30.0);
    session.set_loop(true, 10.0, 20.0);
    assert_eq!(session.seek(&id("long"), 5.0), Some(10.0));
    assert_eq!(session.current_time(&id("long")), Some(10.0));
    assert_eq!(session.seek(&id("long"), 25.0), Some(20.0));

    session.set_loop(false, 10.0, 20.0);
    assert_eq!(session.seek(&id("long"), 25.0), Some(25.0));
    assert_eq!(session.seek(&id("long"), 99.0), Some(30.0));
    assert_eq!(session.seek(&id("missing"), 1.0), None);
}

#[test]
fn test_seek_before_load_is_a_noop() {
    let (mut session, _) = open(vec![Track::new("x", "X", "x.wav")], SharedSource::default());
    assert_eq!(session.seek(&id("x"), 3.0), None);
    session.seek_all(1.0);
}

#[test]
fn test_transport_play_pause_and_loop_rewind() {
    let (mut session, notifier) = three_track_session();
    assert!(!session.is_playing());
    session.play_all();
    assert!(session.is_playing());
    assert!(notifier.is_empty());

    session.set_loop(true, 0.0, 0.1);
    let mut out = vec![0.0; 2 * 200];
    session.render(&mut out);
    assert!(out.iter().any(|s| *s != 0.0));
    session.on_frame();
    let time = session.current_time(&id("a")).unwrap();
    assert!(time < 0.1, "rewound to loop start, got {}", time);

    session.toggle_track(&id("a"));
    assert!(session.is_playing());
    session.toggle_play_all();
    assert!(!session.is_playing());
    session.toggle_play_all();
    assert!(session.is_playing());
    session.pause_all();
    assert!(!session.is_playing());

    let events = session.take_events();
    assert!(events.contains(&SessionEvent::PlayingChanged(id("a"), true)));
    assert!(events.contains(&SessionEvent::PlayingChanged(id("a"), false)));
}

fn element_state(session: &MixSession, track: &str) -> (f64, bool) {
    let element = session.registry().element(&id(track)).unwrap();
    let element = element.lock();
    (element.current_time(), element.is_paused())
}

#[test]
fn test_short_stem_waits_for_the_loop_to_wrap() {
    let source = SharedSource::default();
    source.insert("short.wav", constant(0.1, 0.5));
    source.insert("long.wav", constant(0.1, 1.0));
    let (mut session, _) = open(
        vec![Track::new("short", "Short", "short.wav"), Track::new("long", "Long", "long.wav")],
        source,
    );
    assert_eq!(session.loop_window().end, 1.0);
    session.set_loop(true, 0.0, 1.0);
    session.play_all();

    let mut out = vec![0.0; 2 * 128];
    for _ in 0..6 {
        session.render(&mut out);
        session.on_frame();
    }
    // The short stem stays at its end while the long one keeps going
    assert_eq!(element_state(&session, "short"), (0.5, true));
    assert_eq!(element_state(&session, "long"), (0.768, false));
    assert!(session.transport().is_parked(&id("short")));

    // The long stem runs out at 1.0 and both restart together
    for _ in 0..2 {
        session.render(&mut out);
        session.on_frame();
    }
    assert_eq!(element_state(&session, "short"), (0.0, false));
    assert_eq!(element_state(&session, "long"), (0.0, false));

    session.render(&mut out);
    session.on_frame();
    assert_eq!(element_state(&session, "short").0, element_state(&session, "long").0);
    assert_eq!(session.current_time(&id("short")), Some(0.128));
}

#[test]
fn test_loop_start_past_a_short_stem_keeps_it_parked() {
    let source = SharedSource::default();
    source.insert("short.wav", constant(0.1, 0.25));
    source.insert("long.wav", constant(0.1, 1.0));
    let (mut session, _) = open(
        vec![Track::new("short", "Short", "short.wav"), Track::new("long", "Long", "long.wav")],
        source,
    );
    session.set_loop(true, 0.5, 0.8);
    session.play_all();

    let mut out = vec![0.0; 2 * 128];
    for _ in 0..7 {
        session.render(&mut out);
        session.on_frame();
    }
    // The long stem wrapped back to 0.5; the short one was never restarted from 0
    assert_eq!(element_state(&session, "long"), (0.5, false));
    assert_eq!(element_state(&session, "short"), (0.25, true));
    assert!(session.transport().is_parked(&id("short")));

    session.pause_all();
    assert!(!session.transport().is_parked(&id("short")));
}

#[test]
fn test_failed_track_reports_and_stays_silent() {
    let source = SharedSource::default();
    source.insert("a.wav", constant(0.25, 0.5));
    source.insert("bad.wav", b"RIFF garbage".to_vec());
    let (mut session, notifier) = open(
        vec![Track::new("a", "A", "a.wav"), Track::new("bad", "Bad", "bad.wav")],
        source,
    );
    assert_eq!(notifier.drain().len(), 1);
    assert!(session.registry().contains(&id("bad")));

    session.play_all();
    let reported = notifier.drain();
    assert!(matches!(&reported[..], [MixError::Playback { track, .. }] if track.as_str() == "bad"));
    assert!(session.is_playing());
}

#[test]
fn test_preview_commits_one_step() {
    let (mut session, _) = three_track_session();
    for volume in [90, 70, 50, 30] {
        session.preview(Command::SetVolume(id("a"), volume));
        assert_eq!(session.parameter(&id("a"), TrackParam::Gain), Some(volume as f32 / 100.0));
    }
    assert!(session.commit());
    assert!(session.undo());
    assert!(!session.can_undo());
    assert_eq!(session.parameter(&id("a"), TrackParam::Gain), Some(1.0));

    session.preview(Command::SetVolume(id("b"), 10));
    session.cancel_preview();
    assert_eq!(session.parameter(&id("b"), TrackParam::Gain), Some(1.0));
    assert!(!session.commit());
}

#[test]
fn test_undo_without_history_keeps_preview_live() {
    let (mut session, _) = three_track_session();
    session.preview(Command::SetVolume(id("a"), 10));

    assert!(!session.undo());
    assert!(!session.redo());
    assert_eq!(session.snapshot().track(&id("a")).unwrap().volume, 10);
    assert_eq!(session.parameter(&id("a"), TrackParam::Gain), Some(0.1));

    assert!(session.commit());
    assert!(session.undo());
    assert_eq!(session.snapshot().track(&id("a")).unwrap().volume, 100);
    assert_eq!(session.parameter(&id("a"), TrackParam::Gain), Some(1.0));
}

#[test]
fn test_remove_and_undo_rebuilds_graph() {
    let (mut session, _) = three_track_session();
    let nodes = session.context().graph().node_count();

    session.dispatch(Command::RemoveTrack(id("b")));
    assert!(!session.registry().contains(&id("b")));
    assert_eq!(session.context().graph().node_count(), nodes - 16);

    session.undo();
    assert!(session.registry().contains(&id("b")));
    assert_eq!(session.context().graph().node_count(), nodes);
    assert_eq!(session.parameter(&id("b"), TrackParam::Gain), Some(1.0));
}

#[test]
fn test_metering_and_close() {
    let (mut session, _) = three_track_session();
    assert!(session.start_metering(&id("a")).is_some());
    assert!(session.start_metering(&id("nope")).is_none());
    session.play_all();
    let mut out = vec![0.0; 2 * 256];
    session.render(&mut out);
    session.on_frame();
    assert!(session.level(&id("a")).is_some());
    assert_eq!(session.transport().loops().len(), 2);

    session.dispatch(Command::RemoveTrack(id("a")));
    assert_eq!(session.transport().loops().len(), 1);

    session.close();
    assert!(session.is_closed());
    assert!(session.transport().loops().is_empty());
    assert!(session.registry().is_empty());
    session.render(&mut out);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn test_export_names_file_after_title() {
    let (mut session, _) = three_track_session();
    let mut stages = Vec::new();
    let mix = session.export(&mut |p| stages.push(p.percent())).unwrap();
    assert_eq!(mix.filename, "Night Drive_mixed.wav");
    assert_eq!(stages, vec![0, 50, 75, 100]);
    assert_eq!(&mix.bytes[0..4], b"RIFF");
}
