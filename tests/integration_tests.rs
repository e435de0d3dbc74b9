// Integration tests: classification, resolution and configuration together

use std::fs;
use std::path::Path;
use std::sync::Arc;

use alarm_audio::config::Config;
use alarm_audio::platform::{RandomShuffler, Shuffler};
use alarm_audio::source::{
    classify, MusicDirLibrary, SourceKind, SourceResolver, Track, FALLBACK_URI,
};
use alarm_audio::volume::{scale_volume, target_volume, AudioStream, SoftwareMixer, VolumeControl};

struct ReverseShuffler;

impl Shuffler for ReverseShuffler {
    fn shuffle(&self, tracks: &mut [Track]) {
        tracks.reverse();
    }
}

fn resolver_for(root: Option<&Path>) -> SourceResolver {
    SourceResolver::new(
        Arc::new(MusicDirLibrary::new(root.map(Path::to_path_buf))),
        Arc::new(RandomShuffler),
    )
}

fn names(tracks: &[Track]) -> Vec<String> {
    tracks
        .iter()
        .map(|t| {
            Path::new(&t.uri)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"").unwrap();
}

#[test]
fn test_folder_resolves_recursively_in_path_order() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("b.ogg"));
    touch(&dir.path().join("a.mp3"));
    touch(&dir.path().join("nested/c.flac"));
    touch(&dir.path().join("cover.jpg"));
    touch(&dir.path().join("notes.txt"));

    let reference = classify(&format!("{}/", dir.path().display()));
    assert_eq!(reference.kind(), SourceKind::LocalFolder);

    let resolved = resolver_for(None).resolve(&reference, false).unwrap();
    assert_eq!(resolved.kind, SourceKind::LocalFolder);
    assert_eq!(names(&resolved.tracks), vec!["a.mp3", "b.ogg", "c.flac"]);
    let positions: Vec<usize> = resolved.tracks.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn test_randomized_folder_uses_shuffler() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        touch(&dir.path().join(name));
    }
    let resolver = SourceResolver::new(
        Arc::new(MusicDirLibrary::new(None)),
        Arc::new(ReverseShuffler),
    );

    let reference = classify(&format!("{}/", dir.path().display()));
    let resolved = resolver.resolve(&reference, true).unwrap();
    assert_eq!(names(&resolved.tracks), vec!["c.mp3", "b.mp3", "a.mp3"]);
}

#[test]
fn test_missing_folder_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let reference = classify(&format!("{}/gone/", dir.path().display()));

    assert!(resolver_for(None).resolve(&reference, false).is_err());
}

#[test]
fn test_local_playlist_with_relative_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wake.m3u");
    fs::write(
        &path,
        "#EXTM3U\n#EXTINF:200,Sunrise\nsongs/sunrise.mp3\n#EXTINF:180,Birds\n/abs/birds.ogg\n",
    )
    .unwrap();

    let reference = classify(&path.display().to_string());
    assert_eq!(reference.kind(), SourceKind::LocalM3U);
    assert!(reference.needs_sniffing());

    let resolved = resolver_for(None).resolve(&reference, false).unwrap();
    assert_eq!(resolved.kind, SourceKind::LocalM3U);
    assert_eq!(
        resolved.tracks[0].uri,
        dir.path().join("songs/sunrise.mp3").display().to_string()
    );
    assert_eq!(resolved.tracks[0].title.as_deref(), Some("Sunrise"));
    assert_eq!(resolved.tracks[1].uri, "/abs/birds.ogg");
}

#[test]
fn test_stream_wrapper_becomes_streaming_playlist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radio.m3u8");
    fs::write(
        &path,
        "#EXTM3U\n#EXTINF:-1,[alarm-stream] Morning Radio\nhttp://radio.example/live\n",
    )
    .unwrap();

    let reference = classify(&format!("file://{}", path.display()));
    assert_eq!(reference.kind(), SourceKind::LocalM3U);

    let resolved = resolver_for(None).resolve(&reference, false).unwrap();
    assert_eq!(resolved.kind, SourceKind::StreamingM3U);
    assert!(resolved.kind.is_streaming());
    assert_eq!(resolved.tracks.len(), 1);
    assert!(resolved.tracks[0].is_remote());
    assert_eq!(resolved.tracks[0].title.as_deref(), Some("Morning Radio"));
}

#[test]
fn test_extensionless_stream_wrapper_is_recognised() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jazz_station");
    fs::write(
        &path,
        "#EXTM3U\n#EXTINF:-1,[alarm-stream] Jazz\nhttp://radio.example/jazz",
    )
    .unwrap();

    let reference = classify(&format!("file://{}", path.display()));
    assert_eq!(reference.kind(), SourceKind::DirectUri);
    assert!(reference.needs_sniffing());

    let resolved = resolver_for(None).resolve(&reference, false).unwrap();
    assert_eq!(resolved.kind, SourceKind::StreamingM3U);
    assert_eq!(resolved.tracks.len(), 1);
    assert_eq!(resolved.tracks[0].uri, "http://radio.example/jazz");
    assert_eq!(resolved.tracks[0].title.as_deref(), Some("Jazz"));
}

#[test]
fn test_empty_playlist_resolves_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.m3u");
    fs::write(&path, "#EXTM3U\n").unwrap();

    let resolved = resolver_for(None)
        .resolve(&classify(&path.display().to_string()), false)
        .unwrap();
    assert!(resolved.tracks.is_empty());
}

#[test]
fn test_library_album_sorted_by_title() {
    let root = tempfile::tempdir().unwrap();
    touch(&root.path().join("Artist/Album/Zebra.mp3"));
    touch(&root.path().join("Artist/Album/apple.mp3"));
    touch(&root.path().join("Artist/Album/Mango.mp3"));
    touch(&root.path().join("Artist/Other/skip.mp3"));

    let reference = classify("content://media/audio/albums/Artist/Album");
    assert_eq!(reference.kind(), SourceKind::LocalAlbum);

    let resolved = resolver_for(Some(root.path())).resolve(&reference, false).unwrap();
    assert_eq!(names(&resolved.tracks), vec!["apple.mp3", "Mango.mp3", "Zebra.mp3"]);
}

#[test]
fn test_library_artist_and_playlist() {
    let root = tempfile::tempdir().unwrap();
    touch(&root.path().join("Artist/One/a.mp3"));
    touch(&root.path().join("Artist/Two/b.mp3"));
    fs::create_dir_all(root.path().join("Playlists")).unwrap();
    fs::write(
        root.path().join("Playlists/morning.m3u"),
        "../Artist/Two/b.mp3\n../Artist/One/a.mp3\n",
    )
    .unwrap();
    let resolver = resolver_for(Some(root.path()));

    let artist = resolver
        .resolve(&classify("content://media/audio/artists/Artist"), false)
        .unwrap();
    assert_eq!(artist.tracks.len(), 2);

    let playlist = resolver
        .resolve(&classify("content://media/audio/playlists/morning"), false)
        .unwrap();
    assert_eq!(playlist.kind, SourceKind::LocalPlaylist);
    assert_eq!(names(&playlist.tracks), vec!["a.mp3", "b.mp3"]);
}

#[test]
fn test_library_rejects_escaping_ids() {
    let root = tempfile::tempdir().unwrap();
    let reference = classify("content://media/audio/albums/../secret");

    assert!(resolver_for(Some(root.path())).resolve(&reference, false).is_err());
}

#[test]
fn test_random_samples_library() {
    let root = tempfile::tempdir().unwrap();
    for i in 0..10 {
        touch(&root.path().join(format!("Artist/Album/{i}.mp3")));
    }

    let resolver = resolver_for(Some(root.path())).with_random_sample_size(4);
    let resolved = resolver.resolve(&classify("random"), false).unwrap();
    assert_eq!(resolved.kind, SourceKind::Random);
    assert_eq!(resolved.tracks.len(), 4);
}

#[test]
fn test_random_without_library_fails() {
    assert!(resolver_for(None).resolve(&classify("random"), false).is_err());
}

#[test]
fn test_single_track_references() {
    let resolver = resolver_for(None);

    let direct = resolver.resolve(&classify("file:///sounds/bell.ogg"), false).unwrap();
    assert_eq!(direct.kind, SourceKind::DirectUri);
    assert_eq!(direct.tracks[0].uri, "/sounds/bell.ogg");

    let fallback = resolver.resolve(&classify(""), false).unwrap();
    assert_eq!(fallback.kind, SourceKind::Fallback);
    assert_eq!(fallback.tracks[0].uri, FALLBACK_URI);

    let silent = resolver.resolve(&classify("SILENT"), false).unwrap();
    assert!(silent.tracks.is_empty());
}

#[test]
fn test_delegated_reference() {
    let reference = classify("plugin://music.player/track/42");
    assert!(reference.is_delegated());
    assert_eq!(reference.kind(), SourceKind::DirectUri);
}

#[test]
fn test_config_round_trip_and_volume_targets() {
    let mut config = Config::default();
    config.alarm_max_volume = 10;
    config.initial_alarm_volume = 3;
    config.audio_stream = AudioStream::Music;

    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("audio_stream = \"music\""));
    let loaded: Config = toml::from_str(&text).unwrap();
    assert!(loaded.validate().is_ok());
    assert_eq!(loaded.audio_stream, AudioStream::Music);

    let mixer = SoftwareMixer::from_config(&loaded);
    assert_eq!(mixer.volume(AudioStream::Alarm), 3);
    assert_eq!(mixer.max_volume(AudioStream::Music), 15);

    // Alarm scale 10 onto music scale 15
    assert_eq!(target_volume(10, AudioStream::Music, &mixer), 15);
    assert_eq!(scale_volume(0, 10, 15), 0);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: Config = toml::from_str("vibrate = false\n[connectivity]\nfailure_threshold = 4\n").unwrap();

    assert!(!config.vibrate);
    assert_eq!(config.connectivity.failure_threshold, 4);
    assert_eq!(config.connectivity.probe_interval_secs, 10);
    assert_eq!(config.ramp_step_interval_ms, 5000);
}

#[test]
fn test_invalid_config_rejected() {
    let config: Config = toml::from_str("ramp_step_interval_ms = 0\n").unwrap();
    assert!(config.validate().is_err());
}
