// Performance benchmarks for alarm-audio
//
// Run with: cargo bench
// View results in: target/criterion/report/index.html

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;

use alarm_audio::engine::recovery::{decide, KindShape, Trigger};
use alarm_audio::source::{classify, playlist, SourceKind};
use alarm_audio::volume::scale_volume;

/// Benchmark classification of typical stored references
fn bench_classify(c: &mut Criterion) {
    let references = [
        ("marker", "silent"),
        ("file", "/home/user/Music/Morning/wake.ogg"),
        ("folder", "/home/user/Music/Morning/"),
        ("playlist", "file:///home/user/Music/radio.m3u8"),
        ("library", "content://media/audio/albums/Artist/Album"),
        ("plugin", "plugin://music.player/track/42"),
    ];

    let mut group = c.benchmark_group("classify");
    for (name, reference) in references {
        group.bench_with_input(BenchmarkId::from_parameter(name), reference, |b, reference| {
            b.iter(|| black_box(classify(black_box(reference))))
        });
    }
    group.finish();
}

/// Benchmark playlist parsing at different sizes
fn bench_playlist_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("playlist_parse");

    for size in [10, 100, 1000] {
        let mut text = String::from("#EXTM3U\n");
        for i in 0..size {
            text.push_str(&format!("#EXTINF:180,Artist - Track {i}\nalbum/track-{i}.mp3\n"));
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| black_box(playlist::parse(text, Some(Path::new("/music/lists")))))
        });
    }

    group.finish();
}

/// Benchmark the recovery decision table
fn bench_recovery_decide(c: &mut Criterion) {
    let shape = KindShape::of(SourceKind::LocalFolder);

    c.bench_function("recovery_decide", |b| {
        b.iter(|| {
            black_box(decide(black_box(shape), Trigger::PlaybackError, false));
            black_box(decide(black_box(shape), Trigger::Completed, true))
        })
    });
}

/// Benchmark volume scale conversion
fn bench_scale_volume(c: &mut Criterion) {
    c.bench_function("scale_volume", |b| {
        b.iter(|| {
            for level in 0..=7 {
                black_box(scale_volume(black_box(level), 7, 15));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_playlist_parse,
    bench_recovery_decide,
    bench_scale_volume,
);

criterion_main!(benches);
