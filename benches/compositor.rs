use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

use reelcast::assets::AssetCache;
use reelcast::config::{CaptionStyle, VideoConfig};
use reelcast::timeline::{Animation, Timeline, TimelineSegment, Transition};
use reelcast::video::{FontBook, FrameCompositor, FrameSize};

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn bench_full_frame(c: &mut Criterion) {
    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build()
            .unwrap(),
    );

    let mut cache = AssetCache::new(Arc::clone(&pool));
    cache.insert_ready("photo", gradient(1920, 1080));

    let timeline = Timeline::new(vec![TimelineSegment {
        start_time: 0.0,
        end_time: 10.0,
        asset_id: "photo".to_string(),
        caption: "A caption long enough to wrap across two lines at this width".to_string(),
        animation: Animation::PanZoom,
        transition: Transition::Fade,
    }])
    .unwrap();

    let compositor = FrameCompositor::new(FrameSize::new(1280, 720), FontBook::load(&Default::default()), pool);
    let config = VideoConfig {
        caption_style: CaptionStyle::Bold,
        ..VideoConfig::default()
    };

    let mut group = c.benchmark_group("render_720p");
    group.bench_function("compose", |b| {
        b.iter(|| compositor.compose(black_box(0.25), &timeline, &config, &cache))
    });
    group.bench_function("compose_and_rasterize", |b| {
        b.iter(|| compositor.render(black_box(3.7), &timeline, &config, &cache))
    });
    group.finish();
}

criterion_group!(benches, bench_full_frame);
criterion_main!(benches);
