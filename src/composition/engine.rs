use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::ThreadPool;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    assets::{AssetCache, AssetId, AssetKind, AssetLibrary},
    audio::{AudioData, AudioGraph, AudioLoader, MonitorOutput},
    capture::{CaptureArtifact, CaptureContext, CapturePipeline, CaptureState, FfmpegRecorder, Recorder},
    config::{CapturePacing, Config, VideoConfig},
    error::{CaptureError, CompositorError, PlaybackError, PreconditionError, Result},
    playback::{AnimationScheduler, DriveMode, MediaTransport, Pacing, PlaybackClock},
    timeline::{adopt, GeneratedSegment, GenerationRequest, ProjectSnapshot, Timeline, TimelineGenerator, SNAPSHOT_FILE_NAME},
    video::{FontBook, Frame, FrameCompositor, FrameSize},
};

/// How long `export` waits for image decodes before capturing
const ASSET_DECODE_TIMEOUT: Duration = Duration::from_secs(30);

/// What one serviced display refresh produced
#[derive(Debug)]
pub struct RefreshOutcome {
    pub time: f64,
    pub frame: Frame,
    /// Whether the scheduler asked for another refresh
    pub continuing: bool,
    pub render_time: Duration,
    /// Set on the refresh that finished a capture
    pub artifact: Option<CaptureArtifact>,
}

/// Owns one editing session: assets, timeline, playback and capture
///
/// Everything runs on the caller's control flow. Pixel work and image
/// decoding fan out to a shared rayon pool, but every state change happens
/// inside these methods.
pub struct CompositionEngine {
    config: Config,
    library: AssetLibrary,
    cache: AssetCache,
    timeline: Timeline,
    compositor: FrameCompositor,
    transport: Option<MediaTransport>,
    clock: PlaybackClock,
    scheduler: AnimationScheduler,
    graph: Option<AudioGraph>,
    monitor: Option<Box<dyn MonitorOutput>>,
    audio_cursor: f64,
    capture: CapturePipeline,
}

impl CompositionEngine {
    /// Create an engine recording through FFmpeg, with fonts from the config
    pub fn new(config: Config) -> Result<Self> {
        let recorder = FfmpegRecorder::new(config.capture.clone());
        let fonts = FontBook::load(&config.caption);
        Self::with_parts(config, Box::new(recorder), fonts)
    }

    /// Create an engine with a specific recorder and font book
    pub fn with_parts(config: Config, recorder: Box<dyn Recorder>, fonts: FontBook) -> Result<Self> {
        config.validate()?;

        let pool: Arc<ThreadPool> = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.render.threads)
                .thread_name(|i| format!("reelcast-worker-{}", i))
                .build()
                .map_err(|e| CompositorError::generic(format!("Failed to build worker pool: {}", e)))?,
        );

        let size = FrameSize::from(config.frame_size());
        let fps = config.render.fps;
        info!("🎞️  Compositor ready: {}x{} @ {} fps, {} workers",
              size.width, size.height, fps, config.render.threads);

        Ok(Self {
            capture: CapturePipeline::new(recorder, config.capture.file_name.clone(), fps),
            cache: AssetCache::new(Arc::clone(&pool)),
            compositor: FrameCompositor::new(size, fonts, pool),
            library: AssetLibrary::new(),
            timeline: Timeline::empty(),
            transport: None,
            clock: PlaybackClock::new(),
            scheduler: AnimationScheduler::new(),
            graph: None,
            monitor: None,
            audio_cursor: 0.0,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn frame_size(&self) -> FrameSize {
        self.compositor.size()
    }

    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn transport(&self) -> Option<&MediaTransport> {
        self.transport.as_ref()
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.mode() == Some(DriveMode::Playback)
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn capture_error(&self) -> Option<&str> {
        self.capture.last_error()
    }

    /// Percentage of the track captured so far
    pub fn capture_progress(&self) -> f64 {
        self.transport.as_ref().map_or(0.0, |transport| self.capture.progress(transport))
    }

    /// Change aspect ratio, style or caption style
    pub fn set_video_config(&mut self, video: VideoConfig) -> Result<()> {
        if self.capture.is_active() {
            return Err(PreconditionError::CaptureInProgress.into());
        }
        self.config.video = video;
        self.compositor.resize(FrameSize::from(self.config.frame_size()));
        debug!("Video config now {:?}", video);
        Ok(())
    }

    /// Where playback audio should be heard. Takes effect for the next transport
    /// if routing is already connected.
    pub fn set_monitor(&mut self, monitor: Box<dyn MonitorOutput>) {
        self.monitor = Some(monitor);
    }

    // ==========================================
    // AUDIO & TRANSPORT
    // ==========================================

    /// Decode a voiceover file and make it the transport
    pub async fn load_audio<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        info!("🎵 Loading audio from {:?}", path.as_ref());
        let track = AudioLoader::load(path).await?;
        self.attach_transport(track)
    }

    /// Replace the transport with a decoded track
    pub fn attach_transport(&mut self, track: AudioData) -> Result<()> {
        if self.capture.is_active() {
            return Err(PreconditionError::CaptureInProgress.into());
        }
        if self.scheduler.mode() == Some(DriveMode::Playback) {
            self.pause();
        }

        // A new transport gets its own routing graph
        if let Some(graph) = self.graph.take() {
            if let Some(monitor) = graph.into_monitor() {
                self.monitor.get_or_insert(monitor);
            }
        }

        info!("   Transport: {:.1}s, {} Hz, {} channels", track.duration, track.sample_rate, track.channels);
        self.transport = Some(MediaTransport::new(Arc::new(track), Pacing::Realtime));
        self.clock = PlaybackClock::new();
        self.audio_cursor = 0.0;
        Ok(())
    }

    // ==========================================
    // ASSETS
    // ==========================================

    /// Add an image and start decoding it
    pub fn add_image<S: Into<String>>(&mut self, name: S, bytes: Vec<u8>) -> AssetId {
        let id = self.library.add(AssetKind::Image, name, bytes);
        self.cache.get_or_load(&self.library, &id);
        id
    }

    pub fn add_image_file<P: AsRef<Path>>(&mut self, path: P) -> Result<AssetId> {
        let id = self.library.add_file(AssetKind::Image, path)?;
        self.cache.get_or_load(&self.library, &id);
        Ok(id)
    }

    /// Remove an asset and its cached raster. Segments that use it render blank.
    pub fn remove_asset(&mut self, id: &str) -> bool {
        self.cache.evict(id);
        self.library.remove(id).is_some()
    }

    /// Wait for pending image decodes
    pub fn await_assets(&mut self, timeout: Duration) -> bool {
        let settled = self.cache.wait_idle(timeout);
        if !settled {
            warn!("{} assets still decoding after {:?}", self.cache.pending_count(), timeout);
        }
        settled
    }

    fn prefetch_images(&mut self) {
        for id in self.library.image_ids() {
            self.cache.get_or_load(&self.library, &id);
        }
    }

    // ==========================================
    // TIMELINE
    // ==========================================

    /// Ask a generator for a new timeline. On failure the current one stays.
    pub fn generate_timeline(&mut self, generator: &dyn TimelineGenerator) -> Result<&Timeline> {
        let Some(transport) = self.transport.as_ref() else {
            return Err(PreconditionError::MissingAudio.into());
        };
        if self.library.images().next().is_none() {
            return Err(PreconditionError::MissingImages.into());
        }

        info!("⏱️  Generating timeline with {}...", generator.name());
        let request = GenerationRequest {
            audio: transport.track(),
            images: self.library.images().collect(),
            config: &self.config.video,
        };

        let records = generator.generate(&request).map_err(|e| {
            warn!("Timeline generation failed, keeping the current timeline: {}", e);
            e
        })?;
        self.adopt_generated(&records)
    }

    /// Replace the timeline with generator records
    pub fn adopt_generated(&mut self, records: &[GeneratedSegment]) -> Result<&Timeline> {
        let image_ids = self.library.image_ids();
        if image_ids.is_empty() {
            return Err(PreconditionError::MissingImages.into());
        }

        self.timeline = adopt(records, &image_ids)?;
        for id in self.timeline.referenced_assets() {
            self.cache.get_or_load(&self.library, id);
        }
        Ok(&self.timeline)
    }

    // ==========================================
    // RENDERING & PLAYBACK
    // ==========================================

    /// Render the frame at `t` against the current state
    pub fn render_at(&mut self, t: f64) -> Frame {
        self.cache.pump();
        if let Some(segment) = self.timeline.active_segment(t) {
            self.cache.get_or_load(&self.library, &segment.asset_id);
        }
        self.compositor.render(t, &self.timeline, &self.config.video, &self.cache)
    }

    /// Scrub to a time and render it right away, even while paused
    pub fn seek(&mut self, seconds: f64) -> Result<Frame> {
        if self.capture.is_active() {
            return Err(PreconditionError::CaptureInProgress.into());
        }
        let transport = self.transport.as_mut().ok_or(PlaybackError::NoTransport)?;

        let t = self.clock.seek(transport, seconds);
        self.audio_cursor = t;
        debug!("Seek to {:.3}s", t);
        Ok(self.render_at(t))
    }

    /// Start interactive playback from the current position
    pub fn play(&mut self) -> Result<()> {
        if self.capture.is_active() {
            return Err(PreconditionError::CaptureInProgress.into());
        }
        let transport = self.transport.as_mut().ok_or(PlaybackError::NoTransport)?;

        let graph = AudioGraph::connect(&mut self.graph, transport, &mut self.monitor)?;
        if let Some(monitor) = graph.monitor_mut() {
            monitor.resume();
        }

        transport.set_pacing(Pacing::Realtime);
        transport.play()?;
        self.audio_cursor = transport.position();
        self.scheduler.activate(DriveMode::Playback)?;
        info!("▶️  Playing from {:.2}s", self.audio_cursor);
        Ok(())
    }

    /// Stop interactive playback. Has no effect on a capture.
    pub fn pause(&mut self) {
        if self.scheduler.mode() != Some(DriveMode::Playback) {
            return;
        }
        self.scheduler.deactivate();
        if let Some(transport) = self.transport.as_mut() {
            transport.pause();
            self.clock.sync(transport);
        }
        if let Some(monitor) = self.graph.as_mut().and_then(|graph| graph.monitor_mut()) {
            monitor.pause();
        }
        info!("⏸️  Paused at {:.2}s", self.clock.current_time());
    }

    fn capture_parts(&mut self) -> Option<(&mut CapturePipeline, CaptureContext<'_>)> {
        let transport = self.transport.as_mut()?;
        Some((
            &mut self.capture,
            CaptureContext {
                transport,
                clock: &mut self.clock,
                scheduler: &mut self.scheduler,
                graph: &mut self.graph,
                monitor: &mut self.monitor,
            },
        ))
    }

    fn route_audio_to(&mut self, time: f64) {
        if let Some(graph) = self.graph.as_mut() {
            graph.route(self.audio_cursor, time);
        }
        self.audio_cursor = time;
    }

    /// Service one display refresh
    ///
    /// Renders the scheduled time, routes the audio up to it and feeds a
    /// running capture. Returns `None` when nothing was scheduled.
    pub fn on_refresh(&mut self) -> Result<Option<RefreshOutcome>> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(None);
        };
        let Some(tick) = self.scheduler.on_refresh(&mut self.clock, transport) else {
            return Ok(None);
        };

        let started = Instant::now();
        let frame = self.render_at(tick.time);
        let render_time = started.elapsed();

        let budget = self.config.render.frame_budget();
        if self.config.render.warn_on_budget_overrun && render_time.as_secs_f64() > budget {
            warn!("Frame at {:.3}s took {:.1}ms (budget {:.1}ms)",
                  tick.time, render_time.as_secs_f64() * 1000.0, budget * 1000.0);
        }

        self.route_audio_to(tick.time);
        if self.capture.is_recording() {
            if let Some((capture, mut ctx)) = self.capture_parts() {
                capture.record_frame(&mut ctx, &frame)?;
            }
        }

        let ended = self.transport.as_ref().map_or(false, |t| t.is_ended());
        if ended {
            let duration = self.transport.as_ref().map_or(tick.time, |t| t.duration());
            self.route_audio_to(duration);
        }

        let artifact = match self.capture_parts() {
            Some((capture, mut ctx)) => capture.poll(&mut ctx)?,
            None => None,
        };

        Ok(Some(RefreshOutcome {
            time: tick.time,
            frame,
            continuing: tick.continuing,
            render_time,
            artifact,
        }))
    }

    // ==========================================
    // SNAPSHOTS
    // ==========================================

    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot::capture(&self.config.video, &self.timeline, &self.library)
    }

    /// Write `project_data.json` into `dir`
    pub fn save_snapshot<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(SNAPSHOT_FILE_NAME);
        self.snapshot().save(&path)?;
        Ok(path)
    }

    /// Restore config and timeline from a snapshot. Images are not part of a
    /// snapshot; the ids still missing from the library are returned.
    pub fn restore_snapshot(&mut self, snapshot: ProjectSnapshot) -> Result<Vec<AssetId>> {
        self.set_video_config(snapshot.config)?;
        let missing: Vec<AssetId> = snapshot.missing_assets(&self.library).into_iter().cloned().collect();
        if !missing.is_empty() {
            warn!("{} snapshot images are not loaded; their segments will render blank", missing.len());
        }

        self.timeline = snapshot.timeline;
        info!("Restored timeline with {} segments", self.timeline.len());
        Ok(missing)
    }

    // ==========================================
    // CAPTURE
    // ==========================================

    /// Arm a capture: rewind, connect routing and bind the recorder
    pub fn arm_capture(&mut self) -> Result<()> {
        if self.capture.is_active() {
            return Err(PreconditionError::CaptureInProgress.into());
        }
        if self.transport.is_none() {
            return Err(PreconditionError::MissingAudio.into());
        }

        self.prefetch_images();
        let assets_ready = self.cache.any_ready(&self.library.image_ids());
        let size = self.compositor.size();
        let pacing = match self.config.capture.pacing {
            CapturePacing::Offline => Pacing::Stepped { step: self.config.render.frame_budget() },
            CapturePacing::Realtime => Pacing::Realtime,
        };

        let (capture, mut ctx) = self.capture_parts().ok_or(PreconditionError::MissingAudio)?;
        capture.arm(&mut ctx, size, assets_ready)?;
        ctx.transport.set_pacing(pacing);
        self.audio_cursor = 0.0;
        Ok(())
    }

    pub fn start_capture(&mut self) -> Result<()> {
        let (capture, mut ctx) = self.capture_parts().ok_or(PreconditionError::MissingAudio)?;
        capture.start(&mut ctx)
    }

    /// Abandon a running capture. Returns false if none was active.
    pub fn cancel_capture(&mut self) -> bool {
        match self.capture_parts() {
            Some((capture, mut ctx)) => capture.cancel(&mut ctx),
            None => false,
        }
    }

    /// Capture the whole track, driving refreshes until the transport ends
    pub async fn run_capture(&mut self) -> Result<CaptureArtifact> {
        self.arm_capture()?;
        self.start_capture()?;

        let fps = u64::from(self.config.render.fps);
        let realtime = self.config.capture.pacing == CapturePacing::Realtime;
        let mut interval = tokio::time::interval(Duration::from_secs_f64(self.config.render.frame_budget()));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("🎥 Capturing {:.1}s ({} pacing)", self.transport.as_ref().map_or(0.0, |t| t.duration()),
              if realtime { "realtime" } else { "offline" });

        let mut frames = 0u64;
        loop {
            if realtime {
                interval.tick().await;
            } else {
                tokio::task::yield_now().await;
            }

            match self.on_refresh()? {
                Some(outcome) => {
                    if let Some(artifact) = outcome.artifact {
                        return Ok(artifact);
                    }
                    frames += 1;
                    if frames % fps == 0 {
                        info!("   Recording {:.0}%", self.capture_progress());
                    }
                }
                None if !self.capture.is_active() => {
                    return Err(CaptureError::Cancelled.into());
                }
                None if !self.scheduler.is_active() => {
                    self.cancel_capture();
                    return Err(CaptureError::InvalidState {
                        expected: "scheduled frames".to_string(),
                        found: "idle scheduler".to_string(),
                    }.into());
                }
                None => {}
            }
        }
    }

    /// Full pipeline: load, generate, capture and save
    pub async fn export<A: AsRef<Path>, O: AsRef<Path>>(
        &mut self,
        audio_path: A,
        image_paths: &[PathBuf],
        generator: &dyn TimelineGenerator,
        output_dir: O,
    ) -> Result<PathBuf> {
        info!("🎬 Starting reelcast export");

        // Step 1: transport
        self.load_audio(audio_path).await?;

        // Step 2: images
        info!("🖼️  Adding {} images", image_paths.len());
        for path in image_paths {
            self.add_image_file(path)?;
        }
        self.await_assets(ASSET_DECODE_TIMEOUT);

        // Step 3: timeline
        self.generate_timeline(generator)?;

        // Step 4: capture
        let artifact = self.run_capture().await?;

        // Step 5: output
        let path = artifact.save_to(output_dir)?;
        info!("🎉 Export complete! Output saved to: {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::recorder::testing::MemoryRecorder;
    use crate::config::{AspectRatio, CaptionStyle};
    use crate::timeline::{Animation, Transition};
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        RgbaImage::from_pixel(8, 8, Rgba(color))
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.render.short_side = 64;
        config.render.threads = 2;
        config.render.fps = 10;
        config.render.warn_on_budget_overrun = false;
        config
    }

    fn engine() -> CompositionEngine {
        let (recorder, _log) = MemoryRecorder::new();
        CompositionEngine::with_parts(config(), Box::new(recorder), FontBook::fallback()).unwrap()
    }

    fn track(seconds: usize) -> AudioData {
        AudioData::from_samples(vec![0.25; seconds * 100], 100, 1)
    }

    fn record(start: f64, end: f64, index: i64) -> GeneratedSegment {
        GeneratedSegment {
            start_time: start,
            end_time: end,
            image_index: index,
            caption: "Hello".to_string(),
            animation: Animation::ZoomIn,
            transition: Transition::Cut,
        }
    }

    struct FailingGenerator;

    impl TimelineGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        fn generate(&self, _request: &GenerationRequest<'_>) -> Result<Vec<GeneratedSegment>> {
            Err(crate::error::TimelineError::GenerationFailed { reason: "offline".to_string() }.into())
        }
    }

    #[test]
    fn test_generation_requires_audio_and_images() {
        let mut engine = engine();
        let result = engine.generate_timeline(&FailingGenerator);
        assert!(matches!(result, Err(CompositorError::Precondition(PreconditionError::MissingAudio))));

        engine.attach_transport(track(1)).unwrap();
        let result = engine.generate_timeline(&FailingGenerator);
        assert!(matches!(result, Err(CompositorError::Precondition(PreconditionError::MissingImages))));
    }

    #[test]
    fn test_failed_generation_keeps_previous_timeline() {
        let mut engine = engine();
        engine.attach_transport(track(2)).unwrap();
        engine.add_image("a.png", png([255, 0, 0, 255]));
        engine.adopt_generated(&[record(0.0, 2.0, 0)]).unwrap();

        assert!(engine.generate_timeline(&FailingGenerator).is_err());
        assert_eq!(engine.timeline().len(), 1);

        // A bad batch is rejected as a whole
        assert!(engine.adopt_generated(&[record(0.0, 1.0, 0), record(3.0, 3.0, 0)]).is_err());
        assert_eq!(engine.timeline().segments()[0].end_time, 2.0);
    }

    #[test]
    fn test_seek_renders_immediately() {
        let mut engine = engine();
        assert!(matches!(engine.seek(1.0), Err(CompositorError::Playback(PlaybackError::NoTransport))));

        engine.attach_transport(track(4)).unwrap();
        engine.add_image("a.png", png([0, 255, 0, 255]));
        engine.adopt_generated(&[record(1.0, 3.0, 0)]).unwrap();
        assert!(engine.await_assets(Duration::from_secs(5)));

        let frame = engine.seek(2.0).unwrap();
        assert_eq!(engine.current_time(), 2.0);
        assert_eq!(frame.get_pixel(0, 0), [0, 255, 0]);
        assert!(engine.seek(0.5).unwrap().is_uniform([0, 0, 0]));
        assert_eq!(engine.seek(99.0).unwrap().size(), engine.frame_size());
        assert_eq!(engine.current_time(), 4.0);
    }

    #[test]
    fn test_removed_asset_renders_blank() {
        let mut engine = engine();
        engine.attach_transport(track(2)).unwrap();
        let id = engine.add_image("a.png", png([0, 0, 255, 255]));
        engine.adopt_generated(&[record(0.0, 2.0, 0)]).unwrap();
        engine.await_assets(Duration::from_secs(5));

        assert!(engine.remove_asset(&id));
        assert!(engine.seek(1.0).unwrap().is_uniform([0, 0, 0]));
    }

    #[test]
    fn test_snapshot_roundtrip_restores_config_and_timeline() {
        let mut engine = engine();
        engine.attach_transport(track(2)).unwrap();
        engine.add_image("a.png", png([9, 9, 9, 255]));
        engine.adopt_generated(&[record(0.0, 2.0, 0)]).unwrap();
        engine.set_video_config(VideoConfig {
            aspect_ratio: AspectRatio::Square,
            caption_style: CaptionStyle::Karaoke,
            ..VideoConfig::default()
        }).unwrap();

        let dir = tempdir().unwrap();
        let path = engine.save_snapshot(dir.path()).unwrap();
        assert!(path.ends_with(SNAPSHOT_FILE_NAME));

        let mut fresh = self::engine();
        let missing = fresh.restore_snapshot(ProjectSnapshot::load(&path).unwrap()).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(fresh.timeline(), engine.timeline());
        assert_eq!(fresh.frame_size(), FrameSize::new(64, 64));
    }

    #[test]
    fn test_playback_and_capture_are_exclusive() {
        let mut engine = engine();
        engine.attach_transport(track(1)).unwrap();
        engine.add_image("a.png", png([1, 1, 1, 255]));
        engine.await_assets(Duration::from_secs(5));

        engine.play().unwrap();
        assert!(engine.is_playing());
        let armed = engine.arm_capture();
        assert!(matches!(armed, Err(CompositorError::Precondition(PreconditionError::SchedulerBusy(_)))));
        assert_eq!(engine.capture_state(), CaptureState::Idle);

        engine.pause();
        assert!(!engine.is_playing());
        engine.arm_capture().unwrap();
        assert!(matches!(engine.play(), Err(CompositorError::Precondition(PreconditionError::CaptureInProgress))));
        assert!(engine.cancel_capture());
    }

    #[test]
    fn test_capture_needs_an_available_image() {
        let mut engine = engine();
        engine.attach_transport(track(1)).unwrap();
        engine.add_image("broken.png", b"not an image".to_vec());
        engine.await_assets(Duration::from_secs(5));

        let result = engine.arm_capture();
        assert!(matches!(result, Err(CompositorError::Precondition(PreconditionError::MissingImages))));
        assert_eq!(engine.capture_state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_offline_capture_produces_artifact() {
        let (recorder, log) = MemoryRecorder::new();
        let mut engine = CompositionEngine::with_parts(config(), Box::new(recorder), FontBook::fallback()).unwrap();
        engine.attach_transport(track(2)).unwrap();
        engine.add_image("a.png", png([200, 10, 10, 255]));
        engine.adopt_generated(&[record(0.0, 1.0, 0), record(1.0, 2.0, 0)]).unwrap();
        engine.await_assets(Duration::from_secs(5));

        let artifact = engine.run_capture().await.unwrap();
        assert_eq!(artifact.file_name, "ai-video.webm");
        assert_eq!(artifact.duration, 2.0);
        assert_eq!(engine.capture_state(), CaptureState::Idle);
        assert!(!engine.is_playing());

        let log = log.lock().unwrap();
        // Two seconds at 10 fps, give or take one step of float drift
        assert!((20..=21).contains(&log.frames.len()), "{} frames", log.frames.len());
        assert_eq!(log.audio.len(), 200);
        assert_eq!(log.tracks.unwrap().width, engine.frame_size().width);
        assert_eq!(log.frames[0].get_pixel(0, 0), [200, 10, 10]);

        // The routing graph is reused by the next capture
        drop(log);
        assert!(engine.run_capture().await.is_ok());
    }

    #[tokio::test]
    async fn test_captured_video_matches_audio_length() {
        let mut config = config();
        config.render.fps = 25;
        let (recorder, log) = MemoryRecorder::new();
        let mut engine = CompositionEngine::with_parts(config, Box::new(recorder), FontBook::fallback()).unwrap();
        engine.attach_transport(track(4)).unwrap();
        engine.add_image("a.png", png([5, 5, 5, 255]));
        engine.await_assets(Duration::from_secs(5));

        engine.run_capture().await.unwrap();

        let log = log.lock().unwrap();
        let tracks = log.tracks.unwrap();
        assert_eq!(tracks.fps, 25);
        let video_seconds = log.frames.len() as f64 / tracks.fps as f64;
        let audio_seconds = log.audio.len() as f64 / tracks.sample_rate as f64;
        assert_eq!(audio_seconds, 4.0);
        assert!((video_seconds - audio_seconds).abs() <= 1.0 / 25.0 + 1e-9, "video {}s", video_seconds);
    }
}
