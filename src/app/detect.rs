use std::time::Duration;

use tokio::sync::oneshot;

use crate::{
    app::{DetectSettings, PickError, Settings},
    motion::{MotionReport, MotionSequencer},
    robot::build_link,
    store::{Detection, DetectionStore},
    transform::Homography,
    vision::{Camera, Candidate, FrameSource, ProfileStore, Segmenter},
};

/// Poll frames until one holds a qualifying candidate, then map it into the
/// robot frame. The quit channel is checked once per frame.
pub fn detect_once(
    source: &mut dyn FrameSource,
    segmenter: &Segmenter,
    homography: &Homography,
    settings: &DetectSettings,
    quit: &mut oneshot::Receiver<()>,
) -> Result<(Detection, Candidate), PickError> {
    let mut frames: u64 = 0;
    loop {
        if quit.try_recv().is_ok() {
            log::info!("Quit after {} frames", frames);
            return Err(PickError::NoDetection);
        }

        let frame = source.next_frame()?;
        frames += 1;

        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Frame {}: {:?}", frames, segmenter.candidates(&frame)?);
        }

        if let Some(candidate) = segmenter.first_match(&frame)? {
            if settings.delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(settings.delay_ms));
            }
            let (x, y) = homography.to_robot(candidate.pixel_x, candidate.pixel_y)?;
            let detection = Detection::new(x, y, settings.z, settings.rotation);
            log::info!(
                "Detected {} at pixel ({}, {}) -> {:?} after {} frames",
                candidate.color,
                candidate.pixel_x,
                candidate.pixel_y,
                detection,
                frames
            );
            return Ok((detection, candidate));
        }
    }
}

/// Find one object and persist it. Nothing is written when the loop ends
/// without a detection, so an earlier record is left as it was.
pub fn detect_and_save(
    source: &mut dyn FrameSource,
    segmenter: &Segmenter,
    homography: &Homography,
    settings: &DetectSettings,
    store: &DetectionStore,
    quit: &mut oneshot::Receiver<()>,
) -> Result<Detection, PickError> {
    let (detection, _) = detect_once(source, segmenter, homography, settings, quit)?;
    store.save(&detection)?;
    Ok(detection)
}

/// Vision run against the configured camera
pub fn run_detect(
    settings: &Settings,
    mut quit: oneshot::Receiver<()>,
) -> Result<Detection, PickError> {
    let profiles = ProfileStore::load(&settings.profiles)?;
    let homography = Homography::load(&settings.matrix)?;
    let segmenter = Segmenter::new(profiles, settings.detect.min_area)?;
    let store = DetectionStore::new(&settings.record);

    let mut camera = Camera::open(&settings.detect)?;
    log::info!("Detecting objects...");
    detect_and_save(
        &mut camera,
        &segmenter,
        &homography,
        &settings.detect,
        &store,
        &mut quit,
    )
}

/// Motion run: consume the persisted detection and perform the pick and drop
pub fn run_pick(settings: &Settings) -> Result<MotionReport, PickError> {
    let detection = DetectionStore::new(&settings.record).load()?;
    log::info!("Loaded {:?}", detection);

    let mut link = build_link(&settings.link);
    log::info!("Robot link: {}", settings.link.info());
    MotionSequencer::new(link.as_mut(), settings.motion.clone()).run(&detection)
}
