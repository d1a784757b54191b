use opencv::{
    core::{Point, Size, Vector},
    imgproc::{CHAIN_APPROX_SIMPLE, MORPH_RECT, RETR_EXTERNAL},
    prelude::*,
};

use crate::{
    app::PickError,
    vision::{Candidate, ColorProfile, ProfileStore},
};

/// Colour threshold segmentation. Profiles are scanned in store order and
/// contours in the order OpenCV discovers them.
pub struct Segmenter {
    profiles: ProfileStore,
    min_area: f64,
    kernel: Mat,
}

impl Segmenter {
    const KERNEL_SIZE: i32 = 3;

    pub fn new(profiles: ProfileStore, min_area: f64) -> Result<Self, PickError> {
        let kernel = opencv::imgproc::get_structuring_element(
            MORPH_RECT,
            Size::new(Self::KERNEL_SIZE, Self::KERNEL_SIZE),
            Point::new(-1, -1),
        )?;
        Ok(Self {
            profiles,
            min_area,
            kernel,
        })
    }

    /// First qualifying candidate; scanning stops as soon as one is found
    pub fn first_match(&self, frame: &Mat) -> Result<Option<Candidate>, PickError> {
        if self.profiles.is_empty() {
            return Ok(None);
        }
        let hsv = Self::to_hsv(frame)?;
        for profile in self.profiles.iter() {
            let contours = self.contours(&hsv, profile)?;
            for contour in contours.iter() {
                if let Some(candidate) = self.qualify(profile, &contour)? {
                    log::info!(
                        "Found {} at ({}, {}), area {}",
                        candidate.color,
                        candidate.pixel_x,
                        candidate.pixel_y,
                        candidate.area
                    );
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    /// Every qualifying candidate, in acceptance order
    pub fn candidates(&self, frame: &Mat) -> Result<Vec<Candidate>, PickError> {
        let mut found = Vec::new();
        if self.profiles.is_empty() {
            return Ok(found);
        }
        let hsv = Self::to_hsv(frame)?;
        for profile in self.profiles.iter() {
            let contours = self.contours(&hsv, profile)?;
            for contour in contours.iter() {
                if let Some(candidate) = self.qualify(profile, &contour)? {
                    found.push(candidate);
                }
            }
        }
        Ok(found)
    }

    fn to_hsv(frame: &Mat) -> Result<Mat, PickError> {
        let mut hsv = Mat::default();
        opencv::imgproc::cvt_color_def(frame, &mut hsv, opencv::imgproc::COLOR_BGR2HSV)?;
        Ok(hsv)
    }

    pub(crate) fn mask(&self, hsv: &Mat, profile: &ColorProfile) -> Result<Mat, PickError> {
        let lower = Vector::from_slice(&profile.lower.map(f64::from));
        let upper = Vector::from_slice(&profile.upper.map(f64::from));
        let mut thresholded = Mat::default();
        opencv::core::in_range(hsv, &lower, &upper, &mut thresholded)?;

        // Single open to knock out speckle
        let mut eroded = Mat::default();
        opencv::imgproc::erode_def(&thresholded, &mut eroded, &self.kernel)?;
        let mut cleaned = Mat::default();
        opencv::imgproc::dilate_def(&eroded, &mut cleaned, &self.kernel)?;
        Ok(cleaned)
    }

    fn contours(
        &self,
        hsv: &Mat,
        profile: &ColorProfile,
    ) -> Result<Vector<Vector<Point>>, PickError> {
        let mask = self.mask(hsv, profile)?;
        let mut contours: Vector<Vector<Point>> = Vector::new();
        opencv::imgproc::find_contours_def(
            &mask,
            &mut contours,
            RETR_EXTERNAL,
            CHAIN_APPROX_SIMPLE,
        )?;
        log::trace!("{}: {} contours", profile.name, contours.len());
        Ok(contours)
    }

    fn qualify(
        &self,
        profile: &ColorProfile,
        contour: &Vector<Point>,
    ) -> Result<Option<Candidate>, PickError> {
        let area = opencv::imgproc::contour_area_def(contour)?;
        if area <= self.min_area {
            return Ok(None);
        }
        let m = opencv::imgproc::moments_def(contour)?;
        if m.m00 == 0.0 {
            return Ok(None);
        }
        Ok(Some(Candidate {
            color: profile.name.clone(),
            pixel_x: (m.m10 / m.m00) as i32,
            pixel_y: (m.m01 / m.m00) as i32,
            area,
        }))
    }
}

#[cfg(test)]
mod tests {
    use opencv::core::{CV_8UC3, Rect, Scalar};
    use opencv::imgproc::{FILLED, LINE_8};

    use super::*;

    const RED: (f64, f64, f64) = (0.0, 0.0, 255.0);
    const BLUE: (f64, f64, f64) = (255.0, 0.0, 0.0);

    fn blank() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn fill(frame: &mut Mat, rect: Rect, bgr: (f64, f64, f64)) {
        opencv::imgproc::rectangle(
            frame,
            rect,
            Scalar::new(bgr.0, bgr.1, bgr.2, 0.0),
            FILLED,
            LINE_8,
            0,
        )
        .unwrap();
    }

    fn store() -> ProfileStore {
        ProfileStore::new(vec![
            ColorProfile::new("red", [0, 100, 100], [10, 255, 255]).unwrap(),
            ColorProfile::new("blue", [100, 150, 0], [140, 255, 255]).unwrap(),
        ])
    }

    #[test]
    fn empty_frame_has_no_candidate() {
        let seg = Segmenter::new(store(), 500.0).unwrap();
        assert_eq!(seg.first_match(&blank()).unwrap(), None);
        assert!(seg.candidates(&blank()).unwrap().is_empty());
    }

    #[test]
    fn single_blob_centroid() {
        let seg = Segmenter::new(store(), 500.0).unwrap();
        let mut frame = blank();
        fill(&mut frame, Rect::new(200, 150, 100, 50), BLUE);

        let c = seg.first_match(&frame).unwrap().expect("blob not found");
        assert_eq!(c.color, "blue");
        assert!((c.pixel_x - 249).abs() <= 1, "x = {}", c.pixel_x);
        assert!((c.pixel_y - 174).abs() <= 1, "y = {}", c.pixel_y);
        assert!(c.area > 500.0);
    }

    #[test]
    fn small_blob_is_ignored() {
        let seg = Segmenter::new(store(), 500.0).unwrap();
        let mut frame = blank();
        fill(&mut frame, Rect::new(10, 10, 20, 20), RED);
        assert_eq!(seg.first_match(&frame).unwrap(), None);
    }

    #[test]
    fn speckle_is_removed() {
        let seg = Segmenter::new(store(), 0.0).unwrap();
        let mut frame = blank();
        for i in 0..20 {
            fill(&mut frame, Rect::new(20 + i * 10, 40, 1, 1), RED);
        }
        assert!(seg.candidates(&frame).unwrap().is_empty());
    }

    #[test]
    fn profile_order_wins_over_size() {
        let seg = Segmenter::new(store(), 500.0).unwrap();
        let mut frame = blank();
        fill(&mut frame, Rect::new(20, 20, 40, 40), RED);
        fill(&mut frame, Rect::new(300, 200, 200, 200), BLUE);

        let c = seg.first_match(&frame).unwrap().unwrap();
        assert_eq!(c.color, "red");

        let all = seg.candidates(&frame).unwrap();
        let colours: Vec<&str> = all.iter().map(|c| c.color.as_str()).collect();
        assert_eq!(colours, vec!["red", "blue"]);
        assert_eq!(all[0], c);
    }

    #[test]
    fn same_colour_blobs_follow_contour_order() {
        let seg = Segmenter::new(store(), 500.0).unwrap();
        let mut frame = blank();
        fill(&mut frame, Rect::new(40, 40, 60, 60), RED);
        fill(&mut frame, Rect::new(400, 300, 100, 100), RED);

        let all = seg.candidates(&frame).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|c| c.color == "red"));

        let hsv = Segmenter::to_hsv(&frame).unwrap();
        let red = seg.profiles.iter().next().unwrap();
        let contours = seg.contours(&hsv, red).unwrap();
        let first = opencv::imgproc::bounding_rect(&contours.get(0).unwrap()).unwrap();

        let c = seg.first_match(&frame).unwrap().unwrap();
        assert_eq!(c, all[0]);
        assert!(first.contains(Point::new(c.pixel_x, c.pixel_y)));
        assert!(!first.contains(Point::new(all[1].pixel_x, all[1].pixel_y)));
    }

    #[test]
    fn empty_store_finds_nothing() {
        let seg = Segmenter::new(ProfileStore::default(), 500.0).unwrap();
        let mut frame = blank();
        fill(&mut frame, Rect::new(200, 150, 100, 50), RED);
        assert_eq!(seg.first_match(&frame).unwrap(), None);
        assert!(seg.candidates(&frame).unwrap().is_empty());
    }
}
