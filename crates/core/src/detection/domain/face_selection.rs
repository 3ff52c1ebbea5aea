use crate::shared::region::Region;

/// Picks the face an enrollment sample is about: the region with the
/// largest visible area inside a `frame_w x frame_h` image.
///
/// Ties go to the earlier, higher-ranked region. Regions that fall
/// entirely outside the frame are never chosen.
pub fn primary_face(regions: &[Region], frame_w: u32, frame_h: u32) -> Option<Region> {
    let mut best: Option<Region> = None;
    for clamped in regions.iter().filter_map(|r| r.clamped(frame_w, frame_h)) {
        if best.as_ref().map_or(true, |b| clamped.area() > b.area()) {
            best = Some(clamped);
        }
    }
    best
}
