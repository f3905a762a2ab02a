//! Multi-candidate resolution for a single-subject booth.
//!
//! Matting models happily return several disjoint foreground regions
//! (a bystander at the frame edge, a reflection). The session wants at most
//! `max_subjects` of them; satellite regions close to a kept region are
//! merged into it rather than suppressed, so an arm separated from the
//! torso by thresholding noise survives.

/// One connected foreground region.
#[derive(Debug, Clone)]
struct Region {
    label: u32,
    area: usize,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Region {
    /// Chebyshev gap between this region's bounding box and another's;
    /// zero when the boxes overlap.
    fn gap_to(&self, other: &Region) -> u32 {
        let gap_x = if other.min_x > self.max_x {
            other.min_x - self.max_x
        } else if self.min_x > other.max_x {
            self.min_x - other.max_x
        } else {
            0
        };
        let gap_y = if other.min_y > self.max_y {
            other.min_y - self.max_y
        } else if self.min_y > other.max_y {
            self.min_y - other.max_y
        } else {
            0
        };
        gap_x.max(gap_y)
    }
}

/// Keep at most `max_subjects` foreground regions in a binary matte.
///
/// Regions are ranked by area. A region outside the kept set survives if its
/// bounding box lies within `nms_radius` pixels of a kept region's box;
/// everything else is zeroed out.
pub fn resolve_subjects(
    matte: &mut [f32],
    width: u32,
    height: u32,
    max_subjects: usize,
    nms_radius: u32,
) {
    debug_assert_eq!(matte.len(), (width * height) as usize);

    let (labels, regions) = label_regions(matte, width, height);
    if regions.len() <= max_subjects {
        return;
    }

    let mut ranked = regions;
    ranked.sort_by(|a, b| b.area.cmp(&a.area));

    let (kept, candidates) = ranked.split_at(max_subjects.min(ranked.len()));
    let mut suppressed: Vec<u32> = Vec::new();
    for region in candidates {
        let merged = kept.iter().any(|k| region.gap_to(k) <= nms_radius);
        if !merged {
            suppressed.push(region.label);
        }
    }

    if suppressed.is_empty() {
        return;
    }

    tracing::debug!(
        "Suppressing {} secondary foreground region(s)",
        suppressed.len()
    );

    for (idx, label) in labels.iter().enumerate() {
        if *label != 0 && suppressed.contains(label) {
            matte[idx] = 0.0;
        }
    }
}

fn label_regions(matte: &[f32], width: u32, height: u32) -> (Vec<u32>, Vec<Region>) {
    let labels = component_labels(matte, width, height);
    let mut regions: Vec<Region> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let label = labels[(y * width + x) as usize];
            if label == 0 {
                continue;
            }
            match regions.iter_mut().find(|r| r.label == label) {
                Some(r) => {
                    r.area += 1;
                    r.min_x = r.min_x.min(x);
                    r.min_y = r.min_y.min(y);
                    r.max_x = r.max_x.max(x);
                    r.max_y = r.max_y.max(y);
                }
                None => regions.push(Region {
                    label,
                    area: 1,
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                }),
            }
        }
    }

    (labels, regions)
}

/// 4-connected component labels over the binary matte. 0 = background.
fn component_labels(matte: &[f32], width: u32, height: u32) -> Vec<u32> {
    let mut labels = vec![0u32; matte.len()];
    let mut next_label = 0u32;
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for sy in 0..height {
        for sx in 0..width {
            let start = (sy * width + sx) as usize;
            if matte[start] < 0.5 || labels[start] != 0 {
                continue;
            }

            next_label += 1;
            labels[start] = next_label;
            stack.push((sx, sy));

            while let Some((x, y)) = stack.pop() {
                let mut visit = |nx: u32, ny: u32| {
                    let idx = (ny * width + nx) as usize;
                    if matte[idx] >= 0.5 && labels[idx] == 0 {
                        labels[idx] = next_label;
                        stack.push((nx, ny));
                    }
                };

                if x > 0 {
                    visit(x - 1, y);
                }
                if x + 1 < width {
                    visit(x + 1, y);
                }
                if y > 0 {
                    visit(x, y - 1);
                }
                if y + 1 < height {
                    visit(x, y + 1);
                }
            }
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matte_with_blobs(width: u32, height: u32, blobs: &[(u32, u32, u32, u32)]) -> Vec<f32> {
        let mut matte = vec![0.0f32; (width * height) as usize];
        for &(x0, y0, x1, y1) in blobs {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    matte[(y * width + x) as usize] = 1.0;
                }
            }
        }
        matte
    }

    fn foreground_area(matte: &[f32]) -> usize {
        matte.iter().filter(|&&v| v >= 0.5).count()
    }

    #[test]
    fn single_region_is_untouched() {
        let mut matte = matte_with_blobs(40, 40, &[(10, 10, 20, 30)]);
        let before = matte.clone();
        resolve_subjects(&mut matte, 40, 40, 1, 5);
        assert_eq!(matte, before);
    }

    #[test]
    fn distant_secondary_region_is_suppressed() {
        // Large subject on the left, small distant blob on the right.
        let mut matte = matte_with_blobs(64, 64, &[(2, 2, 20, 40), (55, 50, 60, 60)]);
        resolve_subjects(&mut matte, 64, 64, 1, 5);

        assert_eq!(foreground_area(&matte), 19 * 39);
        assert_eq!(matte[(55 + 64 * 55) as usize], 0.0);
    }

    #[test]
    fn nearby_satellite_is_merged_not_suppressed() {
        // Small blob 3px from the primary's bounding box, within radius.
        let mut matte = matte_with_blobs(64, 64, &[(2, 2, 20, 40), (24, 10, 28, 14)]);
        let before_area = foreground_area(&matte);
        resolve_subjects(&mut matte, 64, 64, 1, 5);
        assert_eq!(foreground_area(&matte), before_area);
    }

    #[test]
    fn keeps_two_subjects_when_configured() {
        let mut matte = matte_with_blobs(64, 64, &[(2, 2, 20, 40), (45, 2, 60, 40)]);
        let before = matte.clone();
        resolve_subjects(&mut matte, 64, 64, 2, 5);
        assert_eq!(matte, before);
    }
}
