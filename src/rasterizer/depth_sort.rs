//! Painter's ordering for one mesh
//!
//! Faces are bucketed by average depth (offset so the whole model lands in
//! positive slots), then optionally regrouped by render priority. Buckets
//! have fixed capacities; faces that do not fit are dropped and counted.

use serde::{Deserialize, Serialize};

use super::math::isqrt;
use super::projection::{ScreenVertices, CLIPPED};
use crate::model::{Mesh, PRIORITY_LEVELS};

/// Depth slots; faces must land strictly inside `0..DEPTH_SLOTS`
pub const DEPTH_SLOTS: usize = 1500;
pub const DEPTH_SLOT_CAPACITY: usize = 512;
pub const PRIORITY_CAPACITY: usize = 2000;

/// Vertical cylinder around the model's origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingCylinder {
    /// Largest horizontal distance from the origin
    pub radius: i32,
    /// Distance from the origin to the farthest point above it
    pub top: i32,
    /// Distance from the origin to the farthest point below it
    pub bottom: i32,
    /// Offset that keeps every face depth positive
    pub min_depth: i32,
}

impl BoundingCylinder {
    pub fn from_vertices(xs: &[i32], ys: &[i32], zs: &[i32]) -> Self {
        let mut radius_sq = 0i64;
        let mut min_y = 0i64;
        let mut max_y = 0i64;
        for ((&x, &y), &z) in xs.iter().zip(ys).zip(zs) {
            let (x, y, z) = (x as i64, y as i64, z as i64);
            radius_sq = radius_sq.max(x * x + z * z);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let top = isqrt(radius_sq + min_y * min_y) + 1;
        let bottom = isqrt(radius_sq + max_y * max_y) + 1;
        Self {
            radius: isqrt(radius_sq),
            top,
            bottom,
            min_depth: top.max(bottom),
        }
    }
}

/// How priority 10 and 11 faces are placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityMode {
    /// Plain priority order 0..=11
    #[default]
    Strict,
    /// Priorities 10 and 11 are interleaved with 0, 3 and 5 by depth
    Flexible,
}

/// What happened to the faces of one sort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub culled: usize,
    pub clipped: usize,
    pub out_of_range: usize,
    pub dropped: usize,
}

/// Bucket storage, reused across frames
pub struct DepthSorter {
    depth_slots: Vec<Vec<usize>>,
    /// (face, depth) per priority level
    priority_slots: Vec<Vec<(usize, i32)>>,
    late: Vec<(usize, i32)>,
    order: Vec<usize>,
}

impl Default for DepthSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthSorter {
    pub fn new() -> Self {
        Self {
            depth_slots: vec![Vec::new(); DEPTH_SLOTS],
            priority_slots: vec![Vec::new(); PRIORITY_LEVELS],
            late: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Face indices in draw order from the last `sort`
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn sort(
        &mut self,
        mesh: &Mesh,
        screen: &ScreenVertices,
        cylinder: &BoundingCylinder,
        mode: PriorityMode,
    ) -> SortStats {
        let mut stats = SortStats::default();
        self.order.clear();
        self.depth_slots.iter_mut().for_each(Vec::clear);
        self.priority_slots.iter_mut().for_each(Vec::clear);

        // Bucket by depth
        for face in 0..mesh.face_count() {
            let [a, b, c] = mesh.face(face);
            if screen.x[a] == CLIPPED || screen.x[b] == CLIPPED || screen.x[c] == CLIPPED {
                stats.clipped += 1;
                continue;
            }

            let (xa, xb, xc) = (screen.x[a] as i64, screen.x[b] as i64, screen.x[c] as i64);
            let (ya, yb, yc) = (screen.y[a] as i64, screen.y[b] as i64, screen.y[c] as i64);
            if (xa - xb) * (yc - yb) - (ya - yb) * (xc - xb) <= 0 {
                stats.culled += 1;
                continue;
            }

            let depth = (screen.z[a] + screen.z[b] + screen.z[c]) / 3 + cylinder.min_depth;
            if depth <= 0 || depth as usize >= DEPTH_SLOTS {
                stats.out_of_range += 1;
                continue;
            }

            let slot = &mut self.depth_slots[depth as usize];
            if slot.len() < DEPTH_SLOT_CAPACITY {
                slot.push(face);
            } else {
                stats.dropped += 1;
            }
        }

        let deepest = ((cylinder.min_depth as i64) * 2).clamp(0, DEPTH_SLOTS as i64 - 1) as usize;

        if mesh.face_priorities.is_none() {
            for depth in (0..=deepest).rev() {
                self.order.extend_from_slice(&self.depth_slots[depth]);
            }
        } else {
            self.bucket_priorities(mesh, deepest, &mut stats);
            match mode {
                PriorityMode::Strict => {
                    for level in &self.priority_slots {
                        self.order.extend(level.iter().map(|&(face, _)| face));
                    }
                }
                PriorityMode::Flexible => self.flexible_order(),
            }
        }

        if stats.dropped > 0 {
            log::warn!(
                "dropped {} faces: depth slot or priority level full",
                stats.dropped
            );
        }
        stats
    }

    fn bucket_priorities(&mut self, mesh: &Mesh, deepest: usize, stats: &mut SortStats) {
        for depth in (0..=deepest).rev() {
            for &face in &self.depth_slots[depth] {
                let level = &mut self.priority_slots[mesh.face_priority(face) as usize];
                if level.len() < PRIORITY_CAPACITY {
                    level.push((face, depth as i32));
                } else {
                    stats.dropped += 1;
                }
            }
        }
    }

    /// Slot priorities 10 and 11 in front of 0, 3 and 5 while they are
    /// deeper than the average depth of 1-2, 3-4 and 6/8 respectively.
    fn flexible_order(&mut self) {
        let average = |levels: &[usize]| -> i32 {
            let (sum, count) = levels.iter().fold((0i64, 0i64), |(sum, count), &level| {
                let faces = &self.priority_slots[level];
                (
                    sum + faces.iter().map(|&(_, d)| d as i64).sum::<i64>(),
                    count + faces.len() as i64,
                )
            });
            if count > 0 {
                (sum / count) as i32
            } else {
                0
            }
        };
        let thresholds = [(0, average(&[1, 2])), (3, average(&[3, 4])), (5, average(&[6, 8]))];

        self.late.clear();
        self.late.extend_from_slice(&self.priority_slots[10]);
        self.late.extend_from_slice(&self.priority_slots[11]);

        let mut next = 0;
        for level in 0..10 {
            if let Some(&(_, threshold)) = thresholds.iter().find(|(l, _)| *l == level) {
                while next < self.late.len() && self.late[next].1 > threshold {
                    self.order.push(self.late[next].0);
                    next += 1;
                }
            }
            self.order
                .extend(self.priority_slots[level].iter().map(|&(face, _)| face));
        }
        self.order.extend(self.late[next..].iter().map(|&(face, _)| face));
    }
}
