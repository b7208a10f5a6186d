//! Contact manifolds, contact ids and segment clipping.

use glam::Vec2;

use crate::math::Transform;
use crate::settings::MAX_MANIFOLD_POINTS;

/// Whether a contact feature is a vertex or a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ContactFeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// The features that intersect to form a contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContactFeature {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
}

impl ContactFeature {
    /// Exchange the A and B sides.
    pub fn swapped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// Identifies a contact point across steps so impulses can be carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContactId {
    pub cf: ContactFeature,
}

impl ContactId {
    pub fn new(
        index_a: u8,
        type_a: ContactFeatureType,
        index_b: u8,
        type_b: ContactFeatureType,
    ) -> Self {
        Self {
            cf: ContactFeature {
                index_a,
                index_b,
                type_a,
                type_b,
            },
        }
    }

    /// The four feature bytes packed into one integer for fast comparison.
    #[inline]
    pub fn key(&self) -> u32 {
        u32::from_le_bytes([
            self.cf.index_a,
            self.cf.index_b,
            self.cf.type_a as u8,
            self.cf.type_b as u8,
        ])
    }
}

/// How the manifold's local normal and point should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ManifoldType {
    /// `local_point` is circle A's center; the normal is recomputed.
    #[default]
    Circles = 0,
    /// Reference face on A; normal and plane point in A's frame.
    FaceA = 1,
    /// Reference face on B; normal and plane point in B's frame.
    FaceB = 2,
}

impl ManifoldType {
    /// Inverse of `as u32`, for constraint rows stored as plain data.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => ManifoldType::FaceA,
            2 => ManifoldType::FaceB,
            _ => ManifoldType::Circles,
        }
    }
}

/// A contact point in the local frame of the non-reference body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    /// Circles: center of circle B in B's frame. FaceA: clip point in B's
    /// frame. FaceB: clip point in A's frame.
    pub local_point: Vec2,
    /// Non-penetration impulse, kept for warm starting.
    pub normal_impulse: f32,
    /// Friction impulse, kept for warm starting.
    pub tangent_impulse: f32,
    pub id: ContactId,
}

/// Contact points between two convex shapes, stored in local coordinates so
/// they survive small body motions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    pub kind: ManifoldType,
    /// Unused for [`ManifoldType::Circles`].
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl Manifold {
    /// Live points.
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// The same contact with the roles of A and B exchanged.
    pub fn swapped(&self) -> Manifold {
        let mut out = *self;
        for p in out.points_mut() {
            p.id.cf = p.id.cf.swapped();
        }
        match self.kind {
            ManifoldType::Circles => {
                if self.point_count > 0 {
                    out.local_point = self.points[0].local_point;
                    out.points[0].local_point = self.local_point;
                }
            }
            ManifoldType::FaceA => out.kind = ManifoldType::FaceB,
            ManifoldType::FaceB => out.kind = ManifoldType::FaceA,
        }
        out
    }
}

/// A manifold evaluated in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// Points from A to B.
    pub normal: Vec2,
    /// Midpoints between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when overlapping.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = WorldManifold::default();
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                out.normal = Vec2::X;
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > f32::EPSILON * f32::EPSILON {
                    out.normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldType::FaceA => {
                out.normal = xf_a.q.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.apply(mp.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.apply(mp.local_point);
                    let c_b =
                        clip_point + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(normal);
                }

                // Keep the A to B convention.
                out.normal = -normal;
            }
        }

        out
    }
}

/// Lifecycle of a contact point between two consecutive manifolds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    /// Slot unused.
    #[default]
    Null,
    /// New in the second manifold.
    Add,
    /// Present in both.
    Persist,
    /// Gone from the second manifold.
    Remove,
}

/// Classify the points of `old` and `new` by contact id. The first array
/// describes `old`'s points, the second `new`'s.
pub fn get_point_states(
    old: &Manifold,
    new: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (i, p) in old.points().iter().enumerate() {
        let key = p.id.key();
        state1[i] = if new.points().iter().any(|q| q.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    for (i, p) in new.points().iter().enumerate() {
        let key = p.id.key();
        state2[i] = if old.points().iter().any(|q| q.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

/// A segment endpoint carried through clipping, with the features it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Clip the segment `input` against the half-plane `normal . x <= offset`.
///
/// Writes the surviving endpoints to `out` and returns how many there are.
/// A point created by the clip takes `vertex_index_a` as its A feature.
pub fn clip_segment_to_line(
    out: &mut [ClipVertex; 2],
    input: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> usize {
    let mut count = 0;

    let distance0 = normal.dot(input[0].v) - offset;
    let distance1 = normal.dot(input[1].v) - offset;

    if distance0 <= 0.0 {
        out[count] = input[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        out[count] = input[1];
        count += 1;
    }

    // Endpoints on opposite sides: add the intersection point.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        out[count] = ClipVertex {
            v: input[0].v + interp * (input[1].v - input[0].v),
            id: ContactId::new(
                vertex_index_a as u8,
                ContactFeatureType::Vertex,
                input[0].id.cf.index_b,
                ContactFeatureType::Face,
            ),
        };
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cv(x: f32, y: f32, index_b: u8) -> ClipVertex {
        ClipVertex {
            v: Vec2::new(x, y),
            id: ContactId::new(0, ContactFeatureType::Face, index_b, ContactFeatureType::Vertex),
        }
    }

    #[test]
    fn test_clip_keeps_inside_points() {
        let input = [cv(-1.0, 0.0, 0), cv(1.0, 0.0, 1)];
        let mut out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut out, &input, Vec2::X, 2.0, 3);
        assert_eq!(n, 2);
        assert_eq!(out, input);
    }

    #[test]
    fn test_clip_creates_intersection_with_new_id() {
        let input = [cv(-1.0, 0.0, 4), cv(1.0, 2.0, 5)];
        let mut out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut out, &input, Vec2::X, 0.0, 3);
        assert_eq!(n, 2);
        assert_eq!(out[0], input[0]);
        assert!((out[1].v - Vec2::new(0.0, 1.0)).length() < 1e-6);
        assert_eq!(
            out[1].id,
            ContactId::new(3, ContactFeatureType::Vertex, 4, ContactFeatureType::Face)
        );
    }

    #[test]
    fn test_clip_fully_outside() {
        let input = [cv(3.0, 0.0, 0), cv(4.0, 0.0, 1)];
        let mut out = [ClipVertex::default(); 2];
        assert_eq!(clip_segment_to_line(&mut out, &input, Vec2::X, 2.0, 0), 0);
    }

    #[test]
    fn test_contact_key_distinguishes_features() {
        let a = ContactId::new(1, ContactFeatureType::Face, 2, ContactFeatureType::Vertex);
        let b = ContactId::new(2, ContactFeatureType::Vertex, 1, ContactFeatureType::Face);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.cf.swapped(), b.cf);
    }

    #[test]
    fn test_point_states() {
        let id = |i| ContactId::new(i, ContactFeatureType::Face, i, ContactFeatureType::Vertex);
        let mut old = Manifold::default();
        old.point_count = 2;
        old.points[0].id = id(0);
        old.points[1].id = id(1);
        let mut new = Manifold::default();
        new.point_count = 2;
        new.points[0].id = id(1);
        new.points[1].id = id(2);

        let (s1, s2) = get_point_states(&old, &new);
        assert_eq!(s1, [PointState::Remove, PointState::Persist]);
        assert_eq!(s2, [PointState::Persist, PointState::Add]);
    }

    #[test]
    fn test_world_manifold_circles() {
        let mut m = Manifold::default();
        m.kind = ManifoldType::Circles;
        m.point_count = 1;
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::from_translation(Vec2::new(1.5, 0.0));
        let wm = WorldManifold::new(&m, &xf_a, 1.0, &xf_b, 1.0);
        assert!((wm.normal - Vec2::X).length() < 1e-6);
        assert!((wm.separations[0] + 0.5).abs() < 1e-6);
        assert!((wm.points[0] - Vec2::new(0.75, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_swapped_face_manifold_flips_kind_and_features() {
        let mut m = Manifold::default();
        m.kind = ManifoldType::FaceA;
        m.point_count = 1;
        m.points[0].id = ContactId::new(1, ContactFeatureType::Face, 0, ContactFeatureType::Vertex);
        let s = m.swapped();
        assert_eq!(s.kind, ManifoldType::FaceB);
        assert_eq!(s.points[0].id.cf.type_a, ContactFeatureType::Vertex);
        assert_eq!(s.points[0].id.cf.index_b, 1);
        assert_eq!(s.swapped(), m);
    }
}
