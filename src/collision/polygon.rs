//! Polygon-polygon contact via the separating axis test and edge clipping.

use super::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldType,
};
use crate::math::{cross_vs, Transform};
use crate::settings::LINEAR_SLOP;
use crate::shape::PolygonShape;

/// Edge of `poly1` whose normal gives the largest separation from `poly2`.
///
/// Returns the edge index and the separation along its normal.
pub fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, f32) {
    let n1s = poly1.normals();
    let v1s = poly1.vertices();
    let v2s = poly2.vertices();
    let xf = xf2.mul_t(xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for (i, (n1, v1)) in n1s.iter().zip(v1s).enumerate() {
        // poly1's normal and vertex in poly2's frame.
        let n = xf.q.apply(*n1);
        let v1 = xf.apply(*v1);

        // Deepest point of poly2 along this normal.
        let si = v2s
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (best_index, max_separation)
}

/// The edge of `poly2` most anti-parallel to reference edge `edge1` of
/// `poly1`, as two world-space clip vertices.
pub fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    let normals1 = poly1.normals();
    let vertices2 = poly2.vertices();
    let normals2 = poly2.normals();

    debug_assert!(edge1 < poly1.vertex_count());

    // Reference normal in poly2's frame.
    let normal1 = xf2.q.apply_t(xf1.q.apply(normals1[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, n2) in normals2.iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < normals2.len() { i1 + 1 } else { 0 };

    let clip = |i: usize| ClipVertex {
        v: xf2.apply(vertices2[i]),
        id: ContactId::new(
            edge1 as u8,
            ContactFeatureType::Face,
            i as u8,
            ContactFeatureType::Vertex,
        ),
    };
    [clip(i1), clip(i2)]
}

/// Contact manifold between two polygons. The normal points from A to B.
///
/// Empty when either polygon has a separating axis, or when clipping the
/// incident edge leaves fewer than two points.
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    // B only becomes the reference when clearly better, which keeps the
    // choice stable from frame to frame. Exact ties go to A.
    let tolerance = 0.1 * LINEAR_SLOP;
    let (poly1, xf1, poly2, xf2, edge1, flip) = if separation_b > separation_a + tolerance {
        manifold.kind = ManifoldType::FaceB;
        (poly_b, xf_b, poly_a, xf_a, edge_b, true)
    } else {
        manifold.kind = ManifoldType::FaceA;
        (poly_a, xf_a, poly_b, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let vertices1 = poly1.vertices();
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < vertices1.len() { edge1 + 1 } else { 0 };

    let mut v11 = vertices1[iv1];
    let mut v12 = vertices1[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = cross_vs(local_tangent, 1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.apply(local_tangent);
    let normal = cross_vs(tangent, 1.0);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    let front_offset = normal.dot(v11);

    // Side planes, pushed out by the skin.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(&mut clip_points1, &incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }

    let np = clip_segment_to_line(&mut clip_points2, &clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in &clip_points2 {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_t(clip.v);
            cp.id = clip.id;
            if flip {
                cp.id.cf = cp.id.cf.swapped();
            }
            point_count += 1;
        }
    }
    manifold.point_count = point_count;

    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use crate::collision::manifold::WorldManifold;

    const EPS: f32 = 1e-3;

    fn unit_box() -> PolygonShape {
        PolygonShape::new_box(0.5, 0.5)
    }

    #[test]
    fn test_separated_boxes_give_empty_manifold() {
        let a = unit_box();
        let b = unit_box();
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::from_translation(Vec2::new(5.0, 0.0));
        let m = collide_polygons(&a, &xf_a, &b, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_overlapping_boxes_two_points() {
        let a = unit_box();
        let b = unit_box();
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::from_translation(Vec2::new(0.9, 0.0));
        let m = collide_polygons(&a, &xf_a, &b, &xf_b);
        assert_eq!(m.point_count, 2);

        let wm = WorldManifold::new(&m, &xf_a, a.radius, &xf_b, b.radius);
        assert!((wm.normal.x.abs() - 1.0).abs() < EPS);
        assert!(wm.normal.y.abs() < EPS);
        // Normal points from A to B.
        assert!(wm.normal.x > 0.0);

        // Core overlap is 0.1; the skins add 2 * POLYGON_RADIUS.
        let skin = a.radius + b.radius;
        for s in &wm.separations[..m.point_count] {
            assert!((s + 0.1 + skin).abs() < EPS, "separation {s}");
        }
        // Core penetration depth, measured between the polygon faces.
        let depth = -(wm.separations[0] + skin);
        assert!((depth - 0.1).abs() < EPS);
    }

    #[test]
    fn test_ids_are_distinct_and_stable() {
        let a = unit_box();
        let b = unit_box();
        let xf_a = Transform::IDENTITY;
        let m1 = collide_polygons(&a, &xf_a, &b, &Transform::from_translation(Vec2::new(0.9, 0.0)));
        let m2 =
            collide_polygons(&a, &xf_a, &b, &Transform::from_translation(Vec2::new(0.91, 0.01)));
        assert_eq!(m1.point_count, 2);
        assert_ne!(m1.points[0].id.key(), m1.points[1].id.key());
        let keys1: Vec<u32> = m1.points().iter().map(|p| p.id.key()).collect();
        let keys2: Vec<u32> = m2.points().iter().map(|p| p.id.key()).collect();
        assert_eq!(keys1, keys2);
    }

    #[test]
    fn test_exact_tie_prefers_a() {
        let a = unit_box();
        let b = unit_box();
        let m = collide_polygons(
            &a,
            &Transform::IDENTITY,
            &b,
            &Transform::from_translation(Vec2::new(0.9, 0.0)),
        );
        assert_eq!(m.kind, ManifoldType::FaceA);
    }

    #[test]
    fn test_deeper_b_face_becomes_reference() {
        // A small box resting rotated on a wide box: B's face separates best.
        let a = PolygonShape::new_box(0.5, 0.5);
        let b = PolygonShape::new_box(5.0, 0.5);
        let xf_a = Transform::new(Vec2::new(0.0, 1.0), 0.5);
        let xf_b = Transform::IDENTITY;
        let m = collide_polygons(&a, &xf_a, &b, &xf_b);
        assert!(m.point_count >= 1);
        assert_eq!(m.kind, ManifoldType::FaceB);

        let wm = WorldManifold::new(&m, &xf_a, a.radius, &xf_b, b.radius);
        // A sits above B, so the A to B normal points down.
        assert!(wm.normal.y < -0.99);
    }

    #[test]
    fn test_max_separation_along_x() {
        let a = unit_box();
        let b = unit_box();
        let (edge, sep) = find_max_separation(
            &a,
            &Transform::IDENTITY,
            &b,
            &Transform::from_translation(Vec2::new(3.0, 0.0)),
        );
        assert_eq!(a.normals()[edge], Vec2::X);
        assert!((sep - 2.0).abs() < 1e-6);
    }
}
