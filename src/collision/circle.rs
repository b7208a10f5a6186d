//! Contacts involving circles. Both produce at most one point.

use super::manifold::{ContactId, Manifold, ManifoldType};
use crate::math::Transform;
use crate::shape::{CircleShape, PolygonShape};

pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.center());
    let p_b = xf_b.apply(circle_b.center());
    let radius = circle_a.radius + circle_b.radius;
    if p_a.distance_squared(p_b) > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldType::Circles;
    manifold.local_point = circle_a.center();
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.center();
    manifold.points[0].id = ContactId::default();
    manifold
}

/// Polygon A against circle B. The manifold is always [`ManifoldType::FaceA`].
pub fn collide_polygon_and_circle(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the polygon's frame.
    let c = xf_b.apply(circle_b.center());
    let c_local = xf_a.apply_t(c);

    let radius = poly_a.radius + circle_b.radius;
    let vertices = poly_a.vertices();
    let normals = poly_a.normals();

    // Face of minimum penetration.
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for (i, (n, v)) in normals.iter().zip(vertices).enumerate() {
        let s = n.dot(c_local - *v);
        if s > radius {
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[(normal_index + 1) % vertices.len()];

    manifold.kind = ManifoldType::FaceA;
    manifold.points[0].local_point = circle_b.center();
    manifold.points[0].id = ContactId::default();

    // Center inside the polygon core.
    if separation < f32::EPSILON {
        manifold.point_count = 1;
        manifold.local_normal = normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        return manifold;
    }

    // Vertex or face region.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.local_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.local_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(normals[normal_index]);
        if s > radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.local_normal = normals[normal_index];
        manifold.local_point = face_center;
    }

    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;
    use glam::Vec2;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_circles_overlap() {
        let a = CircleShape::new(Vec2::ZERO, 0.5);
        let b = CircleShape::new(Vec2::ZERO, 0.5);
        let xf_b = Transform::from_translation(Vec2::new(0.0, 0.8));
        let m = collide_circles(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(m.point_count, 1);
        let wm = WorldManifold::new(&m, &Transform::IDENTITY, 0.5, &xf_b, 0.5);
        assert!((wm.normal - Vec2::Y).length() < EPS);
        assert!((wm.separations[0] + 0.2).abs() < EPS);
    }

    #[test]
    fn test_circles_apart() {
        let a = CircleShape::new(Vec2::ZERO, 0.5);
        let xf_b = Transform::from_translation(Vec2::new(1.1, 0.0));
        assert!(collide_circles(&a, &Transform::IDENTITY, &a, &xf_b).is_empty());
    }

    #[test]
    fn test_circle_on_face() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(Vec2::ZERO, 0.5);
        let xf_b = Transform::from_translation(Vec2::new(0.2, 1.4));
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldType::FaceA);
        assert_eq!(m.local_normal, Vec2::Y);

        let wm = WorldManifold::new(&m, &Transform::IDENTITY, poly.radius, &xf_b, 0.5);
        assert!((wm.separations[0] - (0.4 - 0.5 - poly.radius)).abs() < EPS);
    }

    #[test]
    fn test_circle_near_corner() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(Vec2::ZERO, 0.5);
        let touching = Transform::from_translation(Vec2::new(1.3, 1.3));
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &touching);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.local_point, Vec2::new(1.0, 1.0));
        assert!((m.local_normal - Vec2::splat(0.5f32.sqrt())).length() < EPS);

        // Inside the face slabs' reach but outside the rounded corner.
        let apart = Transform::from_translation(Vec2::new(1.45, 1.45));
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &apart);
        assert!(m.is_empty());
    }

    #[test]
    fn test_deep_center_uses_min_face() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(Vec2::ZERO, 0.1);
        let xf_b = Transform::from_translation(Vec2::new(0.9, 0.0));
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.local_normal, Vec2::X);
    }
}
