//! Manifold generation for any pair of shape children.

use std::borrow::Cow;

use super::circle::{collide_circles, collide_polygon_and_circle};
use super::manifold::Manifold;
use super::polygon::collide_polygons;
use crate::math::Transform;
use crate::shape::{CircleShape, PolygonShape, Shape};

/// A convex child reduced to one of the two primitive collision kinds.
/// Edges and chain children become two-vertex polygons.
enum Convex<'a> {
    Circle(&'a CircleShape),
    Polygon(Cow<'a, PolygonShape>),
}

impl<'a> Convex<'a> {
    fn from_shape(shape: &'a Shape, child: usize) -> Self {
        match shape {
            Shape::Circle(circle) => Convex::Circle(circle),
            Shape::Polygon(polygon) => Convex::Polygon(Cow::Borrowed(polygon)),
            Shape::Edge(edge) => Convex::Polygon(Cow::Owned(PolygonShape::from_segment(
                edge.vertices[0],
                edge.vertices[1],
                edge.radius,
            ))),
            Shape::Chain(chain) => {
                let v = chain.edge_vertices(child);
                Convex::Polygon(Cow::Owned(PolygonShape::from_segment(
                    v[0],
                    v[1],
                    chain.radius,
                )))
            }
        }
    }
}

/// Contact manifold between child `child_a` of `shape_a` and child
/// `child_b` of `shape_b`. The normal points from A to B.
pub fn collide(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    child_b: usize,
    xf_b: &Transform,
) -> Manifold {
    match (
        Convex::from_shape(shape_a, child_a),
        Convex::from_shape(shape_b, child_b),
    ) {
        (Convex::Circle(a), Convex::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Convex::Polygon(a), Convex::Circle(b)) => collide_polygon_and_circle(&a, xf_a, b, xf_b),
        (Convex::Circle(a), Convex::Polygon(b)) => {
            collide_polygon_and_circle(&b, xf_b, a, xf_a).swapped()
        }
        (Convex::Polygon(a), Convex::Polygon(b)) => collide_polygons(&a, xf_a, &b, xf_b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::{ManifoldType, WorldManifold};
    use crate::shape::{ChainShape, EdgeShape};
    use glam::Vec2;

    const EPS: f32 = 1e-4;

    fn world(m: &Manifold, a: &Shape, xf_a: &Transform, b: &Shape, xf_b: &Transform) -> WorldManifold {
        WorldManifold::new(m, xf_a, a.radius(), xf_b, b.radius())
    }

    #[test]
    fn test_circle_polygon_order_is_symmetric() {
        let circle = Shape::from(CircleShape::new(Vec2::ZERO, 0.5));
        let square = Shape::from(PolygonShape::new_box(1.0, 1.0));
        let xf_c = Transform::from_translation(Vec2::new(0.0, 1.3));
        let xf_p = Transform::IDENTITY;

        let m1 = collide(&square, 0, &xf_p, &circle, 0, &xf_c);
        let m2 = collide(&circle, 0, &xf_c, &square, 0, &xf_p);
        assert_eq!(m1.kind, ManifoldType::FaceA);
        assert_eq!(m2.kind, ManifoldType::FaceB);

        let w1 = world(&m1, &square, &xf_p, &circle, &xf_c);
        let w2 = world(&m2, &circle, &xf_c, &square, &xf_p);
        assert!((w1.normal + w2.normal).length() < EPS);
        assert!((w1.separations[0] - w2.separations[0]).abs() < EPS);
        assert!((w1.points[0] - w2.points[0]).length() < EPS);
    }

    #[test]
    fn test_box_on_edge() {
        let ground = Shape::from(EdgeShape::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)));
        let crate_box = Shape::from(PolygonShape::new_box(0.5, 0.5));
        let xf_g = Transform::IDENTITY;
        let xf_b = Transform::from_translation(Vec2::new(0.0, 0.49));

        let m = collide(&ground, 0, &xf_g, &crate_box, 0, &xf_b);
        assert_eq!(m.point_count, 2);
        let wm = world(&m, &ground, &xf_g, &crate_box, &xf_b);
        assert!((wm.normal - Vec2::Y).length() < EPS);
    }

    #[test]
    fn test_chain_child_selects_edge() {
        let chain = Shape::from(
            ChainShape::new_chain(&[
                Vec2::new(-4.0, 0.0),
                Vec2::new(0.0, 0.0),
                Vec2::new(4.0, 2.0),
            ])
            .unwrap(),
        );
        let ball = Shape::from(CircleShape::new(Vec2::ZERO, 0.25));
        let xf_c = Transform::IDENTITY;
        let xf_b = Transform::from_translation(Vec2::new(-2.0, 0.2));

        assert_eq!(collide(&chain, 0, &xf_c, &ball, 0, &xf_b).point_count, 1);
        assert!(collide(&chain, 1, &xf_c, &ball, 0, &xf_b).is_empty());
    }

    #[test]
    fn test_separated_pairs_are_empty() {
        let circle = Shape::from(CircleShape::new(Vec2::ZERO, 0.5));
        let square = Shape::from(PolygonShape::new_box(0.5, 0.5));
        let far = Transform::from_translation(Vec2::new(10.0, 0.0));
        for (a, b) in [(&circle, &circle), (&circle, &square), (&square, &circle), (&square, &square)] {
            assert!(collide(a, 0, &Transform::IDENTITY, b, 0, &far).is_empty());
        }
    }
}
