//! Convex vertex-set view over any shape child, used by the distance engine.

use glam::Vec2;

use crate::shape::Shape;

/// A convex vertex set with a rounding radius.
///
/// Borrows its vertices from the shape it was built from. Circles are a
/// single vertex with a radius; polygons, edges and chain children are
/// their vertices with the polygon skin radius.
#[derive(Debug, Clone, Copy)]
pub struct DistanceProxy<'a> {
    vertices: &'a [Vec2],
    radius: f32,
}

impl<'a> DistanceProxy<'a> {
    pub fn new(vertices: &'a [Vec2], radius: f32) -> Self {
        debug_assert!(!vertices.is_empty());
        debug_assert!(radius >= 0.0);
        Self { vertices, radius }
    }

    /// Proxy for child `child` of `shape`. Panics if `child` is out of range
    /// for a chain.
    pub fn from_shape(shape: &'a Shape, child: usize) -> Self {
        match shape {
            Shape::Circle(circle) => Self::new(&circle.center, circle.radius),
            Shape::Polygon(polygon) => Self::new(polygon.vertices(), polygon.radius),
            Shape::Edge(edge) => Self::new(&edge.vertices, edge.radius),
            Shape::Chain(chain) => Self::new(chain.edge_vertices(child), chain.radius),
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn vertices(&self) -> &'a [Vec2] {
        self.vertices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.vertices.len());
        self.vertices[index]
    }

    /// Index of the vertex furthest along `d`. The first maximum wins.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    /// Vertex furthest along `d`.
    #[inline]
    pub fn support_vertex(&self, d: Vec2) -> Vec2 {
        self.vertices[self.support(d)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ChainShape, CircleShape, PolygonShape};

    #[test]
    fn test_support_picks_extreme_vertex() {
        let shape = Shape::from(PolygonShape::new_box(1.0, 2.0));
        let proxy = DistanceProxy::from_shape(&shape, 0);
        assert_eq!(proxy.vertex_count(), 4);
        assert_eq!(proxy.support_vertex(Vec2::new(1.0, 1.0)), Vec2::new(1.0, 2.0));
        assert_eq!(proxy.support_vertex(Vec2::new(-1.0, -0.1)), Vec2::new(-1.0, -2.0));
    }

    #[test]
    fn test_support_first_maximum_wins() {
        let shape = Shape::from(PolygonShape::new_box(1.0, 1.0));
        let proxy = DistanceProxy::from_shape(&shape, 0);
        // Vertices 1 and 2 tie along +X.
        assert_eq!(proxy.support(Vec2::X), 1);
    }

    #[test]
    fn test_circle_proxy_is_single_vertex() {
        let shape = Shape::from(CircleShape::new(Vec2::new(0.5, 0.0), 0.25));
        let proxy = DistanceProxy::from_shape(&shape, 0);
        assert_eq!(proxy.vertex_count(), 1);
        assert_eq!(proxy.radius(), 0.25);
        assert_eq!(proxy.support(Vec2::NEG_X), 0);
    }

    #[test]
    fn test_chain_child_borrows_edge() {
        let chain = ChainShape::new_loop(&[
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ])
        .unwrap();
        let shape = Shape::from(chain);
        let proxy = DistanceProxy::from_shape(&shape, 2);
        assert_eq!(proxy.vertices(), &[Vec2::new(0.0, 1.0), Vec2::ZERO]);
    }
}
