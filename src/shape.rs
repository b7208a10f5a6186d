//! Collision shapes.
//!
//! Shapes live in body-local coordinates. Every shape is convex except
//! [`ChainShape`], whose children are individual edges.

use glam::Vec2;

use crate::error::{PhysicsError, Result};
use crate::math::{cross, Transform};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    /// Test whether two AABBs overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower.x <= other.upper.x
            && self.upper.x >= other.lower.x
            && self.lower.y <= other.upper.y
            && self.upper.y >= other.lower.y
    }

    /// Smallest box containing both.
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    fn from_points(points: impl IntoIterator<Item = Vec2>, radius: f32) -> Aabb {
        let mut lower = Vec2::splat(f32::MAX);
        let mut upper = Vec2::splat(f32::MIN);
        for p in points {
            lower = lower.min(p);
            upper = upper.max(p);
        }
        let r = Vec2::splat(radius);
        Aabb {
            lower: lower - r,
            upper: upper + r,
        }
    }
}

/// Mass, center of mass and rotational inertia about the shape origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    pub inertia: f32,
}

/// Discriminant of [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
    Chain,
}

/// Solid circle.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    /// Center in local coordinates. Stored as a one-element array so that
    /// distance proxies can borrow it as a vertex slice.
    pub(crate) center: [Vec2; 1],
    pub radius: f32,
}

impl CircleShape {
    pub fn new(center: Vec2, radius: f32) -> Self {
        debug_assert!(radius >= 0.0);
        Self {
            center: [center],
            radius,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center[0]
    }
}

/// Line segment, two-sided.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeShape {
    pub vertices: [Vec2; 2],
    pub radius: f32,
}

impl EdgeShape {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertices: [v1, v2],
            radius: POLYGON_RADIUS,
        }
    }
}

/// Convex polygon with counter-clockwise winding.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    centroid: Vec2,
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
    pub radius: f32,
}

impl PolygonShape {
    /// Build the convex hull of `points`. Points closer than half the linear
    /// slop are welded; collinear and interior points are dropped.
    pub fn new(points: &[Vec2]) -> Result<Self> {
        if points.len() < 3 {
            return Err(PhysicsError::InvalidPolygon {
                reason: "fewer than three points",
            });
        }
        if points.len() > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::InvalidPolygon {
                reason: "more than MAX_POLYGON_VERTICES points",
            });
        }

        let weld_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut unique: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if unique.iter().all(|q| p.distance_squared(*q) > weld_sq) {
                unique.push(p);
            }
        }
        if unique.len() < 3 {
            return Err(PhysicsError::InvalidPolygon {
                reason: "points are too close together",
            });
        }

        let hull = gift_wrap(&unique);
        if hull.len() < 3 {
            return Err(PhysicsError::InvalidPolygon {
                reason: "points are collinear",
            });
        }

        Self::from_hull(hull, POLYGON_RADIUS)
    }

    /// Axis-aligned box centered on the origin.
    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        let vertices = vec![
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ];
        let normals = vec![Vec2::NEG_Y, Vec2::X, Vec2::Y, Vec2::NEG_X];
        Self {
            centroid: Vec2::ZERO,
            vertices,
            normals,
            radius: POLYGON_RADIUS,
        }
    }

    /// Box with the given center and rotation in local coordinates.
    pub fn new_oriented_box(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let mut shape = Self::new_box(half_width, half_height);
        let xf = Transform::new(center, angle);
        for v in &mut shape.vertices {
            *v = xf.apply(*v);
        }
        for n in &mut shape.normals {
            *n = xf.q.apply(*n);
        }
        shape.centroid = center;
        shape
    }

    /// Two-vertex polygon standing in for a segment, so segments can go
    /// through the polygon clipping path.
    pub(crate) fn from_segment(v1: Vec2, v2: Vec2, radius: f32) -> Self {
        let n = (v2 - v1).perp().normalize_or_zero();
        Self {
            centroid: 0.5 * (v1 + v2),
            vertices: vec![v1, v2],
            normals: vec![-n, n],
            radius,
        }
    }

    fn from_hull(vertices: Vec<Vec2>, radius: f32) -> Result<Self> {
        let count = vertices.len();
        let mut normals = Vec::with_capacity(count);
        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            if edge.length_squared() <= f32::EPSILON * f32::EPSILON {
                return Err(PhysicsError::InvalidPolygon {
                    reason: "degenerate edge",
                });
            }
            normals.push(Vec2::new(edge.y, -edge.x).normalize());
        }
        let centroid = compute_centroid(&vertices);
        Ok(Self {
            centroid,
            vertices,
            normals,
            radius,
        })
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the world-space point lies inside the polygon core.
    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let local = xf.apply_t(point);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    fn compute_mass(&self, density: f32) -> MassData {
        let count = self.vertices.len();
        let s = self.vertices[0];
        let inv3 = 1.0 / 3.0;

        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        for i in 0..count {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % count] - s;
            let d = cross(e1, e2);

            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * inv3 * (e1 + e2);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * inv3 * d) * (int_x2 + int_y2);
        }

        if area <= f32::EPSILON {
            return MassData::default();
        }

        let mass = density * area;
        center /= area;
        let world_center = center + s;
        // Inertia about the reference point, shifted to the center of mass
        // and then to the shape origin.
        let inertia =
            density * inertia + mass * (world_center.dot(world_center) - center.dot(center));

        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

/// Gift-wrapping convex hull. Returns counter-clockwise hull points.
fn gift_wrap(points: &[Vec2]) -> Vec<Vec2> {
    // Right-most point, lowest y on ties.
    let mut i0 = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        let best = points[i0];
        if p.x > best.x || (p.x == best.x && p.y < best.y) {
            i0 = i;
        }
    }

    let mut hull: Vec<usize> = Vec::with_capacity(points.len());
    let mut ih = i0;
    loop {
        if hull.len() > points.len() {
            // Numerical trouble; a valid hull can never exceed the input.
            return Vec::new();
        }
        hull.push(ih);

        let mut ie = 0;
        for j in 1..points.len() {
            if ie == ih {
                ie = j;
                continue;
            }
            let r = points[ie] - points[ih];
            let v = points[j] - points[ih];
            let c = cross(r, v);
            if c < 0.0 || (c == 0.0 && v.length_squared() > r.length_squared()) {
                ie = j;
            }
        }

        ih = ie;
        if ie == i0 {
            break;
        }
    }

    hull.into_iter().map(|i| points[i]).collect()
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    let count = vertices.len();
    let s = vertices[0];
    let inv3 = 1.0 / 3.0;
    let mut c = Vec2::ZERO;
    let mut area = 0.0;

    for i in 0..count {
        let e1 = vertices[i] - s;
        let e2 = vertices[(i + 1) % count] - s;
        let triangle_area = 0.5 * cross(e1, e2);
        area += triangle_area;
        c += triangle_area * inv3 * (e1 + e2);
    }

    debug_assert!(area > f32::EPSILON);
    c / area + s
}

/// Sequence of edges, open or closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainShape {
    /// Closed chains repeat their first vertex at the end.
    vertices: Vec<Vec2>,
    is_loop: bool,
    pub radius: f32,
}

impl ChainShape {
    /// Open chain through `points`.
    pub fn new_chain(points: &[Vec2]) -> Result<Self> {
        if points.len() < 2 {
            return Err(PhysicsError::InvalidChain {
                reason: "fewer than two points",
            });
        }
        validate_spacing(points)?;
        Ok(Self {
            vertices: points.to_vec(),
            is_loop: false,
            radius: POLYGON_RADIUS,
        })
    }

    /// Closed loop through `points`; the closing edge is added automatically.
    pub fn new_loop(points: &[Vec2]) -> Result<Self> {
        if points.len() < 3 {
            return Err(PhysicsError::InvalidChain {
                reason: "fewer than three points in a loop",
            });
        }
        validate_spacing(points)?;
        let mut vertices = points.to_vec();
        vertices.push(points[0]);
        Ok(Self {
            vertices,
            is_loop: true,
            radius: POLYGON_RADIUS,
        })
    }

    pub fn is_loop(&self) -> bool {
        self.is_loop
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The two vertices of edge `index`.
    pub fn edge_vertices(&self, index: usize) -> &[Vec2] {
        debug_assert!(index < self.edge_count());
        &self.vertices[index..index + 2]
    }

    /// Edge `index` as a standalone shape.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        let v = self.edge_vertices(index);
        EdgeShape {
            vertices: [v[0], v[1]],
            radius: self.radius,
        }
    }
}

fn validate_spacing(points: &[Vec2]) -> Result<()> {
    let min_sq = LINEAR_SLOP * LINEAR_SLOP;
    if points
        .windows(2)
        .any(|w| w[0].distance_squared(w[1]) <= min_sq)
    {
        return Err(PhysicsError::InvalidChain {
            reason: "consecutive points are too close",
        });
    }
    Ok(())
}

/// Any collision shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
    Chain(ChainShape),
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Rounding radius.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(s) => s.radius,
            Shape::Edge(s) => s.radius,
            Shape::Polygon(s) => s.radius,
            Shape::Chain(s) => s.radius,
        }
    }

    /// Number of convex children. Only chains have more than one.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.edge_count(),
            _ => 1,
        }
    }

    /// World-space bounds of child `child`.
    pub fn compute_aabb(&self, xf: &Transform, child: usize) -> Aabb {
        match self {
            Shape::Circle(s) => {
                let p = xf.apply(s.center());
                Aabb::from_points([p], s.radius)
            }
            Shape::Edge(s) => Aabb::from_points(s.vertices.iter().map(|v| xf.apply(*v)), s.radius),
            Shape::Polygon(s) => {
                Aabb::from_points(s.vertices.iter().map(|v| xf.apply(*v)), s.radius)
            }
            Shape::Chain(s) => Aabb::from_points(
                s.edge_vertices(child).iter().map(|v| xf.apply(*v)),
                s.radius,
            ),
        }
    }

    /// Mass properties for the given density. Edges and chains are massless.
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(s) => {
                let mass = density * std::f32::consts::PI * s.radius * s.radius;
                let c = s.center();
                MassData {
                    mass,
                    center: c,
                    inertia: mass * (0.5 * s.radius * s.radius + c.dot(c)),
                }
            }
            Shape::Polygon(s) => s.compute_mass(density),
            Shape::Edge(_) | Shape::Chain(_) => MassData::default(),
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(shape: CircleShape) -> Self {
        Shape::Circle(shape)
    }
}

impl From<EdgeShape> for Shape {
    fn from(shape: EdgeShape) -> Self {
        Shape::Edge(shape)
    }
}

impl From<PolygonShape> for Shape {
    fn from(shape: PolygonShape) -> Self {
        Shape::Polygon(shape)
    }
}

impl From<ChainShape> for Shape {
    fn from(shape: ChainShape) -> Self {
        Shape::Chain(shape)
    }
}
