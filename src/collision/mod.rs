//! Narrow-phase collision: distance queries and contact manifolds.

pub mod circle;
pub mod distance;
pub mod manifold;
pub mod narrowphase;
pub mod polygon;
pub mod proxy;

pub use circle::{collide_circles, collide_polygon_and_circle};
pub use distance::{distance, test_overlap, DistanceInput, DistanceOutput, SimplexCache};
pub use manifold::{
    clip_segment_to_line, get_point_states, ClipVertex, ContactFeature, ContactFeatureType,
    ContactId, Manifold, ManifoldPoint, ManifoldType, PointState, WorldManifold,
};
pub use narrowphase::collide;
pub use polygon::{collide_polygons, find_incident_edge, find_max_separation};
pub use proxy::DistanceProxy;
