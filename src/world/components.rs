//! Physics components for ECS entities.

use glam::Vec2;

use crate::dynamics::{BodyMotion, SolverBody, WeldJoint, WeldJointDef};
use crate::math::Transform;
use crate::shape::{MassData, Shape};

/// Rigid body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyType {
    /// Affected by gravity, joints and contacts.
    Dynamic,
    /// Immovable.
    Static,
    /// Moved by its velocity only, but pushes dynamic bodies.
    Kinematic,
}

/// Rigid body component.
///
/// `position` is the body origin; `mass.center` is the center of mass in
/// body coordinates and `mass.inertia` is about the body origin.
#[derive(Debug, Clone)]
pub struct RigidBody2D {
    pub body_type: RigidBodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub mass: MassData,
    /// Linear damping coefficient (default: 0.0).
    pub linear_damping: f32,
    /// Angular damping coefficient (default: 0.0).
    pub angular_damping: f32,
    /// Gravity scale (default: 1.0).
    pub gravity_scale: f32,
    /// Lock rotation by giving the body infinite inertia.
    pub fixed_rotation: bool,
}

impl RigidBody2D {
    /// Create a dynamic body with unit mass at `position`.
    pub fn new_dynamic(position: Vec2) -> Self {
        Self {
            body_type: RigidBodyType::Dynamic,
            position,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mass: MassData {
                mass: 1.0,
                center: Vec2::ZERO,
                inertia: 0.0,
            },
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            fixed_rotation: false,
        }
    }

    /// Create a static body at `position`.
    pub fn new_static(position: Vec2) -> Self {
        Self {
            body_type: RigidBodyType::Static,
            mass: MassData::default(),
            gravity_scale: 0.0,
            ..Self::new_dynamic(position)
        }
    }

    /// Create a kinematic body at `position`.
    pub fn new_kinematic(position: Vec2) -> Self {
        Self {
            body_type: RigidBodyType::Kinematic,
            ..Self::new_static(position)
        }
    }

    /// Take mass properties from a collider's shape and density.
    pub fn with_mass_from(mut self, collider: &Collider2D) -> Self {
        self.mass = collider.shape.compute_mass(collider.density);
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_velocity(mut self, linear: Vec2, angular: f32) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    /// Body origin transform.
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.angle)
    }

    /// World-space center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.transform().apply(self.mass.center)
    }

    /// Inverse mass and inertia (about the center of mass) as the solver sees
    /// them.
    pub(crate) fn solver_body(&self) -> SolverBody {
        if self.body_type != RigidBodyType::Dynamic {
            return SolverBody {
                local_center: self.mass.center,
                ..SolverBody::STATIC
            };
        }

        // Dynamic bodies without density get unit mass.
        let mass = if self.mass.mass > 0.0 {
            self.mass.mass
        } else {
            1.0
        };
        let center_inertia = self.mass.inertia - mass * self.mass.center.length_squared();
        let inv_inertia = if !self.fixed_rotation && center_inertia > 0.0 {
            1.0 / center_inertia
        } else {
            0.0
        };

        SolverBody {
            inv_mass: 1.0 / mass,
            inv_inertia,
            local_center: self.mass.center,
        }
    }

    pub(crate) fn motion(&self) -> BodyMotion {
        BodyMotion {
            dynamic: self.body_type == RigidBodyType::Dynamic,
            gravity_scale: self.gravity_scale,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
        }
    }
}

/// Collision component. One collider per body entity.
#[derive(Debug, Clone)]
pub struct Collider2D {
    pub shape: Shape,
    /// Coulomb friction coefficient (default: 0.2).
    pub friction: f32,
    /// Coefficient of restitution (default: 0.0).
    pub restitution: f32,
    /// Density in kg/m^2 (default: 1.0).
    pub density: f32,
    /// If true, overlaps are tracked but produce no response.
    pub is_sensor: bool,
}

impl Collider2D {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            density: 1.0,
            is_sensor: false,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// Weld joint between two body entities, spawned as its own entity.
#[derive(Debug, Clone)]
pub struct WeldJoint2D {
    pub body_a: hecs::Entity,
    pub body_b: hecs::Entity,
    pub joint: WeldJoint,
}

impl WeldJoint2D {
    pub fn new(body_a: hecs::Entity, body_b: hecs::Entity, def: &WeldJointDef) -> Self {
        Self {
            body_a,
            body_b,
            joint: WeldJoint::new(def, 0, 0),
        }
    }

    /// Weld two bodies at a world-space anchor using their current poses.
    pub fn at_anchor(
        body_a: (hecs::Entity, &RigidBody2D),
        body_b: (hecs::Entity, &RigidBody2D),
        anchor: Vec2,
    ) -> Self {
        let mut def = WeldJointDef::default();
        def.initialize(&body_a.1.transform(), &body_b.1.transform(), anchor);
        Self::new(body_a.0, body_b.0, &def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::PolygonShape;

    #[test]
    fn test_static_body_has_zero_inverse_mass() {
        let body = RigidBody2D::new_static(Vec2::ZERO).solver_body();
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia, 0.0);
        assert!(!RigidBody2D::new_kinematic(Vec2::ZERO).motion().dynamic);
    }

    #[test]
    fn test_mass_from_collider() {
        let collider = Collider2D::new(PolygonShape::new_box(0.5, 0.5)).with_density(2.0);
        let body = RigidBody2D::new_dynamic(Vec2::ZERO).with_mass_from(&collider);
        assert!((body.mass.mass - 2.0).abs() < 1e-5);

        let solver = body.solver_body();
        assert!((solver.inv_mass - 0.5).abs() < 1e-5);
        // Box inertia m (w^2 + h^2) / 12 = 2 * 2 / 12.
        assert!((solver.inv_inertia - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_rotation_and_default_mass() {
        let mut body = RigidBody2D::new_dynamic(Vec2::ZERO);
        body.mass = MassData::default();
        body.fixed_rotation = true;
        let solver = body.solver_body();
        assert_eq!(solver.inv_mass, 1.0);
        assert_eq!(solver.inv_inertia, 0.0);
    }

    #[test]
    fn test_world_center_offsets_by_rotation() {
        let mut body = RigidBody2D::new_dynamic(Vec2::new(1.0, 0.0))
            .with_angle(std::f32::consts::FRAC_PI_2);
        body.mass.center = Vec2::new(1.0, 0.0);
        let c = body.world_center();
        assert!((c - Vec2::new(1.0, 1.0)).length() < 1e-5);
    }
}
