//! Weld joint: glues two bodies together at an anchor, removing all three
//! relative degrees of freedom.
//!
//! Point constraint:
//!
//! ```text
//! C    = cB + rB - cA - rA
//! Cdot = vB + wB x rB - vA - wA x rA
//! J    = [-I  -rA_skew  I  rB_skew]
//! ```
//!
//! Angle constraint:
//!
//! ```text
//! C    = aB - aA - reference_angle
//! Cdot = wB - wA
//! J    = [0 0 -1 0 0 1]
//! ```
//!
//! With a positive frequency the angular row becomes a spring-damper and is
//! solved separately from the point rows.

use std::f32::consts::PI;

use glam::{Mat3, Vec2, Vec3};

use super::constraint::Constraint;
use super::time_step::SolverData;
use crate::math::{cross, cross_sv, inverse22, mul22, solve22, solve33, sym_inverse33, Rot, Transform};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

/// Construction parameters for a [`WeldJoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeldJointDef {
    /// Anchor relative to body A's origin.
    pub local_anchor_a: Vec2,
    /// Anchor relative to body B's origin.
    pub local_anchor_b: Vec2,
    /// `angle_b - angle_a` at rest.
    pub reference_angle: f32,
    /// Angular spring frequency in Hz. 0 makes the joint rigid.
    pub frequency_hz: f32,
    /// Angular spring damping ratio. 1 is critical damping.
    pub damping_ratio: f32,
    /// Whether the two bodies still collide with each other.
    pub collide_connected: bool,
}

impl Default for WeldJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }
}

impl WeldJointDef {
    /// Weld the bodies at `anchor` in their current pose.
    pub fn initialize(&mut self, xf_a: &Transform, xf_b: &Transform, anchor: Vec2) {
        self.local_anchor_a = xf_a.apply_t(anchor);
        self.local_anchor_b = xf_b.apply_t(anchor);
        self.reference_angle = xf_b.q.angle() - xf_a.q.angle();
    }
}

/// How the joint is solved this step, picked during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeldSolveMode {
    /// Spring on the angle, rigid on the point.
    SoftAngular,
    /// Neither body can rotate; only the point rows are solved.
    Rigid2x2,
    /// Full rigid weld.
    Rigid3x3,
}

#[derive(Debug, Clone)]
pub struct WeldJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: f32,
    frequency_hz: f32,
    damping_ratio: f32,
    collide_connected: bool,

    /// Accumulated (linear x, linear y, angular) impulse.
    impulse: Vec3,

    index_a: usize,
    index_b: usize,

    // Refreshed by init_velocity_constraints.
    mode: WeldSolveMode,
    r_a: Vec2,
    r_b: Vec2,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    mass: Mat3,
    gamma: f32,
    bias: f32,

    // Errors measured by the last position pass.
    linear_error: f32,
    angular_error: f32,
}

impl WeldJoint {
    /// Joint between the bodies at island indices `index_a` and `index_b`.
    pub fn new(def: &WeldJointDef, index_a: usize, index_b: usize) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            collide_connected: def.collide_connected,
            impulse: Vec3::ZERO,
            index_a,
            index_b,
            mode: if def.frequency_hz > 0.0 {
                WeldSolveMode::SoftAngular
            } else {
                WeldSolveMode::Rigid3x3
            },
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            mass: Mat3::ZERO,
            gamma: 0.0,
            bias: 0.0,
            linear_error: 0.0,
            angular_error: 0.0,
        }
    }

    /// Island indices change every step as islands are rebuilt.
    pub fn set_island_indices(&mut self, index_a: usize, index_b: usize) {
        self.index_a = index_a;
        self.index_b = index_b;
    }

    pub fn island_indices(&self) -> (usize, usize) {
        (self.index_a, self.index_b)
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    /// Changing between zero and non-zero takes effect on the next step.
    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    pub fn damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    pub fn set_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn solve_mode(&self) -> WeldSolveMode {
        self.mode
    }

    /// Accumulated impulse, kept across steps for warm starting.
    pub fn impulse(&self) -> Vec3 {
        self.impulse
    }

    /// Linear and angular error measured by the last position pass.
    pub fn position_errors(&self) -> (f32, f32) {
        (self.linear_error, self.angular_error)
    }

    /// World anchor on body A.
    pub fn anchor_a(&self, xf_a: &Transform) -> Vec2 {
        xf_a.apply(self.local_anchor_a)
    }

    /// World anchor on body B.
    pub fn anchor_b(&self, xf_b: &Transform) -> Vec2 {
        xf_b.apply(self.local_anchor_b)
    }

    /// Force applied to body B at the anchor during the last step.
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse.truncate()
    }

    /// Torque applied to body B during the last step.
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
    }

    /// Effective mass matrix `J M^-1 J^T` for lever arms `r_a`, `r_b`.
    fn k_matrix(&self, r_a: Vec2, r_b: Vec2) -> Mat3 {
        let (m_a, m_b) = (self.inv_mass_a, self.inv_mass_b);
        let (i_a, i_b) = (self.inv_i_a, self.inv_i_b);

        let exx = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let eyx = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let ezx = -r_a.y * i_a - r_b.y * i_b;
        let eyy = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        let ezy = r_a.x * i_a + r_b.x * i_b;
        let ezz = i_a + i_b;

        Mat3::from_cols(
            Vec3::new(exx, eyx, ezx),
            Vec3::new(eyx, eyy, ezy),
            Vec3::new(ezx, ezy, ezz),
        )
    }
}

impl Constraint for WeldJoint {
    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let body_a = data.bodies[self.index_a];
        let body_b = data.bodies[self.index_b];
        self.local_center_a = body_a.local_center;
        self.local_center_b = body_b.local_center;
        self.inv_mass_a = body_a.inv_mass;
        self.inv_mass_b = body_b.inv_mass;
        self.inv_i_a = body_a.inv_inertia;
        self.inv_i_b = body_b.inv_inertia;

        let a_a = data.positions[self.index_a].a;
        let a_b = data.positions[self.index_b].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        self.r_a = q_a.apply(self.local_anchor_a - self.local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - self.local_center_b);

        let (m_a, m_b) = (self.inv_mass_a, self.inv_mass_b);
        let (i_a, i_b) = (self.inv_i_a, self.inv_i_b);
        let k = self.k_matrix(self.r_a, self.r_b);

        if self.frequency_hz > 0.0 {
            self.mode = WeldSolveMode::SoftAngular;
            self.mass = inverse22(&k);

            let mut inv_m = i_a + i_b;
            let m = if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 };

            let c = a_b - a_a - self.reference_angle;
            let omega = 2.0 * PI * self.frequency_hz;
            // Damping coefficient and spring stiffness.
            let d = 2.0 * m * self.damping_ratio * omega;
            let stiffness = m * omega * omega;

            let h = data.step.dt;
            let gamma = h * (d + h * stiffness);
            self.gamma = if gamma != 0.0 { 1.0 / gamma } else { 0.0 };
            self.bias = c * h * stiffness * self.gamma;

            inv_m += self.gamma;
            self.mass.z_axis.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.z_axis.z == 0.0 {
            self.mode = WeldSolveMode::Rigid2x2;
            self.mass = inverse22(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mode = WeldSolveMode::Rigid3x3;
            self.mass = sym_inverse33(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Rescale for a variable time step.
            self.impulse *= data.step.dt_ratio;

            let p = self.impulse.truncate();
            v_a -= m_a * p;
            w_a -= i_a * (cross(self.r_a, p) + self.impulse.z);
            v_b += m_b * p;
            w_b += i_b * (cross(self.r_b, p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let (m_a, m_b) = (self.inv_mass_a, self.inv_mass_b);
        let (i_a, i_b) = (self.inv_i_a, self.inv_i_b);

        match self.mode {
            WeldSolveMode::SoftAngular => {
                let cdot2 = w_b - w_a;
                let impulse2 =
                    -self.mass.z_axis.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
                self.impulse.z += impulse2;

                w_a -= i_a * impulse2;
                w_b += i_b * impulse2;

                let cdot1 = v_b + cross_sv(w_b, self.r_b) - v_a - cross_sv(w_a, self.r_a);
                let impulse1 = -mul22(&self.mass, cdot1);
                self.impulse.x += impulse1.x;
                self.impulse.y += impulse1.y;

                let p = impulse1;
                v_a -= m_a * p;
                w_a -= i_a * cross(self.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(self.r_b, p);
            }
            WeldSolveMode::Rigid2x2 | WeldSolveMode::Rigid3x3 => {
                let cdot1 = v_b + cross_sv(w_b, self.r_b) - v_a - cross_sv(w_a, self.r_a);
                let cdot2 = w_b - w_a;
                let cdot = cdot1.extend(cdot2);

                let impulse = -(self.mass * cdot);
                self.impulse += impulse;

                let p = impulse.truncate();
                v_a -= m_a * p;
                w_a -= i_a * (cross(self.r_a, p) + impulse.z);
                v_b += m_b * p;
                w_b += i_b * (cross(self.r_b, p) + impulse.z);
            }
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool {
        let mut c_a = data.positions[self.index_a].c;
        let mut a_a = data.positions[self.index_a].a;
        let mut c_b = data.positions[self.index_b].c;
        let mut a_b = data.positions[self.index_b].a;

        let (m_a, m_b) = (self.inv_mass_a, self.inv_mass_b);
        let (i_a, i_b) = (self.inv_i_a, self.inv_i_b);

        // The pose moved since init; rebuild lever arms and K.
        let r_a = Rot::new(a_a).apply(self.local_anchor_a - self.local_center_a);
        let r_b = Rot::new(a_b).apply(self.local_anchor_b - self.local_center_b);
        let k = self.k_matrix(r_a, r_b);

        let c1 = c_b + r_b - c_a - r_a;
        let linear_error = c1.length();
        let angular_error;

        if self.frequency_hz > 0.0 {
            angular_error = 0.0;

            let p = -solve22(&k, c1);
            c_a -= m_a * p;
            a_a -= i_a * cross(r_a, p);
            c_b += m_b * p;
            a_b += i_b * cross(r_b, p);
        } else {
            let c2 = a_b - a_a - self.reference_angle;
            angular_error = c2.abs();

            let impulse = if k.z_axis.z > 0.0 {
                -solve33(&k, c1.extend(c2))
            } else {
                (-solve22(&k, c1)).extend(0.0)
            };

            let p = impulse.truncate();
            c_a -= m_a * p;
            a_a -= i_a * (cross(r_a, p) + impulse.z);
            c_b += m_b * p;
            a_b += i_b * (cross(r_b, p) + impulse.z);
        }

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        self.linear_error = linear_error;
        self.angular_error = angular_error;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
