//! Lane arrow control points.
//!
//! The arrow mesh is a straight ribbon along +X in `[0, 1]`. The arrow vertex
//! stage bends it along a cubic Bézier through the four control points; the
//! evaluation here mirrors the shader and is used by tests and by callers that
//! need to place things along the arrow on the CPU.

use glam::{Vec3, Vec4};

use crate::math;
use crate::provider::RouteData;

/// Render-space control points of the arrow curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowControlPoints(pub [Vec3; 4]);

impl Default for ArrowControlPoints {
    fn default() -> Self {
        Self([Vec3::ZERO; 4])
    }
}

impl ArrowControlPoints {
    pub fn start(&self) -> Vec3 {
        self.0[0]
    }

    pub fn end(&self) -> Vec3 {
        self.0[3]
    }

    /// Point on the curve at `t` in `[0, 1]`.
    pub fn evaluate(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.0;
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }

    /// Unit tangent at `t`.
    ///
    /// Falls back to the chord, then to +X, when the derivative vanishes.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.0;
        let u = 1.0 - t;
        let d = (p1 - p0) * (3.0 * u * u) + (p2 - p1) * (6.0 * u * t) + (p3 - p2) * (3.0 * t * t);
        d.try_normalize()
            .or_else(|| (p3 - p0).try_normalize())
            .unwrap_or(Vec3::X)
    }

    /// Control points as uniform-ready vectors.
    pub fn to_gpu_data(&self) -> [Vec4; 4] {
        self.0.map(|p| p.extend(1.0))
    }
}

/// Holds the arrow state for the current frame
#[derive(Debug, Default, Clone)]
pub struct ArrowController {
    points: ArrowControlPoints,
}

impl ArrowController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take this tick's route points. No smoothing is applied across frames.
    pub fn update(&mut self, route: &RouteData) {
        self.points = ArrowControlPoints(route.points.map(math::route_to_render));
    }

    pub fn control_points(&self) -> &ArrowControlPoints {
        &self.points
    }
}
