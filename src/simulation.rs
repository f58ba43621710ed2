//! Deterministic data provider for demos and headless runs
//!
//! Simulates a vehicle approaching a left turn at a constant speed. The turn
//! comes back every lap so the arrow keeps animating.

use glam::{DVec2, Vec3};

use crate::events::{NavigationRoute, RouteProgress};
use crate::provider::{CameraParams, DataProvider, PixelFormat, RouteData, VideoFrame};
use crate::ArrowConstants;

/// Distance from the camera to the first control point, in meters
const ARROW_START: f32 = 3.0;

const ROAD_GRAY: [u8; 3] = [72, 72, 76];
const SKY_TOP: [u8; 3] = [235, 206, 135];
const SKY_HORIZON: [u8; 3] = [250, 240, 220];
const LANE_MARK: [u8; 3] = [230, 230, 230];

pub struct SimulatedProvider {
    constants: ArrowConstants,
    camera: CameraParams,
    frame_width: u32,
    frame_height: u32,
    dt: f32,
    time: f32,
    distance_to_turn: f32,
    laps: u32,
    arrived: bool,
}

impl SimulatedProvider {
    pub fn new(constants: ArrowConstants, target_fps: u32) -> Self {
        Self {
            constants,
            camera: CameraParams {
                pitch: 0.1,
                ..Default::default()
            },
            frame_width: 320,
            frame_height: 180,
            dt: 1.0 / target_fps.max(1) as f32,
            time: 0.0,
            distance_to_turn: Self::lap_length(&constants),
            laps: 0,
            arrived: false,
        }
    }

    /// Size of the synthetic video frames
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self.camera.aspect_ratio = width as f32 / height.max(1) as f32;
        self
    }

    fn lap_length(constants: &ArrowConstants) -> f32 {
        constants.max_length + constants.turn_offset_after_origin
    }

    pub fn distance_to_turn(&self) -> f32 {
        self.distance_to_turn
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }

    /// Where the turn is, in the route frame.
    pub fn maneuver_location(&self) -> Option<Vec3> {
        (self.distance_to_turn <= self.constants.max_length)
            .then(|| Vec3::new(ARROW_START + self.distance_to_turn, 0.0, 0.0))
    }

    /// Navigation progress for the current tick.
    pub fn progress(&self) -> RouteProgress {
        let turn = DVec2::new(27.5615, 53.9045);
        RouteProgress {
            route: NavigationRoute {
                waypoints: vec![turn - DVec2::new(0.0, 0.0005), turn, turn + DVec2::new(-0.0005, 0.0)],
            },
            arrived_at_waypoint: self.arrived,
        }
    }

    fn advance(&mut self) {
        self.time += self.dt;
        self.distance_to_turn -= self.constants.reset_speed * self.dt;
        self.arrived = self.distance_to_turn <= 0.0;
        if self.arrived {
            self.distance_to_turn += Self::lap_length(&self.constants);
            self.laps += 1;
            log::debug!("Simulated turn passed, lap {}", self.laps);
        }
    }

    /// Four control points: straight until the turn, then bending left.
    pub fn control_points(&self) -> RouteData {
        let c = &self.constants;
        let p0 = Vec3::new(ARROW_START, 0.0, 0.0);

        if self.distance_to_turn >= c.max_length {
            let end = p0 + Vec3::X * c.max_length;
            return RouteData::new(p0, p0.lerp(end, 1.0 / 3.0), p0.lerp(end, 2.0 / 3.0), end);
        }

        let straight = self.distance_to_turn.max(c.min_mid_offset);
        let corner = p0 + Vec3::X * straight;
        let lateral = (c.max_length - straight).max(c.min_mid_offset);
        let p1 = p0.lerp(corner, 2.0 / 3.0);
        let p3 = corner + Vec3::Y * lateral;
        RouteData::new(p0, p1, corner, p3)
    }

    fn render_frame(&self) -> VideoFrame {
        let (w, h) = (self.frame_width, self.frame_height);
        let horizon = h / 2;
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        // Dashes scroll toward the viewer as the vehicle moves
        let scroll = (self.time * self.constants.reset_speed * 4.0) as u32;

        for y in 0..h {
            for x in 0..w {
                let rgb = if y < horizon {
                    let t = y as f32 / horizon.max(1) as f32;
                    [0, 1, 2].map(|i| {
                        (SKY_TOP[i] as f32 * (1.0 - t) + SKY_HORIZON[i] as f32 * t) as u8
                    })
                } else {
                    let depth = (y - horizon).max(1);
                    let center = w / 2;
                    let half_width = depth / 8 + 1;
                    let on_mark = x.abs_diff(center) < half_width && ((y + scroll) / 12) % 2 == 0;
                    if on_mark {
                        LANE_MARK
                    } else {
                        ROAD_GRAY
                    }
                };
                data.extend_from_slice(&[rgb[2], rgb[1], rgb[0], 255]);
            }
        }

        VideoFrame {
            width: w,
            height: h,
            format: PixelFormat::Bgra8,
            data,
        }
    }
}

impl DataProvider for SimulatedProvider {
    fn camera_params(&mut self) -> CameraParams {
        self.advance();
        self.camera.roll = 0.01 * (self.time * 1.3).sin();
        self.camera
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        Some(self.render_frame())
    }

    fn route_data(&mut self) -> RouteData {
        self.control_points()
    }
}
