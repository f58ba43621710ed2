//! Data the renderer pulls from the outside world each tick

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

/// Camera intrinsics and vehicle attitude for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Width over height of the camera image
    pub aspect_ratio: f32,
    /// Vertical field of view in radians
    pub vertical_fov: f32,
    /// Radians, positive tilts the camera toward the ground
    pub pitch: f32,
    pub roll: f32,
    /// Camera height above the ground in meters
    pub height: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            aspect_ratio: 16.0 / 9.0,
            vertical_fov: 60f32.to_radians(),
            pitch: 0.0,
            roll: 0.0,
            height: 1.5,
        }
    }
}

/// Arrow control points in the route frame (X forward, Y left, Z up)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RouteData {
    pub points: [Vec3; 4],
}

impl RouteData {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self {
            points: [p0, p1, p2, p3],
        }
    }
}

/// Byte order of a video frame's 4-byte pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
}

/// One camera image, tightly packed rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Source of per-tick camera, video and route data.
///
/// Called once per tick in the order camera parameters, route data, video
/// frame. The video frame is only requested once a drawable is acquired.
pub trait DataProvider {
    fn camera_params(&mut self) -> CameraParams;

    /// The latest camera image, or `None` to skip the background this tick.
    fn current_frame(&mut self) -> Option<VideoFrame>;

    fn route_data(&mut self) -> RouteData;
}

/// Lets the caller keep a handle to a provider the renderer owns.
impl<P: DataProvider + ?Sized> DataProvider for Rc<RefCell<P>> {
    fn camera_params(&mut self) -> CameraParams {
        self.borrow_mut().camera_params()
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        self.borrow_mut().current_frame()
    }

    fn route_data(&mut self) -> RouteData {
        self.borrow_mut().route_data()
    }
}
