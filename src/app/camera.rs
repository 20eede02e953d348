//! Last-known camera matrices

use crate::core::types::Mat4;

/// View and projection as most recently received from the host
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraState {
    view: Option<Mat4>,
    projection: Option<Mat4>,
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view = Some(view);
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = Some(projection);
    }

    /// Both matrices, once each has arrived at least once
    pub fn matrices(&self) -> Option<(Mat4, Mat4)> {
        Some((self.view?, self.projection?))
    }
}
