//! Rasterization of imgui draw data.
//!
//! The `rasterizer` walks a `DrawCommandList` and drives a `RenderBackend`, which
//! models an immediate graphics API: a render state that can be saved and
//! restored, a projection, a bound vertex/index buffer pair, a bound texture, a
//! scissor rectangle and indexed triangle draws.

pub mod draw_list;
pub mod rasterizer;
pub mod recording;
pub mod wgpu_backend;

pub use draw_list::*;
pub use rasterizer::*;
pub use recording::*;
pub use wgpu_backend::*;

use crate::UiResult;

/// The graphics API the rasterizer talks to.
pub trait RenderBackend {
    /// Clears the framebuffer. This is the first call of every frame.
    fn clear(&mut self, color: [f32; 4]);

    /// Saves the bound texture, the render state, the projection and the scissor.
    fn push_state(&mut self);

    fn apply_state(&mut self, state: &RenderState);

    fn set_projection(&mut self, projection: &Projection);

    /// Binds the interleaved vertices and the index buffer used by the following draws.
    fn bind_draw_list(&mut self, vertices: &[Vertex], indices: &[DrawIndex]);

    fn bind_texture(&mut self, texture: TextureHandle);

    fn set_scissor(&mut self, scissor: ScissorRect);

    /// Draws `count` indices of the bound index buffer as triangles, starting at
    /// `first_index`.
    fn draw_indexed(&mut self, first_index: u32, count: u32);

    /// Restores what the matching `push_state()` saved.
    fn pop_state(&mut self);

    /// Shows the finished frame.
    fn present(&mut self) -> UiResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    Disabled,
    /// `src * src_alpha + dst * (1 - src_alpha)`
    Alpha,
}

/// The global render state touched by the rasterizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderState {
    pub blend: Blend,
    pub cull_face: bool,
    pub depth_test: bool,
    pub scissor_test: bool,
    /// Position, texture coordinate and color arrays are read from the bound vertices.
    pub vertex_arrays: bool,
    pub texturing: bool,
}

impl RenderState {
    /// The state GUI geometry is drawn with.
    pub const GUI: RenderState = RenderState {
        blend: Blend::Alpha,
        cull_face: false,
        depth_test: false,
        scissor_test: true,
        vertex_arrays: true,
        texturing: true,
    };
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            blend: Blend::Disabled,
            cull_face: false,
            depth_test: false,
            scissor_test: false,
            vertex_arrays: false,
            texturing: false,
        }
    }
}

/// A column-major 4x4 projection matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub matrix: [[f32; 4]; 4],
}

impl Projection {
    pub const IDENTITY: Projection = Projection {
        matrix: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Maps the display rectangle at `pos` with `size` to clip space, with the origin
    /// in the top-left corner and Y growing downward.
    pub fn orthographic(pos: [f32; 2], size: [f32; 2]) -> Projection {
        let left = pos[0];
        let right = pos[0] + size[0];
        let top = pos[1];
        let bottom = pos[1] + size[1];

        Projection {
            matrix: [
                [2.0 / (right - left), 0.0, 0.0, 0.0],
                [0.0, 2.0 / (top - bottom), 0.0, 0.0],
                [0.0, 0.0, -1.0, 0.0],
                [
                    (right + left) / (left - right),
                    (top + bottom) / (bottom - top),
                    0.0,
                    1.0,
                ],
            ],
        }
    }

    /// Transforms a 2D point (z = 0) to normalized device coordinates.
    pub fn transform(&self, point: [f32; 2]) -> [f32; 2] {
        let m = &self.matrix;
        let x = m[0][0] * point[0] + m[1][0] * point[1] + m[3][0];
        let y = m[0][1] * point[0] + m[1][1] * point[1] + m[3][1];
        let w = m[0][3] * point[0] + m[1][3] * point[1] + m[3][3];
        [x / w, y / w]
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::IDENTITY
    }
}

/// A scissor rectangle in framebuffer pixels with the origin in the bottom-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScissorRect {
    /// Converts a clip rectangle already in framebuffer pixels (origin top-left) to a
    /// scissor rectangle. Coordinates are truncated.
    pub fn from_clip(clip: &ClipRect, framebuffer_height: f32) -> ScissorRect {
        ScissorRect {
            x: clip.left as i32,
            y: (framebuffer_height - clip.bottom) as i32,
            width: (clip.right - clip.left) as i32,
            height: (clip.bottom - clip.top) as i32,
        }
    }

    /// Converts to a top-left origin rectangle `(x, y, width, height)` clamped to a
    /// framebuffer of `width` x `height`. `None` if nothing of it is visible.
    pub fn to_top_left(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let (fb_width, fb_height) = (i64::from(width), i64::from(height));
        let top = fb_height - (i64::from(self.y) + i64::from(self.height));

        let x0 = i64::from(self.x).max(0);
        let y0 = top.max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(fb_width);
        let y1 = (top + i64::from(self.height)).min(fb_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orthographic_maps_display_corners() {
        let projection = Projection::orthographic([0.0, 0.0], [960.0, 540.0]);

        let top_left = projection.transform([0.0, 0.0]);
        assert_relative_eq!(top_left[0], -1.0, epsilon = 1e-6);
        assert_relative_eq!(top_left[1], 1.0, epsilon = 1e-6);

        let bottom_right = projection.transform([960.0, 540.0]);
        assert_relative_eq!(bottom_right[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(bottom_right[1], -1.0, epsilon = 1e-6);

        let center = projection.transform([480.0, 270.0]);
        assert_relative_eq!(center[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(center[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn orthographic_honors_display_position() {
        let projection = Projection::orthographic([100.0, 50.0], [200.0, 100.0]);
        let top_left = projection.transform([100.0, 50.0]);
        assert_relative_eq!(top_left[0], -1.0, epsilon = 1e-6);
        assert_relative_eq!(top_left[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn scissor_flips_y() {
        let clip = ClipRect::new(10.0, 20.0, 110.0, 70.0);
        let scissor = ScissorRect::from_clip(&clip, 540.0);
        assert_eq!(
            scissor,
            ScissorRect {
                x: 10,
                y: 470,
                width: 100,
                height: 50,
            }
        );
        // and back
        assert_eq!(scissor.to_top_left(960, 540), Some((10, 20, 100, 50)));
    }

    #[test]
    fn scissor_is_clamped_to_the_framebuffer() {
        let scissor = ScissorRect {
            x: -10,
            y: -10,
            width: 2000,
            height: 2000,
        };
        assert_eq!(scissor.to_top_left(960, 540), Some((0, 0, 960, 540)));

        let outside = ScissorRect {
            x: 1000,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(outside.to_top_left(960, 540), None);

        let empty = ScissorRect {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        };
        assert_eq!(empty.to_top_left(960, 540), None);
    }
}
