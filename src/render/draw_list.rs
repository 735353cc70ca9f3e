//! The frame's draw commands, copied out of `imgui::DrawData`.

use crate::{ErrorCode, UiError, UiResult};

/// Index into the vertex buffer of a `DrawList`.
pub type DrawIndex = u16;

/// One interleaved GUI vertex: position, texture coordinate and color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub col: [u8; 4],
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();
}

impl From<&imgui::DrawVert> for Vertex {
    fn from(vert: &imgui::DrawVert) -> Vertex {
        Vertex {
            pos: vert.pos,
            uv: vert.uv,
            col: vert.col,
        }
    }
}

/// Identifies a texture owned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub usize);

impl From<imgui::TextureId> for TextureHandle {
    fn from(id: imgui::TextureId) -> TextureHandle {
        TextureHandle(id.id())
    }
}

impl From<TextureHandle> for imgui::TextureId {
    fn from(handle: TextureHandle) -> imgui::TextureId {
        imgui::TextureId::new(handle.0)
    }
}

/// An axis aligned clip rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl ClipRect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> ClipRect {
        ClipRect {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.left <= self.right && self.top <= self.bottom
    }

    /// Moves the rectangle from display coordinates (relative to `display_pos`) to
    /// framebuffer pixels. Edges are reordered so the result stays well formed even
    /// for a mirroring `scale`.
    pub fn to_framebuffer(&self, display_pos: [f32; 2], scale: [f32; 2]) -> ClipRect {
        let left = (self.left - display_pos[0]) * scale[0];
        let right = (self.right - display_pos[0]) * scale[0];
        let top = (self.top - display_pos[1]) * scale[1];
        let bottom = (self.bottom - display_pos[1]) * scale[1];

        ClipRect {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }
}

impl From<[f32; 4]> for ClipRect {
    /// From imgui's `[x1, y1, x2, y2]` layout.
    fn from(rect: [f32; 4]) -> ClipRect {
        ClipRect::new(rect[0], rect[1], rect[2], rect[3])
    }
}

/// A single instruction of a `DrawList`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCommand {
    /// Draws the next `count` indices with `texture` bound, clipped to `clip_rect`.
    Elements {
        count: u32,
        texture: TextureHandle,
        clip_rect: ClipRect,
    },
    /// Asks the renderer to set its render state up again.
    ResetRenderState,
    /// A user callback injected by widget code. It is never invoked, see `CallbackPolicy`.
    Callback,
}

/// Vertices, indices and the commands that consume the indices in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<DrawIndex>,
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    /// Number of indices consumed by all commands.
    pub fn element_count(&self) -> usize {
        self.commands
            .iter()
            .map(|cmd| match cmd {
                DrawCommand::Elements { count, .. } => *count as usize,
                _ => 0,
            })
            .sum()
    }

    /// Checks that the commands consume exactly the index buffer and that every index
    /// points into the vertex buffer.
    pub fn validate(&self) -> UiResult<()> {
        let consumed = self.element_count();
        if consumed != self.indices.len() {
            return Err(UiError::with_message(
                ErrorCode::INVALID_DRAW_LIST,
                format!(
                    "commands consume {} indices but the list has {}",
                    consumed,
                    self.indices.len()
                ),
            ));
        }

        if let Some(index) = self
            .indices
            .iter()
            .find(|&&i| usize::from(i) >= self.vertices.len())
        {
            return Err(UiError::with_message(
                ErrorCode::INVALID_DRAW_LIST,
                format!(
                    "index {} is out of range for {} vertices",
                    index,
                    self.vertices.len()
                ),
            ));
        }
        Ok(())
    }

    /// The vertex referenced by the `n`th index.
    pub fn indexed_vertex(&self, n: usize) -> Option<&Vertex> {
        let index = *self.indices.get(n)?;
        self.vertices.get(usize::from(index))
    }
}

/// Everything needed to draw one frame of the GUI.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommandList {
    pub lists: Vec<DrawList>,
    /// Top-left of the displayed area in display coordinates.
    pub display_pos: [f32; 2],
    /// Size of the displayed area in display (logical) coordinates.
    pub display_size: [f32; 2],
    /// Framebuffer pixels per display coordinate.
    pub framebuffer_scale: [f32; 2],
}

impl DrawCommandList {
    pub fn new(display_size: [f32; 2], framebuffer_scale: [f32; 2]) -> DrawCommandList {
        DrawCommandList {
            lists: Vec::new(),
            display_pos: [0.0, 0.0],
            display_size,
            framebuffer_scale,
        }
    }

    pub fn framebuffer_height(&self) -> f32 {
        self.display_size[1] * self.framebuffer_scale[1]
    }

    pub fn validate(&self) -> UiResult<()> {
        self.lists.iter().try_for_each(DrawList::validate)
    }

    /// Copies the draw data of the frame imgui just finished.
    ///
    /// Fails if imgui's index offsets disagree with the running sum of the element
    /// counts, or if a command uses a vertex offset.
    pub fn from_imgui(draw_data: &imgui::DrawData) -> UiResult<DrawCommandList> {
        let mut lists = Vec::with_capacity(draw_data.draw_lists_count());

        for draw_list in draw_data.draw_lists() {
            let mut commands = Vec::new();
            let mut offset = 0usize;

            for cmd in draw_list.commands() {
                match cmd {
                    imgui::DrawCmd::Elements { count, cmd_params } => {
                        check_command_offsets(cmd_params.idx_offset, cmd_params.vtx_offset, offset)?;
                        commands.push(DrawCommand::Elements {
                            count: count as u32,
                            texture: cmd_params.texture_id.into(),
                            clip_rect: cmd_params.clip_rect.into(),
                        });
                        offset += count;
                    }
                    imgui::DrawCmd::ResetRenderState => {
                        commands.push(DrawCommand::ResetRenderState)
                    }
                    imgui::DrawCmd::RawCallback { .. } => commands.push(DrawCommand::Callback),
                }
            }

            lists.push(DrawList {
                vertices: draw_list.vtx_buffer().iter().map(Vertex::from).collect(),
                indices: draw_list.idx_buffer().to_vec(),
                commands,
            });
        }

        Ok(DrawCommandList {
            lists,
            display_pos: draw_data.display_pos,
            display_size: draw_data.display_size,
            framebuffer_scale: draw_data.framebuffer_scale,
        })
    }
}

/// An imgui command must start where the previous one ended and must not use a
/// vertex offset (this renderer doesn't announce support for it).
fn check_command_offsets(idx_offset: usize, vtx_offset: usize, expected: usize) -> UiResult<()> {
    if idx_offset != expected || vtx_offset != 0 {
        return Err(UiError::with_message(
            ErrorCode::INVALID_DRAW_LIST,
            format!(
                "command at index offset {} (vertex offset {}), expected {}",
                idx_offset, vtx_offset, expected
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_list(counts: &[u32]) -> DrawList {
        let vertices = vec![Vertex::default(); 4];
        let indices = vec![0, 1, 2, 0, 2, 3];
        let commands = counts
            .iter()
            .map(|&count| DrawCommand::Elements {
                count,
                texture: TextureHandle(1),
                clip_rect: ClipRect::new(0.0, 0.0, 100.0, 50.0),
            })
            .collect();
        DrawList {
            vertices,
            indices,
            commands,
        }
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(Vertex::STRIDE, 20);
        assert_eq!(
            std::mem::size_of::<Vertex>(),
            std::mem::size_of::<imgui::DrawVert>()
        );
    }

    #[test]
    fn element_counts_must_cover_the_index_buffer() {
        assert!(quad_list(&[6]).validate().is_ok());
        assert!(quad_list(&[3, 3]).validate().is_ok());
        assert!(quad_list(&[3, 0, 3]).validate().is_ok());

        let short = quad_list(&[3]).validate().unwrap_err();
        assert_eq!(short.code(), ErrorCode::INVALID_DRAW_LIST);

        let past_end = quad_list(&[6, 3]).validate().unwrap_err();
        assert_eq!(past_end.code(), ErrorCode::INVALID_DRAW_LIST);
    }

    #[test]
    fn callbacks_consume_no_indices() {
        let mut list = quad_list(&[6]);
        list.commands.insert(0, DrawCommand::Callback);
        list.commands.push(DrawCommand::ResetRenderState);
        assert_eq!(list.element_count(), 6);
        assert!(list.validate().is_ok());
    }

    #[test]
    fn indices_must_point_at_vertices() {
        let mut list = quad_list(&[6]);
        list.indices[4] = 4;
        assert_eq!(
            list.validate().unwrap_err().code(),
            ErrorCode::INVALID_DRAW_LIST
        );
        assert!(list.indexed_vertex(4).is_none());
        assert!(list.indexed_vertex(3).is_some());
        assert!(list.indexed_vertex(6).is_none());
    }

    #[test]
    fn clip_rect_scaling_keeps_rects_well_formed() {
        let rects = [
            ClipRect::new(0.0, 0.0, 100.0, 50.0),
            ClipRect::new(10.5, 3.25, 10.5, 3.25),
            ClipRect::new(-20.0, -5.0, 300.0, 700.0),
        ];
        let scales = [[1.0, 1.0], [2.0, 2.0], [1.5, 0.5], [0.0, 3.0], [-1.0, 2.0]];

        for rect in &rects {
            for &scale in &scales {
                let scaled = rect.to_framebuffer([0.0, 0.0], scale);
                assert!(scaled.is_well_formed(), "{:?} * {:?}", rect, scale);
            }
        }

        let scaled = ClipRect::new(10.0, 20.0, 110.0, 70.0).to_framebuffer([0.0, 0.0], [2.0, 2.0]);
        assert_eq!(scaled, ClipRect::new(20.0, 40.0, 220.0, 140.0));
    }

    #[test]
    fn clip_rect_is_relative_to_display_pos() {
        let scaled = ClipRect::new(110.0, 60.0, 210.0, 110.0).to_framebuffer([100.0, 50.0], [1.0, 1.0]);
        assert_eq!(scaled, ClipRect::new(10.0, 10.0, 110.0, 60.0));
    }

    #[test]
    fn texture_handle_round_trips_through_imgui() {
        let id: imgui::TextureId = TextureHandle(42).into();
        assert_eq!(TextureHandle::from(id), TextureHandle(42));
    }

    #[test]
    fn framebuffer_height_uses_scale() {
        let list = DrawCommandList::new([960.0, 540.0], [2.0, 2.0]);
        assert_eq!(list.framebuffer_height(), 1080.0);
        assert!(list.validate().is_ok());
    }

    #[test]
    fn imgui_offsets_must_follow_the_element_counts() {
        assert!(check_command_offsets(0, 0, 0).is_ok());
        assert!(check_command_offsets(6, 0, 6).is_ok());

        let gap = check_command_offsets(9, 0, 6).unwrap_err();
        assert_eq!(gap.code(), ErrorCode::INVALID_DRAW_LIST);

        let vertex_offset = check_command_offsets(6, 4, 6).unwrap_err();
        assert_eq!(vertex_offset.code(), ErrorCode::INVALID_DRAW_LIST);
    }

    #[test]
    fn real_imgui_frame_converts_and_draws() {
        use crate::render::{rasterize, RasterOptions, RecordingBackend};

        crate::utils::with_imgui(|imgui| {
            let ui: &imgui::Ui = imgui.new_frame();
            ui.window("Sample")
                .size([300.0, 200.0], imgui::Condition::Always)
                .build(|| {
                    ui.text("Hello,");
                    ui.button("Press me!");
                    let mut value = 0.5f32;
                    ui.slider("SlidableValue", 0.0, 1.0, &mut value);
                    if let Some(_node) = ui.tree_node("First Item") {
                        ui.text("Word!");
                    }
                });

            let list = DrawCommandList::from_imgui(imgui.render()).unwrap();
            assert_eq!(list.display_size, [960.0, 540.0]);
            assert!(!list.lists.is_empty());
            assert!(list.validate().is_ok());

            let mut backend = RecordingBackend::default();
            let stats = rasterize(&mut backend, &list, &RasterOptions::default()).unwrap();
            assert!(stats.draw_calls > 0);
            assert_eq!(
                stats.elements as usize,
                list.lists.iter().map(DrawList::element_count).sum::<usize>()
            );
        });
    }
}
