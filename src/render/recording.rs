//! A headless `RenderBackend` that records what it is asked to do.

use super::{
    DrawIndex, Projection, RenderBackend, RenderState, ScissorRect, TextureHandle, Vertex,
};
use crate::UiResult;

/// One call made on a `RecordingBackend`.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Clear([f32; 4]),
    PushState,
    ApplyState(RenderState),
    SetProjection(Projection),
    BindDrawList { vertices: usize, indices: usize },
    BindTexture(TextureHandle),
    SetScissor(ScissorRect),
    DrawIndexed { first_index: u32, count: u32 },
    PopState,
    Present,
}

/// A draw together with the state it was issued in.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    pub first_index: u32,
    pub count: u32,
    pub texture: Option<TextureHandle>,
    pub scissor: Option<ScissorRect>,
    pub projection: Projection,
    pub state: RenderState,
    /// The indices this draw consumes, copied from the bound index buffer.
    pub indices: Vec<DrawIndex>,
}

#[derive(Clone, Debug)]
struct SavedState {
    state: RenderState,
    texture: Option<TextureHandle>,
    projection: Projection,
    scissor: Option<ScissorRect>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    draws: Vec<RecordedDraw>,
    state: RenderState,
    texture: Option<TextureHandle>,
    projection: Projection,
    scissor: Option<ScissorRect>,
    indices: Vec<DrawIndex>,
    saved: Vec<SavedState>,
    presented: u32,
}

impl RecordingBackend {
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn bound_texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Number of `push_state()` calls not yet matched by a `pop_state()`.
    pub fn stack_depth(&self) -> usize {
        self.saved.len()
    }

    /// Number of presented frames.
    pub fn presented(&self) -> u32 {
        self.presented
    }
}

impl RenderBackend for RecordingBackend {
    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(BackendCall::Clear(color));
    }

    fn push_state(&mut self) {
        self.calls.push(BackendCall::PushState);
        self.saved.push(SavedState {
            state: self.state,
            texture: self.texture,
            projection: self.projection,
            scissor: self.scissor,
        });
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.calls.push(BackendCall::ApplyState(*state));
        self.state = *state;
    }

    fn set_projection(&mut self, projection: &Projection) {
        self.calls.push(BackendCall::SetProjection(*projection));
        self.projection = *projection;
    }

    fn bind_draw_list(&mut self, vertices: &[Vertex], indices: &[DrawIndex]) {
        self.calls.push(BackendCall::BindDrawList {
            vertices: vertices.len(),
            indices: indices.len(),
        });
        self.indices = indices.to_vec();
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        self.calls.push(BackendCall::BindTexture(texture));
        self.texture = Some(texture);
    }

    fn set_scissor(&mut self, scissor: ScissorRect) {
        self.calls.push(BackendCall::SetScissor(scissor));
        self.scissor = Some(scissor);
    }

    fn draw_indexed(&mut self, first_index: u32, count: u32) {
        self.calls.push(BackendCall::DrawIndexed { first_index, count });

        let start = first_index as usize;
        let end = start + count as usize;
        self.draws.push(RecordedDraw {
            first_index,
            count,
            texture: self.texture,
            scissor: self.scissor,
            projection: self.projection,
            state: self.state,
            indices: self.indices.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
        });
    }

    fn pop_state(&mut self) {
        self.calls.push(BackendCall::PopState);
        match self.saved.pop() {
            Some(saved) => {
                self.state = saved.state;
                self.texture = saved.texture;
                self.projection = saved.projection;
                self.scissor = saved.scissor;
            }
            None => log::warn!("pop_state() without a matching push_state()."),
        }
    }

    fn present(&mut self) -> UiResult<()> {
        self.calls.push(BackendCall::Present);
        self.presented += 1;
        Ok(())
    }
}
