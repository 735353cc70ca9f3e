//! Turns a `DrawCommandList` into calls on a `RenderBackend`.

use super::{
    ClipRect, DrawCommand, DrawCommandList, Projection, RenderBackend, RenderState, ScissorRect,
};
use crate::{ErrorCode, UiError, UiResult};

/// What to do with a draw command that carries a user callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackPolicy {
    /// Drop the rest of the frame and fail with `UNSUPPORTED_DRAW_CALLBACK`.
    Abort,
    /// Log a warning and go on with the next command.
    Skip,
}

impl Default for CallbackPolicy {
    fn default() -> Self {
        CallbackPolicy::Abort
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterOptions {
    pub clear_color: [f32; 4],
    pub callback_policy: CallbackPolicy,
}

impl Default for RasterOptions {
    fn default() -> Self {
        RasterOptions {
            clear_color: [114.0 / 255.0, 144.0 / 255.0, 154.0 / 255.0, 1.0],
            callback_policy: CallbackPolicy::default(),
        }
    }
}

/// Counters of a rasterized frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub draw_calls: u32,
    pub elements: u32,
    pub skipped_callbacks: u32,
}

/// Draws one frame of GUI draw data and presents it.
///
/// The render state the backend had before the call is restored before presenting,
/// and also when the frame is aborted. A list that fails validation is rejected
/// before anything is drawn.
pub fn rasterize<B: RenderBackend + ?Sized>(
    backend: &mut B,
    list: &DrawCommandList,
    options: &RasterOptions,
) -> UiResult<RasterStats> {
    list.validate()?;

    backend.clear(options.clear_color);
    backend.push_state();
    let result = draw_lists(backend, list, options);
    backend.pop_state();

    let stats = result?;
    backend.present()?;
    Ok(stats)
}

fn setup_render_state<B: RenderBackend + ?Sized>(backend: &mut B, projection: &Projection) {
    backend.apply_state(&RenderState::GUI);
    backend.set_projection(projection);
}

fn draw_lists<B: RenderBackend + ?Sized>(
    backend: &mut B,
    list: &DrawCommandList,
    options: &RasterOptions,
) -> UiResult<RasterStats> {
    let projection = Projection::orthographic(list.display_pos, list.display_size);
    let framebuffer_height = list.framebuffer_height();
    let mut stats = RasterStats::default();

    setup_render_state(backend, &projection);

    for draw_list in &list.lists {
        backend.bind_draw_list(&draw_list.vertices, &draw_list.indices);

        let mut offset = 0u32;
        for command in &draw_list.commands {
            match *command {
                DrawCommand::Elements {
                    count,
                    texture,
                    clip_rect,
                } => {
                    if count > 0 {
                        let clip: ClipRect =
                            clip_rect.to_framebuffer(list.display_pos, list.framebuffer_scale);
                        backend.bind_texture(texture);
                        backend.set_scissor(ScissorRect::from_clip(&clip, framebuffer_height));
                        backend.draw_indexed(offset, count);

                        stats.draw_calls += 1;
                        stats.elements += count;
                    }
                    offset += count;
                }
                DrawCommand::ResetRenderState => setup_render_state(backend, &projection),
                DrawCommand::Callback => match options.callback_policy {
                    CallbackPolicy::Abort => {
                        return Err(UiError::with_message(
                            ErrorCode::UNSUPPORTED_DRAW_CALLBACK,
                            format!("callback at index offset {}", offset),
                        ));
                    }
                    CallbackPolicy::Skip => {
                        log::warn!(
                            "Skipping unsupported draw callback at index offset {}.",
                            offset
                        );
                        stats.skipped_callbacks += 1;
                    }
                },
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{
        BackendCall, DrawList, RecordingBackend, TextureHandle, Vertex,
    };

    fn elements(count: u32) -> DrawCommand {
        DrawCommand::Elements {
            count,
            texture: TextureHandle(3),
            clip_rect: ClipRect::new(0.0, 0.0, 100.0, 50.0),
        }
    }

    fn frame(commands: Vec<DrawCommand>) -> DrawCommandList {
        let mut list = DrawCommandList::new([960.0, 540.0], [1.0, 1.0]);
        list.lists.push(DrawList {
            vertices: vec![Vertex::default(); 4],
            indices: vec![0, 1, 2, 0, 2, 3],
            commands,
        });
        list
    }

    #[test]
    fn call_order_of_a_frame() {
        let mut backend = RecordingBackend::default();
        let options = RasterOptions::default();
        rasterize(&mut backend, &frame(vec![elements(6)]), &options).unwrap();

        let calls = backend.calls();
        assert_eq!(calls.first(), Some(&BackendCall::Clear(options.clear_color)));
        assert_eq!(calls[1], BackendCall::PushState);
        assert_eq!(calls[2], BackendCall::ApplyState(RenderState::GUI));
        assert!(matches!(calls[3], BackendCall::SetProjection(_)));
        assert_eq!(
            calls[4],
            BackendCall::BindDrawList {
                vertices: 4,
                indices: 6
            }
        );
        assert_eq!(
            &calls[calls.len() - 2..],
            &[BackendCall::PopState, BackendCall::Present]
        );
    }

    #[test]
    fn state_is_restored_after_the_frame() {
        let mut backend = RecordingBackend::default();
        backend.bind_texture(TextureHandle(99));

        rasterize(&mut backend, &frame(vec![elements(6)]), &RasterOptions::default()).unwrap();

        assert_eq!(backend.state(), RenderState::default());
        assert_eq!(backend.bound_texture(), Some(TextureHandle(99)));
        assert_eq!(backend.stack_depth(), 0);
        assert_eq!(backend.draws()[0].state, RenderState::GUI);
    }

    #[test]
    fn zero_count_commands_are_not_drawn() {
        let mut backend = RecordingBackend::default();
        let stats = rasterize(
            &mut backend,
            &frame(vec![elements(0), elements(6), elements(0)]),
            &RasterOptions::default(),
        )
        .unwrap();

        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.elements, 6);
        assert_eq!(backend.draws().len(), 1);
    }

    #[test]
    fn callback_aborts_by_default_and_restores_state() {
        let mut backend = RecordingBackend::default();
        let err = rasterize(
            &mut backend,
            &frame(vec![elements(3), DrawCommand::Callback, elements(3)]),
            &RasterOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::UNSUPPORTED_DRAW_CALLBACK);
        assert_eq!(backend.draws().len(), 1);
        assert_eq!(backend.stack_depth(), 0);
        assert_eq!(backend.state(), RenderState::default());
        assert_eq!(backend.presented(), 0);
    }

    #[test]
    fn callback_can_be_skipped() {
        let mut backend = RecordingBackend::default();
        let options = RasterOptions {
            callback_policy: CallbackPolicy::Skip,
            ..RasterOptions::default()
        };
        let stats = rasterize(
            &mut backend,
            &frame(vec![elements(3), DrawCommand::Callback, elements(3)]),
            &options,
        )
        .unwrap();

        assert_eq!(stats.skipped_callbacks, 1);
        let offsets: Vec<u32> = backend.draws().iter().map(|d| d.first_index).collect();
        assert_eq!(offsets, vec![0, 3]);
        assert_eq!(backend.presented(), 1);
    }

    #[test]
    fn reset_render_state_reapplies_gui_state() {
        let mut backend = RecordingBackend::default();
        rasterize(
            &mut backend,
            &frame(vec![elements(3), DrawCommand::ResetRenderState, elements(3)]),
            &RasterOptions::default(),
        )
        .unwrap();

        let applied = backend
            .calls()
            .iter()
            .filter(|call| **call == BackendCall::ApplyState(RenderState::GUI))
            .count();
        assert_eq!(applied, 2);
    }

    #[test]
    fn invalid_list_draws_nothing() {
        let mut backend = RecordingBackend::default();
        let err = rasterize(
            &mut backend,
            &frame(vec![elements(6), elements(3)]),
            &RasterOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::INVALID_DRAW_LIST);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn offsets_restart_for_every_list() {
        let mut list = frame(vec![elements(3), elements(3)]);
        list.lists.push(list.lists[0].clone());

        let mut backend = RecordingBackend::default();
        rasterize(&mut backend, &list, &RasterOptions::default()).unwrap();

        let offsets: Vec<u32> = backend.draws().iter().map(|d| d.first_index).collect();
        assert_eq!(offsets, vec![0, 3, 0, 3]);
    }
}
