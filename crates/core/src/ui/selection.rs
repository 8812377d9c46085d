//! Pointer, wheel and keyboard handling for the canvas.
//!
//! Translates egui input into editor calls; all geometry lives in the core.

use crate::crop::{CropHit, CropSession};
use crate::editor::{Editor, PointerTarget};
use crate::geometry::Handle;
use crate::image_store::DisplayHandles;
use eframe::egui;

/// Result of processing pointer input for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// A drag started on the given target.
    Started(PointerTarget),
    /// The crop box or the image moved.
    Moved,
    /// The drag ended.
    Ended,
    /// Nothing happened.
    None,
}

/// Feeds drag events from `response` into the editor.
///
/// Holding Shift during a corner drag keeps the aspect ratio.
pub fn process_pointer<H: DisplayHandles>(response: &egui::Response, editor: &mut Editor<H>) -> PointerEvent {
    let keep_aspect = response.ctx.input(|i| i.modifiers.shift);

    // egui reports the drag only once the pointer has left the click
    // threshold; anchor it where the button went down.
    let mut started = None;
    if response.drag_started() {
        let origin = response
            .ctx
            .input(|i| i.pointer.press_origin())
            .or_else(|| response.interact_pointer_pos());
        if let Some(pos) = origin {
            started = Some(editor.pointer_down(pos));
        }
    }

    if response.dragged() {
        let moved = response
            .interact_pointer_pos()
            .is_some_and(|pos| editor.pointer_move(pos, keep_aspect));
        return match started {
            Some(target) => PointerEvent::Started(target),
            None if moved => PointerEvent::Moved,
            None => PointerEvent::None,
        };
    }

    if let Some(target) = started {
        return PointerEvent::Started(target);
    }

    if response.drag_stopped() {
        editor.pointer_up();
        return PointerEvent::Ended;
    }

    PointerEvent::None
}

/// Wheel delta in the "positive scrolls down" convention the viewport uses.
///
/// Only applied while the canvas is hovered so the side panel can scroll.
pub fn wheel_delta(response: &egui::Response) -> Option<f32> {
    if !response.hovered() {
        return None;
    }
    let delta = response.ctx.input(|i| i.raw_scroll_delta.y);
    (delta != 0.0).then_some(-delta)
}

/// Cursor for whatever is under the pointer.
pub fn hover_cursor(crop: &CropSession, pointer: egui::Pos2, panning: bool) -> Option<egui::CursorIcon> {
    if panning {
        return Some(egui::CursorIcon::Grabbing);
    }
    match crop.hit_test(pointer)? {
        CropHit::Handle(handle) => Some(handle_cursor(handle)),
        CropHit::Inside => Some(egui::CursorIcon::Move),
    }
}

fn handle_cursor(handle: Handle) -> egui::CursorIcon {
    match handle {
        Handle::Nw | Handle::Se => egui::CursorIcon::ResizeNwSe,
        Handle::Ne | Handle::Sw => egui::CursorIcon::ResizeNeSw,
        Handle::N | Handle::S => egui::CursorIcon::ResizeVertical,
        Handle::E | Handle::W => egui::CursorIcon::ResizeHorizontal,
    }
}

/// Keyboard shortcuts recognised by the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    CommitCrop,
    CancelCrop,
    Copy,
    Paste,
}

/// Collects this frame's shortcuts.
///
/// Nothing is reported while a text field has focus, so ordinary text
/// editing keeps working. Enter and Escape only matter while cropping.
pub fn shortcuts(ctx: &egui::Context, cropping: bool) -> Vec<Shortcut> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|i| {
        let mut found = Vec::new();
        if cropping && i.key_pressed(egui::Key::Enter) {
            found.push(Shortcut::CommitCrop);
        }
        if cropping && i.key_pressed(egui::Key::Escape) {
            found.push(Shortcut::CancelCrop);
        }

        // The platform integration turns Ctrl/Cmd+C and +V into Copy and
        // Paste events; key presses are checked too for image-only clipboards.
        let copy = i.events.iter().any(|e| matches!(e, egui::Event::Copy))
            || (i.modifiers.command && i.key_pressed(egui::Key::C));
        let paste = i.events.iter().any(|e| matches!(e, egui::Event::Paste(_)))
            || (i.modifiers.command && i.key_pressed(egui::Key::V));
        if copy {
            found.push(Shortcut::Copy);
        }
        if paste {
            found.push(Shortcut::Paste);
        }
        found
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::CropRect;
    use crate::image_processing::encode_png;
    use crate::image_store::HandleCounter;
    use egui::{Event, Key, Modifiers, PointerButton, Pos2, RawInput, Rect, Vec2, pos2};
    use image::{Rgba, RgbaImage};

    fn input(events: Vec<Event>) -> RawInput {
        RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0))),
            events,
            ..Default::default()
        }
    }

    fn press(pos: Pos2, pressed: bool) -> Event {
        Event::PointerButton {
            pos,
            button: PointerButton::Primary,
            pressed,
            modifiers: Modifiers::NONE,
        }
    }

    fn key(key: Key) -> Event {
        Event::Key {
            key,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: Modifiers::NONE,
        }
    }

    fn editor() -> Editor<HandleCounter> {
        let config = Config::builder().build().unwrap();
        let mut editor = Editor::new(HandleCounter::default(), &config);
        let png = encode_png(&RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]))).unwrap();
        assert!(editor.load_binary(png, "shot.png"));
        editor
    }

    /// Runs one frame of a full-window canvas, in the order the editor window uses.
    fn canvas_frame(ctx: &egui::Context, editor: &mut Editor<HandleCounter>, events: Vec<Event>) -> PointerEvent {
        let mut result = PointerEvent::None;
        let _ = ctx.run(input(events), |ctx| {
            egui::CentralPanel::default()
                .frame(egui::Frame::default().inner_margin(egui::Margin::same(0)))
                .show(ctx, |ui| {
                    let rect = ui.max_rect();
                    let response = ui.interact(rect, ui.id().with("canvas"), egui::Sense::click_and_drag());
                    result = process_pointer(&response, editor);
                    editor.layout(rect);
                });
        });
        result
    }

    fn drag(ctx: &egui::Context, editor: &mut Editor<HandleCounter>, from: Pos2, to: Pos2) -> Vec<PointerEvent> {
        vec![
            canvas_frame(ctx, editor, vec![Event::PointerMoved(from)]),
            canvas_frame(ctx, editor, vec![press(from, true)]),
            canvas_frame(ctx, editor, vec![Event::PointerMoved(to)]),
            canvas_frame(ctx, editor, vec![press(to, false)]),
        ]
    }

    #[test]
    fn handle_drag_anchors_at_press_position() {
        let ctx = egui::Context::default();
        let mut editor = editor();
        canvas_frame(&ctx, &mut editor, Vec::new());
        assert!(editor.start_crop());
        assert_eq!(editor.crop().working(), Some(CropRect::new(40.0, 30.0, 320.0, 240.0)));

        // The se handle of the default crop sits at (560, 420) on screen.
        let events = drag(&ctx, &mut editor, pos2(560.0, 420.0), pos2(590.0, 445.0));
        assert!(events.contains(&PointerEvent::Started(PointerTarget::CropHandle)));
        assert_eq!(events.last(), Some(&PointerEvent::Ended));
        assert_eq!(editor.crop().working(), Some(CropRect::new(40.0, 30.0, 350.0, 265.0)));
    }

    #[test]
    fn pan_tracks_pointer_from_press() {
        let ctx = egui::Context::default();
        let mut editor = editor();
        canvas_frame(&ctx, &mut editor, Vec::new());

        let events = drag(&ctx, &mut editor, pos2(400.0, 300.0), pos2(430.0, 320.0));
        assert!(events.contains(&PointerEvent::Started(PointerTarget::Pan)));
        assert_eq!(editor.viewport().offset(), Vec2::new(30.0, 20.0));
        assert!(!editor.viewport().is_panning());
    }

    fn shortcuts_frame(ctx: &egui::Context, events: Vec<Event>, cropping: bool, with_text_field: bool) -> Vec<Shortcut> {
        let mut found = Vec::new();
        let mut text = String::from("receipt");
        let _ = ctx.run(input(events), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                if with_text_field {
                    ui.add(egui::TextEdit::multiline(&mut text).id(egui::Id::new("ocr-text")))
                        .request_focus();
                }
            });
            found = shortcuts(ctx, cropping);
        });
        found
    }

    #[test]
    fn handle_cursors_follow_resize_axis() {
        assert_eq!(handle_cursor(Handle::Se), egui::CursorIcon::ResizeNwSe);
        assert_eq!(handle_cursor(Handle::Ne), egui::CursorIcon::ResizeNeSw);
        assert_eq!(handle_cursor(Handle::N), egui::CursorIcon::ResizeVertical);
        assert_eq!(handle_cursor(Handle::W), egui::CursorIcon::ResizeHorizontal);
    }

    #[test]
    fn enter_commits_only_while_cropping() {
        let ctx = egui::Context::default();
        assert_eq!(shortcuts_frame(&ctx, vec![key(Key::Enter)], true, false), vec![Shortcut::CommitCrop]);
        assert_eq!(shortcuts_frame(&ctx, vec![key(Key::Escape)], true, false), vec![Shortcut::CancelCrop]);
        assert!(shortcuts_frame(&ctx, vec![key(Key::Enter)], false, false).is_empty());
    }

    #[test]
    fn clipboard_events_map_to_shortcuts() {
        let ctx = egui::Context::default();
        assert_eq!(shortcuts_frame(&ctx, vec![Event::Copy], false, false), vec![Shortcut::Copy]);
        assert_eq!(
            shortcuts_frame(&ctx, vec![Event::Paste("x".to_string())], false, false),
            vec![Shortcut::Paste]
        );
    }

    #[test]
    fn focused_text_field_keeps_its_keys() {
        let ctx = egui::Context::default();
        // First frame gives the field focus.
        shortcuts_frame(&ctx, Vec::new(), true, true);
        assert!(ctx.wants_keyboard_input());

        assert!(shortcuts_frame(&ctx, vec![Event::Copy], true, true).is_empty());
        assert!(shortcuts_frame(&ctx, vec![Event::Paste("x".to_string())], true, true).is_empty());
        assert!(shortcuts_frame(&ctx, vec![key(Key::Enter)], true, true).is_empty());
    }
}
