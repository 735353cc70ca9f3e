use imgui_sample::*;

const TEXT_INPUT_CAPACITY: usize = 1024;

/// Shortens `text` to at most `max_len` bytes without splitting a character.
fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

struct SampleWindow {
    press_count: u32,
    text_input: String,
    slider_value: f32,
    button_color: [f32; 4],
}

impl SampleWindow {
    fn new() -> SampleWindow {
        SampleWindow {
            press_count: 0,
            text_input: String::with_capacity(TEXT_INPUT_CAPACITY),
            slider_value: 0.0,
            button_color: [55.0 / 255.0, 155.0 / 255.0, 1.0, 1.0],
        }
    }

    /// Rotates the color channels, red wraps around above 1.
    fn rotate_button_color(&mut self) {
        let [r, g, b, a] = self.button_color;
        let mut red = g + 0.25;
        if red > 1.0 {
            red -= 1.0;
        }
        self.button_color = [red, b, r, a];
    }
}

impl Layout for SampleWindow {
    fn layout(&mut self, ui: &LayoutContext<'_>) {
        let display_size = ui.io().display_size;

        ui.main_menu_bar(|| {
            ui.menu("Help", || {
                if ui.menu_item_config("About").shortcut("Ctrl-Alt-A").build() {
                    log::info!("imgui-sample, built with Dear ImGui {}.", imgui::dear_imgui_version());
                }
            });
        });

        ui.window("ImGui Sample")
            .size(
                [display_size[0] - 10.0, display_size[1] - 20.0],
                imgui::Condition::Always,
            )
            .position(
                [display_size[0] * 0.5, display_size[1] * 0.5],
                imgui::Condition::Always,
            )
            .position_pivot([0.5, 0.5])
            .flags(
                imgui::WindowFlags::NO_RESIZE
                    | imgui::WindowFlags::NO_TITLE_BAR
                    | imgui::WindowFlags::NO_MOVE,
            )
            .build(|| {
                ui.text("Hello,");
                ui.text("World!");
                ui.text("From imgui-rs. ...Did that work?");

                let pointer = ui.input().pointer.position();
                let left_pressed = ui.input().buttons[0];
                ui.text(format!(
                    "Current mouse position: ({:.0}, {:.0}). Pressed={}",
                    pointer[0], pointer[1], left_pressed
                ));

                if ui.button_with_size("Press me!", [120.0, 30.0]) {
                    self.press_count += 1;
                }
                ui.text_colored(
                    [0.0, 1.0, 1.0, 1.0],
                    format!("Button pressed {} times.", self.press_count),
                );

                ui.input_text_multiline("Input some numbers:", &mut self.text_input, [360.0, 240.0])
                    .chars_decimal(true)
                    .build();
                truncate_at_char_boundary(&mut self.text_input, TEXT_INPUT_CAPACITY);

                ui.slider_config("SlidableValue", -50.0, 100.0)
                    .display_format("%.2f")
                    .build(&mut self.slider_value);

                if let Some(_node) = ui.tree_node("First Item") {
                    ui.text("Word!");
                }
                if let Some(_node) = ui.tree_node("Second Item") {
                    ui.color_button("##button_color", self.button_color);
                    if ui.button_with_size("Push me to change color", [120.0, 30.0]) {
                        self.rotate_button_color();
                    }
                }
            });
    }

    fn init(&mut self, imgui: &mut imgui::Context) -> Result<(), Box<dyn std::error::Error>> {
        imgui.style_mut().window_rounding = 0.0;
        Ok(())
    }

    fn before_close(&mut self) -> bool {
        log::info!("Button was pressed {} times.", self.press_count);
        true
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut app = App::new()?;
    app.new_window(SampleWindow::new(), &|_| {
        Ok(Window::build_window("ImGui Sample", (960, 540)))
    })?;

    app.run()?;
    Ok(())
}
