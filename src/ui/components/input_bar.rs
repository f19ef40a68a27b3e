use eframe::egui;

/// Returns `true` when the user asked to send a non-blank message.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, enabled: bool) -> bool {
    let mut send = false;
    ui.add_enabled_ui(enabled, |ui| {
        ui.horizontal(|ui| {
            let width = (ui.available_width() - 70.0).max(80.0);
            let response = ui.add(
                egui::TextEdit::singleline(input_text)
                    .hint_text("Message...")
                    .desired_width(width),
            );
            if ui.button("Send").clicked() {
                send = true;
            }

            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                send = true;
                response.request_focus();
            }
        });
    });

    send && !input_text.trim().is_empty()
}
