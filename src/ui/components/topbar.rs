use eframe::egui;

pub enum TopBarAction {
    Refresh,
    SignOut,
}

pub fn render(ui: &mut egui::Ui, user_name: &str, loading: bool) -> Option<TopBarAction> {
    let mut action = None;

    ui.horizontal(|ui| {
        ui.heading("Chats");
        if loading {
            ui.spinner();
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Sign out").clicked() {
                action = Some(TopBarAction::SignOut);
            }
            if ui.add_enabled(!loading, egui::Button::new("⟳")).clicked() {
                action = Some(TopBarAction::Refresh);
            }
            ui.label(egui::RichText::new(user_name).strong());
        });
    });

    action
}
