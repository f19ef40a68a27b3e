use eframe::egui;

use crate::common::ChatCommand;
use crate::ui::forms::SignInForm;

pub enum SignInAction {
    Submit(ChatCommand),
    ShowSignUp,
}

pub fn render(ui: &mut egui::Ui, form: &mut SignInForm, notice: Option<&str>) -> Option<SignInAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        ui.add_space(60.0);
        ui.heading("Sign in");
        ui.add_space(12.0);

        if let Some(notice) = notice {
            ui.colored_label(egui::Color32::LIGHT_BLUE, notice);
            ui.add_space(8.0);
        }

        ui.add(egui::TextEdit::singleline(&mut form.email).hint_text("Email"));
        let password = ui.add(
            egui::TextEdit::singleline(&mut form.password)
                .hint_text("Password")
                .password(true),
        );

        if let Some(error) = &form.error {
            ui.colored_label(egui::Color32::RED, error);
        }

        ui.add_space(8.0);
        let label = if form.submitting { "Signing in..." } else { "Sign In" };
        let clicked = ui
            .add_enabled(!form.submitting, egui::Button::new(label))
            .clicked();
        let entered = password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        if (clicked || entered) && !form.submitting {
            action = form.submit().map(SignInAction::Submit);
        }

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.label("Don't have an account?");
            if ui.link("Sign up").clicked() {
                action = Some(SignInAction::ShowSignUp);
            }
        });
    });

    action
}
