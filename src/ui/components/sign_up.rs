use eframe::egui;

use crate::common::ChatCommand;
use crate::ui::forms::SignUpForm;

pub enum SignUpAction {
    Submit(ChatCommand),
    ShowSignIn,
}

pub fn render(ui: &mut egui::Ui, form: &mut SignUpForm) -> Option<SignUpAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        ui.add_space(60.0);
        ui.heading("Create account");
        ui.add_space(12.0);

        ui.add(egui::TextEdit::singleline(&mut form.name).hint_text("Name"));
        ui.add(egui::TextEdit::singleline(&mut form.email).hint_text("Email"));
        ui.add(
            egui::TextEdit::singleline(&mut form.password)
                .hint_text("Password")
                .password(true),
        );
        let confirm = ui.add(
            egui::TextEdit::singleline(&mut form.confirm_password)
                .hint_text("Confirm password")
                .password(true),
        );

        if let Some(error) = &form.error {
            ui.colored_label(egui::Color32::RED, error);
        }

        ui.add_space(8.0);
        let label = if form.submitting { "Creating account..." } else { "Sign Up" };
        let clicked = ui
            .add_enabled(!form.submitting, egui::Button::new(label))
            .clicked();
        let entered = confirm.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        if (clicked || entered) && !form.submitting {
            action = form.submit().map(SignUpAction::Submit);
        }

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.label("Already have an account?");
            if ui.link("Sign in").clicked() {
                action = Some(SignUpAction::ShowSignIn);
            }
        });
    });

    action
}
