use chrono::Local;
use eframe::egui;

use crate::common::{ConversationEntry, ConversationKey};
use crate::ui::format::{avatar_rgb, initial, last_message_label};
use crate::ui::state::AppState;

/// Draws the search box and conversation list; returns the clicked entry.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) -> Option<ConversationKey> {
    ui.add(
        egui::TextEdit::singleline(&mut state.search)
            .hint_text("Search")
            .desired_width(f32::INFINITY),
    );
    ui.separator();

    if state.loading_conversations && state.conversations.is_empty() {
        ui.spinner();
        return None;
    }

    let mut clicked = None;
    let user_id = state.user_id().to_string();
    let now = Local::now();

    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            let mut any = false;
            for entry in state.visible_conversations() {
                any = true;
                let selected = state.active.as_ref() == Some(&entry.key);
                if row(ui, entry, &user_id, selected, &now) {
                    clicked = Some(entry.key.clone());
                }
            }

            if !any {
                ui.label(egui::RichText::new("No conversations found").weak());
            }
        });

    clicked
}

fn row(
    ui: &mut egui::Ui,
    entry: &ConversationEntry,
    user_id: &str,
    selected: bool,
    now: &chrono::DateTime<Local>,
) -> bool {
    let name = entry.display_name(user_id);
    let [r, g, b] = avatar_rgb(&name);
    let mut clicked = false;

    ui.horizontal(|ui| {
        // Avatar
        ui.label(
            egui::RichText::new(format!(" {} ", initial(&name)))
                .strong()
                .color(egui::Color32::WHITE)
                .background_color(egui::Color32::from_rgb(r, g, b)),
        );

        ui.vertical(|ui| {
            ui.horizontal(|ui| {
                clicked = ui
                    .selectable_label(selected, egui::RichText::new(&name).strong())
                    .clicked();

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(message) = &entry.last_message {
                        ui.label(
                            egui::RichText::new(last_message_label(message.created_at, now))
                                .small()
                                .weak(),
                        );
                    }
                });
            });

            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(entry.last_message_preview()).weak());
                if entry.unread_count > 0 {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            egui::RichText::new(format!(" {} ", entry.unread_count))
                                .small()
                                .color(egui::Color32::WHITE)
                                .background_color(egui::Color32::from_rgb(37, 99, 235)),
                        );
                    });
                }
            });
        });
    });
    ui.add_space(4.0);

    clicked
}
