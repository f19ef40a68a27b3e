use chrono::Local;
use eframe::egui;

use crate::common::Message;
use crate::ui::format::message_time;
use crate::ui::state::AppState;

const OWN_BUBBLE: egui::Color32 = egui::Color32::from_rgb(37, 99, 235);
const OTHER_BUBBLE: egui::Color32 = egui::Color32::from_rgb(229, 231, 235);

pub fn render_header(ui: &mut egui::Ui, state: &AppState) {
    let Some(entry) = state.active_entry() else {
        return;
    };
    let user_id = state.user_id();

    ui.horizontal(|ui| {
        ui.heading(entry.display_name(user_id));
        ui.label(egui::RichText::new(entry.counterpart_status(user_id)).weak());
    });
}

pub fn render(ui: &mut egui::Ui, state: &AppState) {
    if state.active.is_none() {
        ui.centered_and_justified(|ui| {
            ui.label(egui::RichText::new("Select a chat to start messaging").weak());
        });
        return;
    }

    if state.loading_messages {
        ui.centered_and_justified(|ui| {
            ui.label("Loading messages...");
        });
        return;
    }

    if state.messages.is_empty() {
        ui.centered_and_justified(|ui| {
            ui.label(egui::RichText::new("No messages yet. Start a conversation!").weak());
        });
        return;
    }

    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for message in &state.messages {
                bubble(ui, message, state.is_own(message));
            }
        });
}

fn bubble(ui: &mut egui::Ui, message: &Message, own: bool) {
    let body = match &message.text {
        Some(text) => text.clone(),
        None => format!("[{}]", message.kind.as_str()),
    };
    let (fill, color) = if own {
        (OWN_BUBBLE, egui::Color32::WHITE)
    } else {
        (OTHER_BUBBLE, egui::Color32::BLACK)
    };
    let layout = if own {
        egui::Layout::right_to_left(egui::Align::TOP)
    } else {
        egui::Layout::left_to_right(egui::Align::TOP)
    };

    ui.with_layout(layout, |ui| {
        ui.label(
            egui::RichText::new(format!(" {body} "))
                .color(color)
                .background_color(fill),
        );
        ui.label(
            egui::RichText::new(message_time(message.created_at, &Local))
                .small()
                .weak(),
        );
    });
    ui.add_space(2.0);
}
