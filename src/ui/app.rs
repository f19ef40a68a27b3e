use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent};

use super::components::sign_in::SignInAction;
use super::components::sign_up::SignUpAction;
use super::components::topbar::TopBarAction;
use super::components::{chat_area, input_bar, sidebar, sign_in, sign_up, topbar};
use super::state::{AppState, Screen};

const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        Self {
            state: AppState::new(),
            command_sender,
            event_receiver,
        }
    }

    fn handle_chat_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply(event);
        }
    }

    fn send_command(&self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to chat worker: {err}");
        }
    }

    fn show_main(&mut self, ctx: &egui::Context) {
        let user_name = self
            .state
            .user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_default();

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            match topbar::render(ui, &user_name, self.state.loading_conversations) {
                Some(TopBarAction::Refresh) => self.send_command(ChatCommand::RefreshConversations),
                Some(TopBarAction::SignOut) => self.send_command(ChatCommand::SignOut),
                None => {}
            }
        });

        egui::SidePanel::left("conversation_sidebar")
            .default_width(280.0)
            .show(ctx, |ui| {
                if let Some(key) = sidebar::render(ui, &mut self.state) {
                    self.send_command(ChatCommand::SelectConversation(Some(key)));
                }
            });

        if self.state.active.is_some() {
            egui::TopBottomPanel::bottom("input_bar").show(ctx, |ui| {
                if let Some(error) = &self.state.last_error {
                    ui.colored_label(egui::Color32::RED, error);
                }
                if input_bar::render(ui, &mut self.state.input_text, true)
                    && let Some(text) = self.state.take_input()
                {
                    self.send_command(ChatCommand::SendMessage { text });
                }
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            chat_area::render_header(ui, &self.state);
            ui.separator();
            chat_area::render(ui, &self.state);
        });
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_chat_events();

        match self.state.screen {
            Screen::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.spinner();
                    });
                });
            }
            Screen::SignIn => {
                let mut action = None;
                egui::CentralPanel::default().show(ctx, |ui| {
                    action = sign_in::render(ui, &mut self.state.sign_in, self.state.notice.as_deref());
                });
                match action {
                    Some(SignInAction::Submit(command)) => self.send_command(command),
                    Some(SignInAction::ShowSignUp) => self.state.show_sign_up(),
                    None => {}
                }
            }
            Screen::SignUp => {
                let mut action = None;
                egui::CentralPanel::default().show(ctx, |ui| {
                    action = sign_up::render(ui, &mut self.state.sign_up);
                });
                match action {
                    Some(SignUpAction::Submit(command)) => self.send_command(command),
                    Some(SignUpAction::ShowSignIn) => self.state.show_sign_in(),
                    None => {}
                }
            }
            Screen::Main => self.show_main(ctx),
        }

        // Events arrive from the worker without user input.
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
