use anyhow::{bail, Result};
use toolchat::events::Event;
use toolchat::models::content::ImageContent;
use toolchat::reducer::ConversationState;

use crate::attachments::load_image;
use crate::client::ChatClient;
use crate::prompt::{InputType, Prompt};

pub struct Session<'a> {
    client: ChatClient,
    prompt: Box<dyn Prompt + 'a>,
    state: ConversationState,
    pending_images: Vec<ImageContent>,
}

impl<'a> Session<'a> {
    pub fn new(client: ChatClient, prompt: Box<dyn Prompt + 'a>) -> Self {
        Session {
            client,
            prompt,
            state: ConversationState::new(),
            pending_images: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.process_message(content).await;
                    }
                }
                InputType::Image => {
                    if let Some(spec) = input.content {
                        self.attach(&spec);
                    }
                }
                InputType::Clear => {
                    self.state.clear();
                    self.pending_images.clear();
                    self.prompt.render_notice("Started a new conversation.");
                }
                InputType::Exit => break,
                InputType::AskAgain | InputType::Help => continue,
            }
        }
        self.prompt.close();
        Ok(())
    }

    /// Send a single message, failing if the reply did not complete
    pub async fn headless_start(&mut self, text: String, images: Vec<ImageContent>) -> Result<()> {
        self.pending_images = images;
        self.process_message(text).await;
        self.prompt.close();

        if let Some(error) = self.state.messages().last().and_then(|m| m.error.as_ref()) {
            bail!("{}", error);
        }
        Ok(())
    }

    fn attach(&mut self, spec: &str) {
        match load_image(spec) {
            Ok(image) => {
                self.pending_images.push(image);
                let count = self.pending_images.len();
                self.prompt.render_notice(&format!(
                    "Attached {} image{} to your next message.",
                    count,
                    if count == 1 { "" } else { "s" }
                ));
            }
            Err(e) => self.prompt.render_error(&e.to_string()),
        }
    }

    async fn process_message(&mut self, text: String) {
        let images = std::mem::take(&mut self.pending_images);
        let Session {
            client,
            prompt,
            state,
            ..
        } = self;

        prompt.show_busy();
        let mut saw_error = false;
        let submit = client.submit(state, &text, images, |event, _| {
            saw_error |= matches!(event, Event::Error { .. });
            prompt.render(event);
        });
        let outcome = tokio::select! {
            result = submit => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Ok(())) => {
                // The stream closed without a proper ending
                if !saw_error {
                    if let Some(error) = state.messages().last().and_then(|m| m.error.as_ref()) {
                        prompt.render_error(error);
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "reply request failed");
                prompt.render_error(&e.to_string());
            }
            None => {
                state.finish();
                prompt.render_notice("Interrupted: the reply was stopped before it finished.");
            }
        }
        prompt.hide_busy();
    }
}
