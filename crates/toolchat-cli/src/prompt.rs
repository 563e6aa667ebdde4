use anyhow::Result;
use toolchat::events::Event;

pub mod rustyline;

pub trait Prompt {
    /// Draw one streamed event as it arrives
    fn render(&mut self, event: &Event);
    fn render_notice(&mut self, text: &str);
    fn render_error(&mut self, text: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("toolchat is running! Ask a question, or type /help for commands.");
        println!("\n");
    }
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

#[derive(Debug, PartialEq)]
pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Image,    // Attach an image to the next message
    Clear,    // Start the conversation over
    Help,
    Exit, // User wants to exit the session
}

impl Input {
    fn command(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }
}

pub const HELP: &str = "Commands:
/image <path|data-url> - Attach an image to your next message
/clear - Start a new conversation
/exit | /quit - Exit the session
/? | /help - Display this help message
Ctrl+C - Interrupt the reply in progress";

/// Interpret a line typed at the prompt
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::command(InputType::AskAgain);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => Input::command(InputType::Exit),
        "/clear" => Input::command(InputType::Clear),
        "/?" | "/help" => Input::command(InputType::Help),
        "/image" if rest.is_empty() => Input::command(InputType::Help),
        "/image" => Input {
            input_type: InputType::Image,
            content: Some(rest.to_string()),
        },
        _ => Input {
            input_type: InputType::Message,
            content: Some(line.to_string()),
        },
    }
}
