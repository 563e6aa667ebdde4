use std::io::{self, Write};

use anyhow::Result;
use cliclack::spinner;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use toolchat::events::{Delta, Event};
use toolchat::models::tool::ToolOutput;

use super::{parse_input, Input, InputType, Prompt, HELP};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m( ?)> \x1b[0m";
const MAX_STRING_LENGTH: usize = 40;
const INDENT: &str = "    ";

pub struct RustylinePrompt {
    editor: DefaultEditor,
    spinner: cliclack::ProgressBar,
    busy: bool,
    /// Whether the cursor sits after streamed text on an unterminated line
    mid_line: bool,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            editor: DefaultEditor::new()?,
            spinner: spinner(),
            busy: false,
            mid_line: false,
        })
    }

    fn start_spinner(&mut self, message: &str) {
        self.hide_busy();
        self.spinner = spinner();
        self.spinner.start(message);
        self.busy = true;
    }

    fn end_line(&mut self) {
        if self.mid_line {
            print_newline();
            self.mid_line = false;
        }
    }
}

fn print_tool_header(name: &str) {
    // Namespaced tools read as "<system>__<tool>"
    let header = match name.split_once("__") {
        Some((system, tool)) => format!(
            "─── {} | {} ──────────────────────────",
            style(tool),
            style(system).magenta().dim(),
        ),
        None => format!("─── {} ──────────────────────────", style(name)),
    };
    print_newline();
    println!("{}", header);
}

fn print_tool_result(result: &ToolOutput) {
    match result {
        ToolOutput::Success(value) => {
            println!("{}", style("✓ done").green());
            print_params(value, 1);
        }
        ToolOutput::Failure(error) => {
            println!("{} {}", style("✗ failed:").red(), error);
        }
        ToolOutput::Unavailable(reason) => {
            println!("{} {}", style("! unavailable:").yellow(), reason);
        }
    }
}

/// Format and print parameters recursively with proper indentation and colors
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) => {
                        println!("{}{}:", indent, style(key).dim());
                        print_params(val, depth + 1);
                    }
                    Value::Array(arr) => {
                        println!("{}{}:", indent, style(key).dim());
                        for item in arr.iter() {
                            println!("{}{}- ", indent, INDENT);
                            print_params(item, depth + 2);
                        }
                    }
                    Value::String(s) => {
                        if s.chars().count() > MAX_STRING_LENGTH {
                            println!("{}{}: {}", indent, style(key).dim(), style("...").dim());
                        } else {
                            println!("{}{}: {}", indent, style(key).dim(), style(s).green());
                        }
                    }
                    Value::Number(n) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(n).blue());
                    }
                    Value::Bool(b) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(b).blue());
                    }
                    Value::Null => {
                        println!("{}{}: {}", indent, style(key).dim(), style("null").dim());
                    }
                }
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{}{}.", indent, i + 1);
                print_params(item, depth + 1);
            }
        }
        Value::String(s) => {
            if s.chars().count() > MAX_STRING_LENGTH {
                println!(
                    "{}{}",
                    indent,
                    style(format!("[{} chars]", s.chars().count())).yellow()
                );
            } else {
                println!("{}{}", indent, style(s).green());
            }
        }
        Value::Number(n) => {
            println!("{}{}", indent, style(n).yellow());
        }
        Value::Bool(b) => {
            println!("{}{}", indent, style(b).yellow());
        }
        Value::Null => {
            println!("{}{}", indent, style("null").dim());
        }
    }
}

fn print_newline() {
    println!();
}

fn flush() {
    if let Err(e) = io::stdout().flush() {
        tracing::debug!(error = %e, "failed to flush stdout");
    }
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, event: &Event) {
        match event {
            Event::MessageStart { .. } => self.hide_busy(),
            Event::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => {
                self.hide_busy();
                print!("{}", text);
                self.mid_line = !text.ends_with('\n');
                flush();
            }
            Event::ToolUse { tool_use } => {
                self.hide_busy();
                self.end_line();
                print_tool_header(&tool_use.name);
                print_params(&tool_use.input, 0);
                self.start_spinner(&format!("running {}", tool_use.name));
            }
            Event::ToolResult { result, .. } => {
                self.hide_busy();
                print_tool_result(result);
                print_newline();
                self.start_spinner("thinking...");
            }
            Event::MessageStop => {
                self.hide_busy();
                self.end_line();
            }
            Event::Error { error } => {
                self.render_error(&error.message);
            }
        }
    }

    fn render_notice(&mut self, text: &str) {
        self.hide_busy();
        self.end_line();
        println!("{}", style(text).dim());
    }

    fn render_error(&mut self, text: &str) {
        self.hide_busy();
        self.end_line();
        println!("{}", style(format!("Error: {}", text)).red());
    }

    fn show_busy(&mut self) {
        self.start_spinner("thinking...");
    }

    fn hide_busy(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let line = match self.editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                });
            }
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            self.editor.add_history_entry(line.trim())?;
        }

        let input = parse_input(&line);
        if input.input_type == InputType::Help {
            println!("{}", HELP);
            return Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            });
        }
        Ok(input)
    }

    fn close(&self) {
        // No cleanup required
    }
}
