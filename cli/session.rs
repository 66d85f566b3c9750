//! Interactive session: a line-oriented stand-in for the two input forms.
//!
//! The input values live in a `SessionState` owned by the loop and handed to
//! every command, so "clear" only ever touches the current session.

use crate::render::{render_error, render_raw, render_reconstructed};
use cardguard::config::InputDefaults;
use cardguard::error::PredictionError;
use cardguard::input::{InputError, validate_amount, validate_hour};
use cardguard::variant::{RawVariant, ReconstructedVariant};
use std::io::{self, BufRead, Write};

const HELP: &str = "\
Commands:
  hour <0-23>        set the transaction hour
  amount <value>     set the transaction amount
  predict            score the current hour and amount
  raw <v1,...,v29>   score 29 comma-separated values directly
  clear              reset every input to its default
  show               print the current inputs
  help               print this message
  quit               leave the session";

/// The values currently entered in the two forms.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    defaults: InputDefaults,
    pub hour: u32,
    pub amount: f64,
    pub raw_text: String,
}

impl SessionState {
    pub fn new(defaults: InputDefaults) -> Self {
        Self {
            defaults,
            hour: defaults.hour,
            amount: defaults.amount,
            raw_text: String::new(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.defaults);
    }
}

/// Pipelines available to the session. A variant that failed to initialize
/// keeps its error so each request against it can report why.
pub struct SessionHandles {
    pub reconstructed: Result<ReconstructedVariant, PredictionError>,
    pub raw: Result<RawVariant, PredictionError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Hour(u32),
    Amount(f64),
    Predict,
    Raw(String),
    Clear,
    Show,
    Help,
    Quit,
    Empty,
}

pub enum Outcome {
    Reply(String),
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "hour" => Command::Hour(rest.parse().map_err(|_| InputError::Malformed {
            what: "hour",
            token: rest.to_string(),
        })?),
        "amount" => Command::Amount(rest.parse().map_err(|_| InputError::Malformed {
            what: "amount",
            token: rest.to_string(),
        })?),
        "predict" => Command::Predict,
        "raw" => Command::Raw(rest.to_string()),
        "clear" => Command::Clear,
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => {
            return Err(InputError::Malformed {
                what: "command (type 'help')",
                token: word.to_string(),
            });
        }
    };
    Ok(command)
}

pub fn handle(state: &mut SessionState, command: Command, handles: &SessionHandles) -> Outcome {
    let reply = match command {
        Command::Empty => String::new(),
        Command::Hour(hour) => match validate_hour(hour) {
            Ok(hour) => {
                state.hour = hour;
                format!("Hour set to {hour}")
            }
            Err(err) => render_error(&PredictionError::from(err)),
        },
        Command::Amount(amount) => match validate_amount(amount) {
            Ok(amount) => {
                state.amount = amount;
                format!("Amount set to {amount:.2}")
            }
            Err(err) => render_error(&PredictionError::from(err)),
        },
        Command::Predict => match &handles.reconstructed {
            Ok(variant) => match variant.predict(state.hour, state.amount) {
                Ok(result) => render_reconstructed(&result),
                Err(err) => render_error(&err),
            },
            Err(err) => render_error(err),
        },
        Command::Raw(text) => {
            state.raw_text = text;
            match &handles.raw {
                Ok(variant) => match variant.predict(&state.raw_text) {
                    Ok(result) => render_raw(&result),
                    Err(err) => render_error(&err),
                },
                Err(err) => render_error(err),
            }
        }
        Command::Clear => {
            state.clear();
            "Inputs reset to defaults".to_string()
        }
        Command::Show => format!(
            "hour = {}\namount = {:.2}\nraw = {}",
            state.hour,
            state.amount,
            if state.raw_text.is_empty() {
                "(empty)"
            } else {
                state.raw_text.as_str()
            }
        ),
        Command::Help => HELP.to_string(),
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Reply(reply)
}

/// Reads commands from `input` until EOF or "quit", writing every reply to `output`.
pub fn run<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    state: &mut SessionState,
    handles: &SessionHandles,
) -> io::Result<()> {
    writeln!(output, "💳 Credit Card Fraud Detection (type 'help' for commands)")?;
    for line in input.lines() {
        let line = line?;
        let reply = match parse_command(&line) {
            Ok(command) => match handle(state, command, handles) {
                Outcome::Reply(reply) => reply,
                Outcome::Quit => break,
            },
            Err(err) => render_error(&PredictionError::from(err)),
        };
        if !reply.is_empty() {
            writeln!(output, "{reply}")?;
        }
        output.flush()?;
    }
    Ok(())
}
