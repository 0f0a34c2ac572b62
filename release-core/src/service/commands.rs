//! Command grammar of the key release namespace.
//!
//! The routed command keyword picks the operation; numeric arguments come from
//! the frame parameters, in order, as unsigned decimals.

use core::fmt;

use winnow::Parser;
use winnow::ascii::dec_uint;
use winnow::error::ContextError;

/// Parsed key release command. Indices are zero based.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyCommand<'a> {
    Actuators,
    Arm(usize),
    Hold(usize),
    Start(usize, u32),
    Add(usize, u32),
    Available(usize),
    Remaining(usize),
    Running(usize),
    Status(usize),
    Release(usize, Option<&'a str>),
}

impl KeyCommand<'_> {
    /// Target actuator, if the command addresses one.
    pub const fn index(&self) -> Option<usize> {
        match *self {
            KeyCommand::Actuators => None,
            KeyCommand::Arm(index)
            | KeyCommand::Hold(index)
            | KeyCommand::Start(index, _)
            | KeyCommand::Add(index, _)
            | KeyCommand::Available(index)
            | KeyCommand::Remaining(index)
            | KeyCommand::Running(index)
            | KeyCommand::Status(index)
            | KeyCommand::Release(index, _) => Some(index),
        }
    }

    /// Whether the command mutates timers and must run with the tick paused.
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            KeyCommand::Arm(_)
                | KeyCommand::Hold(_)
                | KeyCommand::Start(..)
                | KeyCommand::Add(..)
                | KeyCommand::Release(..)
        )
    }
}

/// Reasons a command could not be parsed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Keyword not part of this namespace.
    Unknown,
    /// Parameter at this position is absent.
    MissingParameter(u8),
    /// Parameter at this position is not an unsigned decimal.
    InvalidParameter(u8),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown => f.write_str("unknown command"),
            CommandError::MissingParameter(position) => {
                write!(f, "missing parameter #{position}")
            }
            CommandError::InvalidParameter(position) => {
                write!(f, "invalid parameter #{position}")
            }
        }
    }
}

/// Parses `keyword` with its `parameters`.
pub fn parse<'a>(keyword: &str, parameters: &[&'a str]) -> Result<KeyCommand<'a>, CommandError> {
    let command = match keyword {
        "actuators" => KeyCommand::Actuators,
        "arm" => KeyCommand::Arm(index(parameters)?),
        "hold" => KeyCommand::Hold(index(parameters)?),
        "start" => KeyCommand::Start(index(parameters)?, number(parameters, 1)?),
        "add" => KeyCommand::Add(index(parameters)?, number(parameters, 1)?),
        "available" => KeyCommand::Available(index(parameters)?),
        "remaining" => KeyCommand::Remaining(index(parameters)?),
        "running" => KeyCommand::Running(index(parameters)?),
        "status" => KeyCommand::Status(index(parameters)?),
        "release" => KeyCommand::Release(index(parameters)?, parameters.get(1).copied()),
        _ => return Err(CommandError::Unknown),
    };
    Ok(command)
}

fn index(parameters: &[&str]) -> Result<usize, CommandError> {
    let text = parameters.first().ok_or(CommandError::MissingParameter(0))?;
    dec_uint::<&str, usize, ContextError>
        .parse(*text)
        .map_err(|_| CommandError::InvalidParameter(0))
}

fn number(parameters: &[&str], position: u8) -> Result<u32, CommandError> {
    let text = parameters
        .get(usize::from(position))
        .ok_or(CommandError::MissingParameter(position))?;
    dec_uint::<&str, u32, ContextError>
        .parse(*text)
        .map_err(|_| CommandError::InvalidParameter(position))
}
