//! Length-prefixed command frames exchanged over the datagram transport.
//!
//! Every frame carries a command string, an ordered list of parameter strings
//! and an optional binary payload:
//!
//! ```text
//! [u16 BE text_part_size]
//! [u8     parameter_count]
//! [command bytes][0x00]
//! { [parameter bytes][0x00] } x parameter_count
//! [u16 BE binary_size]
//! [binary_size bytes]
//! ```
//!
//! `text_part_size` counts the bytes from the parameter-count byte through the
//! last parameter terminator. Decoding validates that count against what was
//! actually walked, so truncated or padded text sections never decode.
//! [`Message`] is a zero-copy view into the received buffer.

use core::fmt;
use core::str;

use heapless::Vec;
use winnow::binary::{be_u16, u8 as byte};
use winnow::combinator::terminated;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{one_of, take, take_till};

/// Upper bound on parameters carried by a single frame.
pub const MAX_PARAMETERS: usize = 8;

/// Largest frame produced or accepted by the transports.
pub const MAX_FRAME_LEN: usize = 512;

/// Size of each big-endian length field.
const SIZE_FIELD_LEN: usize = 2;

const TERMINATOR: u8 = 0x00;

/// Ordered parameter list borrowed from a frame.
pub type Parameters<'a> = Vec<&'a str, MAX_PARAMETERS>;

/// Owned buffer holding an encoded frame.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// Reasons a received frame is discarded.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The buffer ends before the header fields are complete.
    Truncated,
    /// A command or parameter is missing its zero terminator.
    Unterminated,
    /// The declared text size disagrees with the bytes walked.
    LengthMismatch { declared: u16, actual: usize },
    /// The frame announces more parameters than [`MAX_PARAMETERS`].
    ///
    /// Frames are decoded into a fixed list of at most [`MAX_PARAMETERS`]
    /// entries, so a larger count is refused before any parameter is read
    /// and the frame is dropped without a reply.
    TooManyParameters(u8),
    /// A command or parameter is not valid UTF-8.
    InvalidUtf8,
    /// The binary section is shorter than its declared size.
    InsufficientPayload { declared: u16, available: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => f.write_str("frame truncated"),
            DecodeError::Unterminated => f.write_str("unterminated text field"),
            DecodeError::LengthMismatch { declared, actual } => {
                write!(f, "text size mismatch (declared {declared}, walked {actual})")
            }
            DecodeError::TooManyParameters(count) => {
                write!(f, "{count} parameters exceed limit of {MAX_PARAMETERS}")
            }
            DecodeError::InvalidUtf8 => f.write_str("text field is not UTF-8"),
            DecodeError::InsufficientPayload {
                declared,
                available,
            } => write!(
                f,
                "binary payload short (declared {declared}, available {available})"
            ),
        }
    }
}

/// Reasons a message cannot be turned into a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The output buffer cannot hold the encoded frame.
    BufferTooSmall { required: usize, available: usize },
    /// The text section does not fit its 16-bit size field.
    TextTooLong,
    /// The binary payload does not fit its 16-bit size field.
    PayloadTooLong,
    /// A command or parameter contains the terminator byte.
    EmbeddedTerminator,
    /// More than [`MAX_PARAMETERS`] parameters were supplied.
    TooManyParameters,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BufferTooSmall {
                required,
                available,
            } => write!(f, "frame needs {required} bytes, buffer has {available}"),
            EncodeError::TextTooLong => f.write_str("text section exceeds 65535 bytes"),
            EncodeError::PayloadTooLong => f.write_str("binary payload exceeds 65535 bytes"),
            EncodeError::EmbeddedTerminator => f.write_str("text field contains NUL"),
            EncodeError::TooManyParameters => {
                write!(f, "more than {MAX_PARAMETERS} parameters")
            }
        }
    }
}

/// Decoded view over a command frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<'a> {
    pub command: &'a str,
    pub parameters: Parameters<'a>,
    pub binary: &'a [u8],
}

impl<'a> Message<'a> {
    /// Creates a message without parameters or payload.
    pub const fn new(command: &'a str) -> Self {
        Self {
            command,
            parameters: Vec::new(),
            binary: &[],
        }
    }

    /// Creates a message carrying the given parameters.
    pub fn with_parameters(command: &'a str, parameters: &[&'a str]) -> Result<Self, EncodeError> {
        let parameters =
            Vec::from_slice(parameters).map_err(|_| EncodeError::TooManyParameters)?;
        Ok(Self {
            command,
            parameters,
            binary: &[],
        })
    }

    /// Attaches a binary payload.
    #[must_use]
    pub fn with_binary(mut self, binary: &'a [u8]) -> Self {
        self.binary = binary;
        self
    }

    /// Returns the parameter at `index`, if present.
    pub fn parameter(&self, index: usize) -> Option<&'a str> {
        self.parameters.get(index).copied()
    }

    /// Splits the command into `(service, command)` at the first space.
    pub fn route(&self) -> Route<'a> {
        Route::parse(self.command)
    }

    /// Number of bytes covered by the `text_part_size` field.
    pub fn text_len(&self) -> usize {
        1 + self.command.len()
            + 1
            + self
                .parameters
                .iter()
                .map(|parameter| parameter.len() + 1)
                .sum::<usize>()
    }

    /// Total number of bytes [`Message::encode`] writes.
    pub fn encoded_len(&self) -> usize {
        SIZE_FIELD_LEN + self.text_len() + SIZE_FIELD_LEN + self.binary.len()
    }

    /// Encodes the message into `out`, returning the number of bytes written.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        let text_len = u16::try_from(self.text_len()).map_err(|_| EncodeError::TextTooLong)?;
        let binary_len =
            u16::try_from(self.binary.len()).map_err(|_| EncodeError::PayloadTooLong)?;
        // Parameters are bounded by MAX_PARAMETERS, well under u8::MAX.
        let parameter_count =
            u8::try_from(self.parameters.len()).map_err(|_| EncodeError::TooManyParameters)?;

        let required = self.encoded_len();
        if out.len() < required {
            return Err(EncodeError::BufferTooSmall {
                required,
                available: out.len(),
            });
        }

        let mut writer = FrameWriter::new(out);
        writer.put(&text_len.to_be_bytes());
        writer.put(&[parameter_count]);
        writer.put_terminated(self.command)?;
        for parameter in &self.parameters {
            writer.put_terminated(parameter)?;
        }
        writer.put(&binary_len.to_be_bytes());
        writer.put(self.binary);
        Ok(writer.position)
    }

    /// Encodes the message into an owned [`Frame`].
    pub fn to_frame(&self) -> Result<Frame, EncodeError> {
        let mut frame = Frame::new();
        let required = self.encoded_len();
        frame
            .resize(required, 0)
            .map_err(|_| EncodeError::BufferTooSmall {
                required,
                available: MAX_FRAME_LEN,
            })?;
        let written = self.encode(&mut frame)?;
        frame.truncate(written);
        Ok(frame)
    }
}

/// Service-qualified command name (`"<service> <command>"`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Route<'a> {
    pub service: &'a str,
    pub command: &'a str,
}

impl<'a> Route<'a> {
    /// Splits at the first space; a name without a space has an empty command.
    pub fn parse(name: &'a str) -> Self {
        match name.split_once(' ') {
            Some((service, command)) => Self { service, command },
            None => Self {
                service: name,
                command: "",
            },
        }
    }
}

struct FrameWriter<'b> {
    out: &'b mut [u8],
    position: usize,
}

impl<'b> FrameWriter<'b> {
    fn new(out: &'b mut [u8]) -> Self {
        Self { out, position: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        self.out[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    fn put_terminated(&mut self, text: &str) -> Result<(), EncodeError> {
        if text.as_bytes().contains(&TERMINATOR) {
            return Err(EncodeError::EmbeddedTerminator);
        }
        self.put(text.as_bytes());
        self.put(&[TERMINATOR]);
        Ok(())
    }
}

type Input<'a> = &'a [u8];

fn size_field(input: &mut Input<'_>) -> Result<u16, ContextError> {
    be_u16(input)
}

fn count_field(input: &mut Input<'_>) -> Result<u8, ContextError> {
    byte(input)
}

fn terminated_bytes<'a>(input: &mut Input<'a>) -> Result<&'a [u8], ContextError> {
    terminated(take_till(0.., TERMINATOR), one_of(TERMINATOR)).parse_next(input)
}

fn payload<'a>(input: &mut Input<'a>, size: usize) -> Result<&'a [u8], ContextError> {
    take(size).parse_next(input)
}

fn terminated_text<'a>(input: &mut Input<'a>) -> Result<&'a str, DecodeError> {
    let bytes = terminated_bytes(input).map_err(|_| DecodeError::Unterminated)?;
    str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

/// Decodes a frame into a [`Message`] borrowing from `frame`.
pub fn decode(frame: &[u8]) -> Result<Message<'_>, DecodeError> {
    let mut input: Input<'_> = frame;

    let declared = size_field(&mut input).map_err(|_| DecodeError::Truncated)?;
    let text_start = input.len();

    let count = count_field(&mut input).map_err(|_| DecodeError::Truncated)?;
    if usize::from(count) > MAX_PARAMETERS {
        return Err(DecodeError::TooManyParameters(count));
    }

    let command = terminated_text(&mut input)?;
    let mut parameters = Parameters::new();
    for _ in 0..count {
        let parameter = terminated_text(&mut input)?;
        parameters
            .push(parameter)
            .map_err(|_| DecodeError::TooManyParameters(count))?;
    }

    let walked = text_start - input.len();
    if walked != usize::from(declared) {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: walked,
        });
    }

    let binary = match input.len() {
        0 => &[][..],
        1 => return Err(DecodeError::Truncated),
        _ => {
            let size = size_field(&mut input).map_err(|_| DecodeError::Truncated)?;
            let available = input.len();
            payload(&mut input, usize::from(size)).map_err(|_| {
                DecodeError::InsufficientPayload {
                    declared: size,
                    available,
                }
            })?
        }
    };

    Ok(Message {
        command,
        parameters,
        binary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(message: &Message<'_>) -> Frame {
        message.to_frame().expect("message should encode")
    }

    #[test]
    fn encodes_exact_layout() {
        let message = Message::with_parameters("keys start", &["0", "1800"])
            .expect("two parameters fit")
            .with_binary(&[0xAA, 0xBB]);
        let frame = encode_frame(&message);

        let text_len: u16 = 1 + 11 + 2 + 5;
        let mut expected: Vec<u8, 64> = Vec::new();
        expected.extend_from_slice(&text_len.to_be_bytes()).unwrap();
        expected.push(2).unwrap();
        expected.extend_from_slice(b"keys start\0").unwrap();
        expected.extend_from_slice(b"0\0").unwrap();
        expected.extend_from_slice(b"1800\0").unwrap();
        expected.extend_from_slice(&[0x00, 0x02, 0xAA, 0xBB]).unwrap();

        assert_eq!(frame.as_slice(), expected.as_slice());
    }

    #[test]
    fn decode_recovers_encoded_message() {
        let message = Message::with_parameters("keys add", &["1", "60"])
            .expect("parameters fit")
            .with_binary(b"blob");
        let frame = encode_frame(&message);

        assert_eq!(decode(&frame), Ok(message));
    }

    #[test]
    fn decode_accepts_frame_without_binary_size_field() {
        let frame = [0x00, 0x0A, 0x00, b'k', b'e', b'y', b's', b' ', b'a', b'r', b'm', 0x00];
        let message = decode(&frame).expect("frame should decode");
        assert_eq!(message.command, "keys arm");
        assert!(message.parameters.is_empty());
        assert!(message.binary.is_empty());
    }

    #[test]
    fn decode_rejects_declared_size_mismatch() {
        let mut frame = encode_frame(&Message::new("keys actuators"));
        frame[1] += 1;

        assert!(matches!(
            decode(&frame),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_short_binary_section() {
        let message = Message::new("keys actuators").with_binary(&[1, 2, 3, 4]);
        let frame = encode_frame(&message);
        let truncated = &frame[..frame.len() - 1];

        assert_eq!(
            decode(truncated),
            Err(DecodeError::InsufficientPayload {
                declared: 4,
                available: 3,
            })
        );
    }

    #[test]
    fn decode_rejects_missing_terminator() {
        let frame = [0x00, 0x05, 0x00, b'k', b'e', b'y', b's'];
        assert_eq!(decode(&frame), Err(DecodeError::Unterminated));
    }

    #[test]
    fn decode_rejects_lone_size_byte_after_text() {
        let mut frame = encode_frame(&Message::new("keys actuators"));
        frame.truncate(frame.len() - 1);
        assert_eq!(decode(&frame), Err(DecodeError::Truncated));
    }

    fn frame_with_parameters(count: u8) -> Vec<u8, 64> {
        let text_len = 1 + 2 + 2 * u16::from(count);
        let mut frame: Vec<u8, 64> = Vec::new();
        frame.extend_from_slice(&text_len.to_be_bytes()).unwrap();
        frame.push(count).unwrap();
        frame.extend_from_slice(b"k\0").unwrap();
        for _ in 0..count {
            frame.extend_from_slice(b"1\0").unwrap();
        }
        frame.extend_from_slice(&[0x00, 0x00]).unwrap();
        frame
    }

    #[test]
    fn decode_accepts_full_parameter_list() {
        let frame = frame_with_parameters(8);
        let message = decode(&frame).expect("eight parameters fit");
        assert_eq!(message.command, "k");
        assert_eq!(message.parameters.len(), MAX_PARAMETERS);
        assert!(message.parameters.iter().all(|parameter| *parameter == "1"));
        assert!(message.binary.is_empty());
    }

    #[test]
    fn decode_rejects_parameter_overflow() {
        let frame = frame_with_parameters(9);
        assert_eq!(decode(&frame), Err(DecodeError::TooManyParameters(9)));

        let short = [0x00, 0x03, 0x09, b'x', 0x00];
        assert_eq!(decode(&short), Err(DecodeError::TooManyParameters(9)));
    }

    #[test]
    fn encode_rejects_embedded_terminator() {
        let message = Message::with_parameters("keys arm", &["0\0"]).expect("fits");
        let mut out = [0u8; 32];
        assert_eq!(message.encode(&mut out), Err(EncodeError::EmbeddedTerminator));
    }

    #[test]
    fn encode_reports_small_buffer() {
        let message = Message::new("keys actuators");
        let mut out = [0u8; 4];
        assert_eq!(
            message.encode(&mut out),
            Err(EncodeError::BufferTooSmall {
                required: message.encoded_len(),
                available: 4,
            })
        );
    }

    #[test]
    fn route_splits_on_first_space() {
        assert_eq!(
            Route::parse("keys start now"),
            Route {
                service: "keys",
                command: "start now",
            }
        );
        assert_eq!(
            Route::parse("keys"),
            Route {
                service: "keys",
                command: "",
            }
        );
    }
}
