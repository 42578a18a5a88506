use std::fmt::{self, Debug, Formatter};

use thiserror::Error;

use crate::crc::crc8;

/// Sync bytes at the start of every frame.
pub const SOF: [u8; 2] = [0x51, 0x78];

/// Terminator at the end of every frame.
pub const EOF: u8 = 0xff;

/// Bytes before the payload: sync, command, reserved, length, reserved.
pub const HEADER_LEN: usize = 6;

/// Bytes after the payload: checksum and terminator.
pub const TRAILER_LEN: usize = 2;

/// The length field is a single byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
	#[error("payload of {0} bytes does not fit in a frame (max {max})", max = MAX_PAYLOAD)]
	InvalidPayloadSize(usize),

	#[error("truncated frame: need {needed} bytes, have {available}")]
	Truncated { needed: usize, available: usize },

	#[error("bad sync bytes: {0:02x?}")]
	BadSync([u8; 2]),

	#[error("unknown command: {0:#04x}")]
	UnknownCommand(u8),

	#[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
	ChecksumMismatch { expected: u8, actual: u8 },

	#[error("bad terminator: {0:#04x}")]
	BadTerminator(u8),

	#[error("reserved byte at offset {offset} is {value:#04x}, expected 0x00")]
	BadReserved { offset: usize, value: u8 },
}

/// Commands understood by the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
	/// Move the paper back by `payload[0]` steps.
	RetractPaper = 0xa0,

	/// Move the paper forward by `payload[0]` steps.
	FeedPaper = 0xa1,

	/// Draw one row of packed pixels, see [`crate::bitmap`].
	DrawBitmap = 0xa2,

	/// `1` for text, `0` for images, see [`crate::DrawingMode`].
	DrawingMode = 0xbe,

	/// Print head energy, `1..=255`.
	SetEnergy = 0xaf,

	/// Print quality, `1..=5`.
	SetQuality = 0xa4,
}

impl Command {
	pub fn code(self) -> u8 {
		self as u8
	}
}

impl TryFrom<u8> for Command {
	type Error = FrameError;

	fn try_from(code: u8) -> Result<Self, FrameError> {
		Ok(match code {
			0xa0 => Self::RetractPaper,
			0xa1 => Self::FeedPaper,
			0xa2 => Self::DrawBitmap,
			0xbe => Self::DrawingMode,
			0xaf => Self::SetEnergy,
			0xa4 => Self::SetQuality,
			_ => return Err(FrameError::UnknownCommand(code)),
		})
	}
}

/// A single message on the wire.
///
/// # Layout
/// | Offset         | Field                      |
/// |----------------|----------------------------|
/// | 0..2           | `0x51 0x78`                |
/// | 2              | command                    |
/// | 3              | `0x00`                     |
/// | 4              | payload length             |
/// | 5              | `0x00`                     |
/// | 6..6+len       | payload                    |
/// | 6+len          | CRC-8 of the payload only  |
/// | 6+len+1        | `0xff`                     |
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
	command: Command,
	bytes: Vec<u8>,
}

impl Frame {
	/// Build the frame for `command` carrying `payload`.
	///
	/// Payloads longer than [`MAX_PAYLOAD`] are rejected, never truncated.
	pub fn encode(command: Command, payload: &[u8]) -> Result<Self, FrameError> {
		let len = payload.len();
		if len > MAX_PAYLOAD {
			return Err(FrameError::InvalidPayloadSize(len));
		}

		let mut bytes = Vec::with_capacity(HEADER_LEN + len + TRAILER_LEN);
		bytes.extend_from_slice(&SOF);
		bytes.extend_from_slice(&[command.code(), 0x00, len as u8, 0x00]);
		bytes.extend_from_slice(payload);
		bytes.push(crc8(payload));
		bytes.push(EOF);
		Ok(Self { command, bytes })
	}

	/// Parse one frame from the start of `buf`.
	///
	/// # Return value
	/// The frame and the number of bytes it occupied in `buf`.
	pub fn decode(buf: &[u8]) -> Result<(Self, usize), FrameError> {
		if buf.len() < HEADER_LEN {
			return Err(FrameError::Truncated { needed: HEADER_LEN, available: buf.len() });
		}

		if buf[0..2] != SOF {
			return Err(FrameError::BadSync([buf[0], buf[1]]));
		}
		let command = Command::try_from(buf[2])?;
		for offset in [3, 5] {
			if buf[offset] != 0x00 {
				return Err(FrameError::BadReserved { offset, value: buf[offset] });
			}
		}

		let len = buf[4] as usize;
		let total = HEADER_LEN + len + TRAILER_LEN;
		if buf.len() < total {
			return Err(FrameError::Truncated { needed: total, available: buf.len() });
		}

		let payload = &buf[HEADER_LEN..HEADER_LEN + len];
		let expected = crc8(payload);
		let actual = buf[HEADER_LEN + len];
		if expected != actual {
			return Err(FrameError::ChecksumMismatch { expected, actual });
		}

		let eof = buf[total - 1];
		if eof != EOF {
			return Err(FrameError::BadTerminator(eof));
		}

		Ok((Self { command, bytes: buf[..total].to_vec() }, total))
	}

	pub fn command(&self) -> Command {
		self.command
	}

	pub fn payload(&self) -> &[u8] {
		&self.bytes[HEADER_LEN..self.bytes.len() - TRAILER_LEN]
	}

	pub fn checksum(&self) -> u8 {
		self.bytes[self.bytes.len() - TRAILER_LEN]
	}

	/// Total size on the wire, `6 + payload + 2`.
	pub fn wire_len(&self) -> usize {
		self.bytes.len()
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}
}

impl AsRef<[u8]> for Frame {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

impl Debug for Frame {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f
			.debug_struct("Frame")
			.field("command", &self.command())
			.field("payload", &format_args!("{:02x?}", self.payload()))
			.field("checksum", &format_args!("{:#04x}", self.checksum()))
			.finish()
	}
}

/// Split a captured byte stream into frames.
pub fn decode_all(mut buf: &[u8]) -> Result<Vec<Frame>, FrameError> {
	let mut frames = Vec::new();
	while !buf.is_empty() {
		let (frame, n) = Frame::decode(buf)?;
		frames.push(frame);
		buf = &buf[n..];
	}
	Ok(frames)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn layout() {
		let payload = [0x01, 0x02, 0x03];
		let frame = Frame::encode(Command::DrawBitmap, &payload).unwrap();
		assert_eq!(frame.wire_len(), 6 + 3 + 2);
		assert_eq!(&frame.as_bytes()[..6], &[0x51, 0x78, 0xa2, 0x00, 0x03, 0x00]);
		assert_eq!(frame.payload(), &payload);
		assert_eq!(&frame.as_bytes()[9..], &[crc8(&payload), 0xff]);
	}

	#[test]
	fn feed_frame_bytes() {
		let frame = Frame::encode(Command::FeedPaper, &[0x50]).unwrap();
		assert_eq!(frame.into_bytes(), vec![0x51, 0x78, 0xa1, 0x00, 0x01, 0x00, 0x50, 0xb7, 0xff]);
	}

	#[test]
	fn empty_payload() {
		let frame = Frame::encode(Command::RetractPaper, &[]).unwrap();
		assert_eq!(frame.as_bytes(), &[0x51, 0x78, 0xa0, 0x00, 0x00, 0x00, 0x00, 0xff]);
	}

	#[test]
	fn payload_limit() {
		let max = vec![0xaa; MAX_PAYLOAD];
		let frame = Frame::encode(Command::DrawBitmap, &max).unwrap();
		assert_eq!(frame.wire_len(), 6 + 255 + 2);
		assert_eq!(frame.as_bytes()[4], 0xff);

		let too_long = vec![0xaa; MAX_PAYLOAD + 1];
		assert_eq!(
			Frame::encode(Command::DrawBitmap, &too_long),
			Err(FrameError::InvalidPayloadSize(256)),
		);
	}

	#[test]
	fn error_messages() {
		assert_eq!(
			FrameError::InvalidPayloadSize(300).to_string(),
			"payload of 300 bytes does not fit in a frame (max 255)",
		);
		assert_eq!(
			FrameError::BadReserved { offset: 3, value: 1 }.to_string(),
			"reserved byte at offset 3 is 0x01, expected 0x00",
		);
	}

	#[test]
	fn command_codes() {
		for (cmd, code) in [
			(Command::RetractPaper, 0xa0),
			(Command::FeedPaper, 0xa1),
			(Command::DrawBitmap, 0xa2),
			(Command::DrawingMode, 0xbe),
			(Command::SetEnergy, 0xaf),
			(Command::SetQuality, 0xa4),
		] {
			assert_eq!(cmd.code(), code);
			assert_eq!(Command::try_from(code), Ok(cmd));
		}
		assert_eq!(Command::try_from(0x00), Err(FrameError::UnknownCommand(0x00)));
	}

	#[test]
	fn decode_mirrors_encode() {
		let frame = Frame::encode(Command::SetQuality, &[0x03]).unwrap();
		let mut buf = frame.as_bytes().to_vec();
		buf.extend_from_slice(&[0x51]);

		let (decoded, n) = Frame::decode(&buf).unwrap();
		assert_eq!(n, frame.wire_len());
		assert_eq!(decoded, frame);
		assert_eq!(decoded.command(), Command::SetQuality);
		assert_eq!(decoded.payload(), &[0x03]);
	}

	#[test]
	fn decode_errors() {
		let good = Frame::encode(Command::FeedPaper, &[0x00]).unwrap().into_bytes();

		assert_eq!(
			Frame::decode(&good[..4]),
			Err(FrameError::Truncated { needed: 6, available: 4 }),
		);
		assert_eq!(
			Frame::decode(&good[..7]),
			Err(FrameError::Truncated { needed: 9, available: 7 }),
		);

		let mut bad = good.clone();
		bad[0] = 0x00;
		assert_eq!(Frame::decode(&bad), Err(FrameError::BadSync([0x00, 0x78])));

		let mut bad = good.clone();
		bad[2] = 0x42;
		assert_eq!(Frame::decode(&bad), Err(FrameError::UnknownCommand(0x42)));

		let mut bad = good.clone();
		bad[6] = 0x01;
		assert_eq!(
			Frame::decode(&bad),
			Err(FrameError::ChecksumMismatch { expected: 0x07, actual: 0x00 }),
		);

		let mut bad = good.clone();
		bad[8] = 0xfe;
		assert_eq!(Frame::decode(&bad), Err(FrameError::BadTerminator(0xfe)));

		let mut bad = good.clone();
		bad[3] = 0x01;
		assert_eq!(Frame::decode(&bad), Err(FrameError::BadReserved { offset: 3, value: 0x01 }));

		let mut bad = good;
		bad[5] = 0x80;
		assert_eq!(Frame::decode(&bad), Err(FrameError::BadReserved { offset: 5, value: 0x80 }));
	}

	#[test]
	fn decode_stream() {
		let mut buf = Vec::new();
		buf.extend(Frame::encode(Command::SetEnergy, &[0xff]).unwrap().into_bytes());
		buf.extend(Frame::encode(Command::DrawBitmap, &[0x0f, 0xf0]).unwrap().into_bytes());

		let frames = decode_all(&buf).unwrap();
		let cmds: Vec<_> = frames.iter().map(Frame::command).collect();
		assert_eq!(cmds, [Command::SetEnergy, Command::DrawBitmap]);
		assert_eq!(frames[1].payload(), &[0x0f, 0xf0]);
	}
}
