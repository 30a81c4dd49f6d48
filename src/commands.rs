//! Command execution.

use crate::error::CliError;
use amqframe_protocol::{split_body, Frame, FrameDecoder, FrameEncoder, FrameLimits, FrameType};
use bytes::Bytes;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read buffer size for input streams (8 KiB).
pub const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Payload bytes shown in text output before truncating.
const PREVIEW_LEN: usize = 32;

/// Output format for decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One aligned line per frame
    Text,
    /// One JSON object per line
    Json,
}

/// A decoded frame as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    /// Position of the frame's first byte in the input.
    pub offset: u64,
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub channel: u16,
    pub size: usize,
    /// Payload as lowercase hex.
    pub payload: String,
}

impl FrameSummary {
    fn new(offset: u64, frame: &Frame) -> Self {
        Self {
            offset,
            frame_type: frame.frame_type.name(),
            channel: frame.channel,
            size: frame.payload.len(),
            payload: hex::encode(&frame.payload),
        }
    }
}

/// Result of decoding an input stream.
#[derive(Debug, Default)]
pub struct DecodeReport {
    pub frames: Vec<FrameSummary>,
    /// Bytes left over after the last complete frame.
    pub trailing: usize,
}

/// Opens a capture file, or stdin for `-`. Hex input is read fully and
/// converted to raw bytes first.
pub async fn open_input(
    input: &str,
    hex_input: bool,
) -> Result<Box<dyn AsyncRead + Unpin + Send>, CliError> {
    let mut reader: Box<dyn AsyncRead + Unpin + Send> = if input == "-" {
        Box::new(tokio::io::stdin())
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .map_err(|e| CliError::Input(Path::new(input).to_path_buf(), e))?;
        Box::new(file)
    };

    if !hex_input {
        return Ok(reader);
    }

    let mut text = String::new();
    reader.read_to_string(&mut text).await?;
    let bytes = parse_hex(&text)?;
    tracing::debug!("Parsed {} bytes of hex input", bytes.len());
    Ok(Box::new(std::io::Cursor::new(bytes)))
}

/// Decodes every frame from `reader` until end of input.
pub async fn decode_stream<R>(mut reader: R, limits: FrameLimits) -> Result<DecodeReport, CliError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::with_limits(limits);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut report = DecodeReport::default();
    let mut offset = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        tracing::debug!("Read {} bytes from input", n);

        if n == 0 {
            break;
        }

        decoder.extend(&buf[..n]);
        while let Some(frame) = decoder
            .decode_frame()
            .map_err(|source| CliError::Frame { offset, source })?
        {
            tracing::trace!(
                "Decoded {} frame on channel {} at offset {}",
                frame.frame_type,
                frame.channel,
                offset
            );
            report.frames.push(FrameSummary::new(offset, &frame));
            offset += frame.encoded_len() as u64;
        }
    }

    report.trailing = decoder.buffered();
    if report.trailing > 0 {
        tracing::warn!(
            "Input ends inside a frame: {} trailing bytes at offset {}",
            report.trailing,
            offset
        );
    }

    Ok(report)
}

/// Formats a decode report for printing.
pub fn format_report(report: &DecodeReport, format: OutputFormat) -> Result<String, CliError> {
    let mut lines = Vec::with_capacity(report.frames.len() + 1);

    match format {
        OutputFormat::Json => {
            for frame in &report.frames {
                lines.push(serde_json::to_string(frame)?);
            }
        }
        OutputFormat::Text => {
            for frame in &report.frames {
                lines.push(format_text_line(frame));
            }
            if report.trailing > 0 {
                lines.push(
                    format!("{} trailing bytes (incomplete frame)", report.trailing)
                        .yellow()
                        .to_string(),
                );
            }
        }
    }

    Ok(lines.join("\n"))
}

fn format_text_line(frame: &FrameSummary) -> String {
    let preview = if frame.payload.len() > PREVIEW_LEN * 2 {
        format!("{}...", &frame.payload[..PREVIEW_LEN * 2])
    } else {
        frame.payload.clone()
    };

    format!(
        "{:>8}  {}  ch={:<5}  len={:<7}  {}",
        frame.offset,
        format!("{:<9}", frame.frame_type).cyan(),
        frame.channel,
        frame.size,
        preview.dimmed()
    )
}

/// Encodes a single frame and returns it as hex.
pub fn encode_frame(
    frame_type: FrameType,
    channel: u16,
    payload_hex: Option<&str>,
    limits: FrameLimits,
) -> Result<String, CliError> {
    let payload = match payload_hex {
        Some(text) => parse_hex(text)?,
        None => Vec::new(),
    };

    let frame = Frame::new(frame_type, channel, payload);
    let encoded = FrameEncoder::new(limits).encode(&frame)?;
    Ok(hex::encode(&encoded))
}

/// Splits a message body into body frames and returns each as hex.
pub fn split_content(
    channel: u16,
    body: Bytes,
    limits: FrameLimits,
) -> Result<Vec<String>, CliError> {
    let encoder = FrameEncoder::new(limits);
    split_body(channel, &body, &limits)
        .iter()
        .map(|frame| -> Result<String, CliError> { Ok(hex::encode(encoder.encode(frame)?)) })
        .collect()
}

/// Parses hex text, ignoring whitespace.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, CliError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(compact)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqframe_protocol::FrameError;
    use bytes::BytesMut;
    use std::io::Write;

    fn sample_capture() -> BytesMut {
        let mut buf = BytesMut::new();
        Frame::method(1, &b"\x00\x0a\x00\x0b"[..])
            .encode_to(&mut buf)
            .unwrap();
        Frame::heartbeat().encode_to(&mut buf).unwrap();
        buf
    }

    #[tokio::test]
    async fn test_decode_stream() {
        let capture = sample_capture();
        let (head, tail) = capture.split_at(9);
        let reader = tokio_test::io::Builder::new().read(head).read(tail).build();

        let report = decode_stream(reader, FrameLimits::default()).await.unwrap();

        assert_eq!(report.trailing, 0);
        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.frames[0].offset, 0);
        assert_eq!(report.frames[0].frame_type, "method");
        assert_eq!(report.frames[0].payload, "000a000b");
        assert_eq!(report.frames[1].offset, 12);
        assert_eq!(report.frames[1].frame_type, "heartbeat");
    }

    #[tokio::test]
    async fn test_decode_stream_trailing_bytes() {
        let mut capture = sample_capture();
        capture.extend_from_slice(b"\x03\x00\x01");

        let report = decode_stream(&capture[..], FrameLimits::default())
            .await
            .unwrap();

        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.trailing, 3);
    }

    #[tokio::test]
    async fn test_decode_stream_reports_offset() {
        let mut capture = sample_capture();
        capture.extend_from_slice(b"\x05\x00\x00\x00\x00\x00\x00\xce");

        let result = decode_stream(&capture[..], FrameLimits::default()).await;
        assert!(matches!(
            result,
            Err(CliError::Frame {
                offset: 20,
                source: FrameError::UnknownFrameType(5),
            })
        ));
    }

    #[tokio::test]
    async fn test_open_input_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sample_capture()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let reader = open_input(&path, false).await.unwrap();
        let report = decode_stream(reader, FrameLimits::default()).await.unwrap();
        assert_eq!(report.frames.len(), 2);
    }

    #[tokio::test]
    async fn test_open_input_hex_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "01 0001 00000004 000a000b ce").unwrap();
        writeln!(file, "08 0000 00000000 ce").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let reader = open_input(&path, true).await.unwrap();
        let report = decode_stream(reader, FrameLimits::default()).await.unwrap();
        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.frames[1].frame_type, "heartbeat");
    }

    #[tokio::test]
    async fn test_open_input_missing_file() {
        let result = open_input("/nonexistent/capture.bin", false).await;
        assert!(matches!(result, Err(CliError::Input(_, _))));
    }

    #[test]
    fn test_encode_frame() {
        let hex = encode_frame(FrameType::Heartbeat, 0, None, FrameLimits::default()).unwrap();
        assert_eq!(hex, "08000000000000ce");

        let hex = encode_frame(
            FrameType::Method,
            1,
            Some("000a 000b"),
            FrameLimits::default(),
        )
        .unwrap();
        assert_eq!(hex, "01000100000004000a000bce");
    }

    #[test]
    fn test_encode_frame_over_limit() {
        let result = encode_frame(
            FrameType::Body,
            1,
            Some("0102030405"),
            FrameLimits::with_max_payload(4),
        );
        assert!(matches!(
            result,
            Err(CliError::Encode(FrameError::FrameTooLarge { .. }))
        ));
    }

    #[test]
    fn test_encode_frame_bad_hex() {
        let result = encode_frame(FrameType::Body, 1, Some("zz"), FrameLimits::default());
        assert!(matches!(result, Err(CliError::Hex(_))));
    }

    #[test]
    fn test_split_content() {
        let body = Bytes::from(vec![0xABu8; 10]);
        let frames = split_content(2, body, FrameLimits::with_max_payload(4)).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], "03000200000004ababababce");
        assert_eq!(frames[2], "03000200000002ababce");
    }

    #[test]
    fn test_format_report_json() {
        let report = DecodeReport {
            frames: vec![FrameSummary::new(0, &Frame::heartbeat())],
            trailing: 0,
        };

        let output = format_report(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert_eq!(value["channel"], 0);
        assert_eq!(value["size"], 0);
    }

    #[test]
    fn test_format_report_text() {
        let report = DecodeReport {
            frames: vec![FrameSummary::new(0, &Frame::body(3, vec![0u8; 100]))],
            trailing: 5,
        };

        let output = format_report(&report, OutputFormat::Text).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("body"));
        assert!(lines[0].contains("ch=3"));
        assert!(lines[0].contains("..."));
        assert!(lines[1].contains("5 trailing bytes"));
    }
}
