//! ADB host protocol framing
//!
//! Requests are an ASCII service string prefixed by its length as four hex
//! digits (`0009host:kill`). Responses start with `OKAY` or `FAIL`; a `FAIL`
//! is always followed by a length-prefixed message, an `OKAY` is followed by a
//! length-prefixed payload only for services that return data.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use fakeadb_core::prelude::*;

pub const OKAY: &[u8; 4] = b"OKAY";
pub const FAIL: &[u8; 4] = b"FAIL";

/// Version reported by `host:version` (adb 1.0.41)
pub const ADB_PROTOCOL_VERSION: u32 = 41;

/// Largest payload a four-hex-digit length can describe
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Encode a length as four lowercase hex digits
pub fn encode_length(len: usize) -> Result<String> {
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::protocol(format!(
            "payload of {} bytes does not fit a 4-digit hex length",
            len
        )));
    }
    Ok(format!("{:04x}", len))
}

/// Decode a four-hex-digit length prefix
pub fn decode_length(prefix: &[u8; 4]) -> Result<usize> {
    let text = std::str::from_utf8(prefix)
        .map_err(|_| Error::protocol(format!("invalid length prefix {:?}", prefix)))?;
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::protocol(format!("invalid length prefix '{}'", text)));
    }
    usize::from_str_radix(text, 16)
        .map_err(|_| Error::protocol(format!("invalid length prefix '{}'", text)))
}

/// Frame a payload with its length prefix
pub fn encode_message(payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = encode_length(payload.len())?.into_bytes();
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read one service request from the stream
///
/// Returns `Ok(None)` if the peer closed the connection before sending
/// anything, which is how clients end a connection between requests.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::protocol("connection closed inside length prefix"));
        }
        filled += n;
    }

    let len = decode_length(&prefix)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let service = String::from_utf8(body)
        .map_err(|_| Error::protocol("service request is not valid UTF-8"))?;
    trace!("read request {:?}", service);
    Ok(Some(service))
}

/// Write a bare `OKAY`
pub async fn write_okay<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    writer.write_all(OKAY).await?;
    writer.flush().await?;
    Ok(())
}

/// Write `FAIL` followed by the length-prefixed message
pub async fn write_fail<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> Result<()> {
    let mut out = FAIL.to_vec();
    out.extend(encode_message(message.as_bytes())?);
    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a length-prefixed payload (no status word)
pub async fn write_length_prefixed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<()> {
    writer.write_all(&encode_message(payload)?).await?;
    writer.flush().await?;
    Ok(())
}

/// Write `OKAY` immediately followed by a length-prefixed payload
pub async fn write_okay_with_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<()> {
    let mut out = OKAY.to_vec();
    out.extend(encode_message(payload)?);
    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Payload of a `host:version` reply
pub fn version_payload() -> String {
    format!("{:04x}", ADB_PROTOCOL_VERSION)
}
