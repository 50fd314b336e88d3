//! LAN discovery beacons and stream handshake
//!
//! Scanners broadcast a `Probe`; discoverable devices with a registered
//! service answer with an `Announce` naming their stream port. A dialer opens
//! every TCP stream with a `Hello` so the listener can check the service and
//! learn the dialer's name. All three are bincode-encoded behind a magic tag.

use crate::error::RadioError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// Protocol tag prefixed to every datagram and handshake
pub const BEACON_MAGIC: [u8; 4] = *b"BMSG";

/// Beacon protocol version
pub const BEACON_VERSION: u8 = 1;

/// Upper bound for one encoded beacon or hello
pub const MAX_BEACON_SIZE: usize = 1024;

/// Discovery datagrams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Beacon {
    /// Sent by a scanner, answered by discoverable devices
    Probe { scanner: Uuid },
    /// Answer to a probe
    Announce {
        device: Uuid,
        name: Option<String>,
        stream_port: u16,
    },
}

/// First frame on every LAN stream, written by the dialer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub service: Uuid,
    pub name: Option<String>,
}

// ----------------------------------------------------------------------------
// Datagram Encoding
// ----------------------------------------------------------------------------

pub fn encode_beacon(beacon: &Beacon) -> Result<Vec<u8>, RadioError> {
    let mut frame = Vec::with_capacity(64);
    frame.extend_from_slice(&BEACON_MAGIC);
    frame.push(BEACON_VERSION);
    frame.extend_from_slice(&bincode::serialize(beacon)?);
    Ok(frame)
}

/// Decode a datagram; foreign traffic on the port yields `Ok(None)`
pub fn decode_beacon(datagram: &[u8]) -> Result<Option<Beacon>, RadioError> {
    let header = BEACON_MAGIC.len() + 1;
    if datagram.len() < header || datagram[..BEACON_MAGIC.len()] != BEACON_MAGIC {
        return Ok(None);
    }
    if datagram[BEACON_MAGIC.len()] != BEACON_VERSION {
        return Ok(None);
    }
    Ok(Some(bincode::deserialize(&datagram[header..])?))
}

// ----------------------------------------------------------------------------
// Stream Handshake
// ----------------------------------------------------------------------------

/// Write the hello: magic, u16 big-endian length, bincode body
pub async fn write_hello<W>(writer: &mut W, hello: &Hello) -> Result<(), RadioError>
where
    W: AsyncWrite + Unpin,
{
    let body = bincode::serialize(hello)?;
    if body.len() > MAX_BEACON_SIZE {
        return Err(RadioError::Handshake(format!("hello of {} bytes is too large", body.len())));
    }
    let mut frame = Vec::with_capacity(BEACON_MAGIC.len() + 2 + body.len());
    frame.extend_from_slice(&BEACON_MAGIC);
    frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
    frame.extend_from_slice(&body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_hello<R>(reader: &mut R) -> Result<Hello, RadioError>
where
    R: AsyncRead + Unpin,
{
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).await?;
    if magic != BEACON_MAGIC {
        return Err(RadioError::Handshake("unknown protocol".to_string()));
    }
    let len = reader.read_u16().await? as usize;
    if len > MAX_BEACON_SIZE {
        return Err(RadioError::Handshake(format!("hello of {} bytes is too large", len)));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}
