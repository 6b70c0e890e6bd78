// std
use std::io;
// crates
use beacon_core::wire;
use futures::{AsyncRead, AsyncReadExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
// internal

type LenType = u32;
const LEN_PREFIX_BYTES: usize = size_of::<LenType>();
pub const MAX_MSG_LEN: usize = wire::DATA_LIMIT as usize;

fn into_failed_to_serialize(error: wire::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Failed to serialize message: {}", error),
    )
}

fn into_failed_to_deserialize(error: wire::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Failed to deserialize message: {}", error),
    )
}

fn get_message_too_large_error(message_len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
            "Message too large. Maximum size is {}. Actual size is {}",
            MAX_MSG_LEN, message_len
        ),
    )
}

pub fn pack<Message>(message: &Message) -> io::Result<Vec<u8>>
where
    Message: Serialize,
{
    let serialized_message = wire::serialize(message).map_err(into_failed_to_serialize)?;

    let data_length = serialized_message.len();
    if data_length > MAX_MSG_LEN {
        return Err(get_message_too_large_error(data_length));
    }

    let mut buffer = Vec::with_capacity(LEN_PREFIX_BYTES + data_length);
    buffer.extend_from_slice(&(data_length as LenType).to_be_bytes());
    buffer.extend_from_slice(&serialized_message);
    Ok(buffer)
}

/// Reads the length prefix, `None` if the stream ended cleanly before it.
async fn read_data_length<R>(reader: &mut R) -> io::Result<Option<usize>>
where
    R: AsyncRead + Unpin,
{
    let mut length_prefix = [0u8; LEN_PREFIX_BYTES];
    let mut filled = 0;
    while filled < LEN_PREFIX_BYTES {
        match reader.read(&mut length_prefix[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(io::ErrorKind::UnexpectedEof.into()),
            read => filled += read,
        }
    }
    let data_length = LenType::from_be_bytes(length_prefix) as usize;
    if data_length > MAX_MSG_LEN {
        return Err(get_message_too_large_error(data_length));
    }
    Ok(Some(data_length))
}

/// Next message on the stream, or `None` once the remote closed it.
pub async fn unpack_next<Message, R>(reader: &mut R) -> io::Result<Option<Message>>
where
    Message: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let Some(data_length) = read_data_length(reader).await? else {
        return Ok(None);
    };
    let mut data = vec![0u8; data_length];
    reader.read_exact(&mut data).await?;
    wire::deserialize(&data)
        .map(Some)
        .map_err(into_failed_to_deserialize)
}

pub async fn unpack_from_reader<Message, R>(reader: &mut R) -> io::Result<Message>
where
    Message: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    unpack_next(reader)
        .await?
        .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
}
