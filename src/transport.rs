//! Diameter protocol transport: length-prefixed message framing over
//! an async byte stream, plus client/server wrappers around it.
pub mod client;
pub mod server;

pub use crate::transport::client::{DiameterClient, DiameterClientConfig};
pub use crate::transport::server::{DiameterServer, DiameterServerConfig};

use crate::diameter::DiameterMessage;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest message this codec will allocate a buffer for. Diameter
/// itself allows up to 2^24 - 1 bytes; a sane deployment never sends
/// anything close to that, and capping it here turns a bad length
/// field into an error instead of an allocation bomb.
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

pub struct Codec {}

impl Codec {
    pub async fn decode<R>(reader: &mut R, dict: &Dictionary) -> Result<DiameterMessage>
    where
        R: AsyncReadExt + Unpin,
    {
        let mut b = [0u8; 4];
        reader.read_exact(&mut b).await?;
        let length = u32::from_be_bytes([0, b[1], b[2], b[3]]) as usize;

        if length < 20 {
            return Err(Error::DecodeError(format!(
                "diameter message length {} shorter than header",
                length
            )));
        }
        if length > MAX_MESSAGE_SIZE {
            return Err(Error::DecodeError(format!(
                "diameter message length {} exceeds {} byte limit",
                length, MAX_MESSAGE_SIZE
            )));
        }

        let mut buffer = vec![0u8; length];
        buffer[..4].copy_from_slice(&b);
        reader.read_exact(&mut buffer[4..]).await?;

        let mut cursor = Cursor::new(buffer);
        DiameterMessage::decode_from(&mut cursor, dict)
    }

    pub async fn encode<W>(writer: &mut W, msg: &DiameterMessage) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        let mut b = Vec::new();
        msg.encode_to(&mut b)?;
        writer.write_all(&b).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diameter::CommandFlags;
    use crate::dictionary::BASE_DICT_XML;

    #[tokio::test]
    async fn test_decode_rejects_oversized_length() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        let mut bogus = vec![0u8; 4];
        bogus[0] = 0xff;
        bogus[1] = 0xff;
        let mut cursor = Cursor::new(bogus);
        let result = Codec::decode(&mut cursor, &dict).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_encode_decode_over_cursor() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        let msg = DiameterMessage::new(257, 0, CommandFlags::default(), 1, 1);

        let mut buf = Vec::new();
        Codec::encode(&mut buf, &msg).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = Codec::decode(&mut cursor, &dict).await.unwrap();
        assert_eq!(decoded.header.code, 257);
    }
}
