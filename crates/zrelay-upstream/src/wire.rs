// Multipart message layout published by the node: [topic, payload, sequence].
use bytes::Bytes;
use zrelay_hub::UpstreamEvent;

const FRAME_COUNT: usize = 3;
const SEQUENCE_LEN: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("expected 3 frames, got {0}")]
    FrameCount(usize),
    #[error("topic frame is not valid UTF-8")]
    TopicEncoding,
    #[error("sequence frame must be 4 bytes, got {0}")]
    SequenceLength(usize),
}

/// Decodes one multipart message into an [`UpstreamEvent`].
///
/// ```
/// use bytes::Bytes;
/// use zrelay_upstream::decode_frames;
///
/// let frames = vec![
///     Bytes::from_static(b"rawtx"),
///     Bytes::from_static(&[0xde, 0xad]),
///     Bytes::from_static(&[7, 0, 0, 0]),
/// ];
/// let event = decode_frames(frames).expect("event");
/// assert_eq!(event.topic, "rawtx");
/// assert_eq!(event.counter, 7);
/// ```
pub fn decode_frames(frames: Vec<Bytes>) -> Result<UpstreamEvent, FrameError> {
    let [topic, payload, sequence]: [Bytes; FRAME_COUNT] = frames
        .try_into()
        .map_err(|frames: Vec<Bytes>| FrameError::FrameCount(frames.len()))?;
    let topic = std::str::from_utf8(&topic).map_err(|_| FrameError::TopicEncoding)?;
    let sequence: [u8; SEQUENCE_LEN] = sequence
        .as_ref()
        .try_into()
        .map_err(|_| FrameError::SequenceLength(sequence.len()))?;
    Ok(UpstreamEvent::new(
        topic,
        payload,
        u32::from_le_bytes(sequence),
    ))
}
