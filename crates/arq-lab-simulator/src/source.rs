use arq_lab_abstract::{MAX_DATA_SIZE, Message, PacketError};

/// The `index`-th message produced by the application source: a full payload
/// of one lowercase letter, cycling `a`..`z`.
pub fn generated_message(index: u32) -> Result<Message, PacketError> {
    let letter = char::from(b'a' + (index % 26) as u8);
    Message::new(std::iter::repeat_n(letter, MAX_DATA_SIZE).collect::<String>())
}
