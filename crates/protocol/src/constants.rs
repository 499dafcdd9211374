/// Frame tag: end of the upload stream.
pub const TAG_END: u8 = 0x00;

/// Frame tag: chunk metadata (must be first).
pub const TAG_METADATA: u8 = 0x01;

/// Frame tag: chunk data.
pub const TAG_DATA: u8 = 0x02;

/// Maximum payload of a single data frame (4 MiB).
///
/// Also the slice size used when replaying a stored chunk to a peer.
pub const MAX_DATA_FRAME: usize = 4 * 1024 * 1024;

/// Maximum encoded size of an upload response (64 KiB).
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// File extension marking a chunk artifact on disk.
pub const CHUNK_EXTENSION: &str = "chunk";
