//! On-disk storage: path resolution, line codec and zip containers.

pub mod archive;
pub mod codec;
pub mod locks;
pub mod paths;
pub mod writer;

pub use archive::{Archive, Compression, DEFLATE_LEVELS, Entries, WriteOutcome, read_all, write};
pub use codec::{DEFAULT_PRICE_DECIMALS, DecodeError, LineCodec, decode, encode, format_decimal};
pub use locks::ContainerLocks;
pub use paths::{Partitioning, ResolvedPath, resolve, temp_prefix_for};
pub use writer::DataWriter;
