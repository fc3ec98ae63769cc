//! Wire Protocol
//!
//! A subset of the Redis Serialization Protocol: requests are arrays of bulk
//! strings, replies are status, error, bulk, null bulk or array values.
//!
//! ## Modules
//!
//! - `types`: [`Frame`] (a decoded request) and [`Reply`] (an encoded response)
//! - `decoder`: incremental request decoder
//!
//! ## Example
//!
//! ```
//! use snapkv::protocol::{FrameDecoder, Reply};
//!
//! let (frame, _) = FrameDecoder::new()
//!     .decode(b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(frame.len(), 2);
//!
//! assert_eq!(Reply::bulk("hi").serialize(), b"$2\r\nhi\r\n");
//! ```

pub mod decoder;
pub mod types;

pub use decoder::{DecodeError, DecodeResult, FrameDecoder, MAX_BULK_SIZE};
pub use types::{Frame, Reply};
