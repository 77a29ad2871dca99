//! Wire-level types shared by the `sockctl` daemon and its clients.
//!
//! Every message on the control socket is a frame: a four byte unsigned
//! length in host byte order followed by exactly that many bytes of UTF-8
//! JSON. Requests and responses use the same encoding.
//!
//! ```text
//! +----------------+------------------------------------------+
//! | len: u32 (ne)  | {"method":"sockctl/ping","data":{}}      |
//! +----------------+------------------------------------------+
//! ```
//!
//! The crate also carries the conventions handler authors rely on: the
//! fixed "no such method" reply and the [`helpers`] for building `ok` and
//! `error` values and validating request fields.

pub mod frame;
pub mod helpers;
mod request;
mod response;

pub use frame::{
    DEFAULT_MAX_MESSAGE_LEN, FrameError, HEADER_LEN, decode_header, encode_frame, read_frame,
    write_frame,
};
pub use request::{Request, RequestError};
pub use response::{NO_SUCH_METHOD, no_such_method};
