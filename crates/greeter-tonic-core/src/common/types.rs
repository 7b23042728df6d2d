//! # Greeting Policy and Reply Types
//!
//! This module defines how the greeter turns a caller's name into a reply. It
//! is shared by the server and by clients that want to check replies.
//!
//! ## Formatting policy
//!
//! - *Short form* ([`greet`]): `"Hello {name}"`. Used by the asynchronous
//!   unary call and by bidirectional streams.
//! - *Banner form* ([`Banner::greet`]): `"{banner} {name}"`. Used by the unary
//!   call and by server streams.
//!
//! ## Banner
//!
//! The [`Banner`] is a large greeting prefix precomputed once at process
//! startup. It is immutable afterwards and cheap to clone, so every session
//! can hold its own handle without locking.

use crate::proto::HelloReply;
use core::fmt::{self, Write};
use std::sync::Arc;

/// The word every greeting starts with.
pub const GREETING: &str = "Hello";

/// Number of `"{i}Hello"` segments in the default [`Banner`].
pub const DEFAULT_BANNER_REPEAT: usize = 10_000;

/// Formats the short greeting for `name`.
pub fn greet(name: &str) -> String {
    format!("{GREETING} {name}")
}

/// Returns the part of a banner greeting that follows the banner.
///
/// Banners never contain a space, so everything after the first one is the
/// name, spaces included. Messages without a space are returned unchanged.
pub fn strip_banner(message: &str) -> &str {
    message.split_once(' ').map_or(message, |(_, name)| name)
}

/// Wraps `message` in a [`HelloReply`] without altering it.
pub fn to_reply(message: String) -> HelloReply {
    HelloReply { message }
}

/// Precomputed greeting prefix shared by all sessions.
///
/// Built from `repeat` segments of the form `"{i}Hello"` for `i` in
/// `0..repeat`, e.g. `"0Hello1Hello2Hello"` for `repeat = 3`.
#[derive(Clone, PartialEq, Eq)]
pub struct Banner(Arc<str>);

impl Banner {
    /// Builds the banner. This allocates the whole string up front and should
    /// run once during startup.
    pub fn new(repeat: usize) -> Self {
        // Digits of the largest index plus the greeting, per segment.
        let width = repeat.max(1).ilog10() as usize + 1 + GREETING.len();
        let mut buf = String::with_capacity(repeat * width);
        for i in 0..repeat {
            // Writing into a `String` cannot fail.
            let _ = write!(buf, "{i}{GREETING}");
        }
        Self(Arc::from(buf))
    }

    /// Formats the banner greeting for `name`.
    pub fn greet(&self, name: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + 1 + name.len());
        out.push_str(&self.0);
        out.push(' ');
        out.push_str(name);
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Banner {
    fn default() -> Self {
        Self::new(DEFAULT_BANNER_REPEAT)
    }
}

// The banner is tens of kilobytes; keep debug output readable.
impl fmt::Debug for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Banner").field("len", &self.0.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_greeting() {
        assert_eq!(greet("world"), "Hello world");
        assert_eq!(greet(""), "Hello ");
    }

    #[test]
    fn reply_keeps_message_verbatim() {
        let reply = to_reply("  anything\n".to_string());
        assert_eq!(reply.message, "  anything\n");
    }

    #[test]
    fn banner_segments() {
        assert_eq!(Banner::new(3).as_str(), "0Hello1Hello2Hello");
        assert!(Banner::new(0).is_empty());
    }

    #[test]
    fn banner_greeting_ends_with_name() {
        let banner = Banner::new(12);
        let message = banner.greet("dubbo");
        assert!(message.starts_with(banner.as_str()));
        assert!(message.ends_with(" dubbo"));
        assert_eq!(message.len(), banner.len() + " dubbo".len());
    }

    #[test]
    fn strip_banner_keeps_names_with_spaces() {
        let banner = Banner::new(12);
        assert_eq!(strip_banner(&banner.greet("Ada Lovelace")), "Ada Lovelace");
        assert_eq!(strip_banner(&banner.greet("")), "");
        assert_eq!(strip_banner("nospace"), "nospace");
    }

    #[test]
    fn default_banner_length() {
        // 10 one-digit, 90 two-digit, 900 three-digit and 9000 four-digit
        // indices, each followed by "Hello".
        let digits = 10 + 90 * 2 + 900 * 3 + 9000 * 4;
        let banner = Banner::default();
        assert_eq!(banner.len(), digits + DEFAULT_BANNER_REPEAT * GREETING.len());
        assert!(banner.as_str().ends_with("9999Hello"));
    }

    #[test]
    fn clones_share_the_allocation() {
        let banner = Banner::new(4);
        let other = banner.clone();
        assert!(core::ptr::eq(banner.as_str(), other.as_str()));
    }
}
