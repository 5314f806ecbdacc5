//! Wire grammar of the subscriber protocol.
//!
//! Every frame is one line of text. Clients send a handshake first
//! (`ccus=<chid>`), then any of:
//!
//! | Frame | Meaning |
//! |-------|---------|
//! | `T` | poll, no-op besides the change check |
//! | `#<uid>;<counter>;<revision>` | publish a new counter for `uid` |
//! | `=` | full snapshot of stale subscriptions |
//! | `-*` | drop every subscription |
//! | `+<uid>=<counter>,-<uid>,...` | batch subscribe with hint / unsubscribe |
//!
//! The server answers with `uid=counter,uid=counter` lists or
//! `Err:invalid message`.

/// Reply sent for structurally malformed messages.
pub const INVALID_MESSAGE: &str = "Err:invalid message";

/// Handshake key carrying the channel id.
const HANDSHAKE_KEY: &str = "ccus";

/// Messages shorter than this are never batches.
const MIN_BATCH_LEN: usize = 4;

/// One item read from a session's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text frame received from the client. Always answered with exactly
    /// one [`Outbound::Reply`].
    Text(String),
    /// Periodic wake-up from the ticker. Never answered.
    Tick,
}

/// One item produced by the preparer for the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Answer to the last [`Inbound::Text`]. Empty means no frame is sent.
    Reply(String),
    /// Unsolicited change notification.
    Push(String),
}

impl Outbound {
    /// Returns the frame text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Reply(text) | Self::Push(text) => text,
        }
    }
}

/// Extracts the channel id from a `ccus=<chid>` handshake.
///
/// Returns `None` when the message is not a well-formed handshake; the
/// session becomes ready either way.
#[must_use]
pub fn parse_handshake(text: &str) -> Option<&str> {
    let mut parts = text.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HANDSHAKE_KEY), Some(chid), None) => Some(chid),
        _ => None,
    }
}

/// A client message received once the session is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `T`.
    Poll,
    /// Well-formed `#uid;counter;revision`.
    Publish {
        /// Entity identifier.
        uid: &'a str,
        /// New counter value.
        counter: i64,
        /// Revision announced by the publisher.
        revision: i64,
    },
    /// `#` message that does not have exactly three `;` parts, or an
    /// empty frame.
    Malformed,
    /// Three-part `#` message whose fields do not parse.
    UnparsableFields,
    /// `=`.
    FullSync,
    /// `-*`.
    ClearAll,
    /// Comma-separated subscribe / unsubscribe directives.
    Batch(Vec<Directive<'a>>),
    /// Anything else; only the change check runs.
    Ignored,
}

/// One entry of a batch message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `+uid=hint`: track `uid`, assuming the client has seen `hint`.
    Subscribe {
        /// Entity identifier.
        uid: &'a str,
        /// Counter the client already knows.
        hint: i64,
    },
    /// `-uid`: stop tracking `uid`.
    Unsubscribe {
        /// Entity identifier.
        uid: &'a str,
    },
}

impl<'a> Command<'a> {
    /// Classifies a client message.
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        if text.is_empty() {
            return Self::Malformed;
        }
        if text == "T" {
            return Self::Poll;
        }
        if let Some(body) = text.strip_prefix('#') {
            return parse_publish(body);
        }
        if text == "=" {
            return Self::FullSync;
        }
        if text == "-*" {
            return Self::ClearAll;
        }
        if text.len() >= MIN_BATCH_LEN {
            return Self::Batch(text.split(',').filter_map(Directive::parse).collect());
        }
        Self::Ignored
    }
}

fn parse_publish(body: &str) -> Command<'_> {
    let mut parts = body.split(';');
    let (Some(uid), Some(counter), Some(revision), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Command::Malformed;
    };
    match (counter.parse(), revision.parse()) {
        (Ok(counter), Ok(revision)) if !uid.is_empty() => Command::Publish {
            uid,
            counter,
            revision,
        },
        _ => Command::UnparsableFields,
    }
}

impl<'a> Directive<'a> {
    /// Parses one directive, returning `None` for anything that is neither
    /// `+uid=hint` nor `-uid`.
    #[must_use]
    pub fn parse(item: &'a str) -> Option<Self> {
        if let Some(rest) = item.strip_prefix('+') {
            let (uid, hint) = rest.split_once('=')?;
            if uid.is_empty() || hint.contains('=') {
                return None;
            }
            return Some(Self::Subscribe {
                uid,
                hint: hint.parse().ok()?,
            });
        }
        let uid = item.strip_prefix('-')?;
        if uid.is_empty() || uid.contains('=') {
            return None;
        }
        Some(Self::Unsubscribe { uid })
    }
}

/// Appends `uid=counter` to a comma-joined change list.
pub fn push_change(list: &mut String, uid: &str, counter: i64) {
    if !list.is_empty() {
        list.push(',');
    }
    list.push_str(uid);
    list.push('=');
    list.push_str(&counter.to_string());
}
