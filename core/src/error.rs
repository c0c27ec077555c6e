//! Error taxonomy shared by every layer of the stack, plus the mapping used
//! when a result crosses back out to a socket-interface caller.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetError {
    /// Kernel allocator could not satisfy a request.
    NoMemory,
    /// A FIFO, socket buffer, or address table is full.
    NoBufferSpace,
    /// An argument failed validation (bad length, bad flag combination).
    BadValue,
    /// A pointer or user-supplied buffer could not be used.
    BadAddress,
    /// Referenced a device index or name with no registered device.
    DeviceNotFound,
    /// No route exists to the destination.
    NetworkUnreachable,
    /// A name (interface alias, route key) is already taken.
    NameInUse,
    /// The resource being created already exists.
    FileExists,
    /// Two values that must agree (e.g. address family vs socket domain)
    /// did not.
    MismatchedValues,
    /// Operation not permitted in the caller's current state or privilege.
    NotAllowed,
    /// Resource temporarily unavailable under the current locking/refcount
    /// state; retry later.
    Busy,
    /// A blocking wait was interrupted before its condition was satisfied.
    Interrupted,
    /// Non-blocking operation could not complete immediately.
    WouldBlock,
    /// A bounded wait expired.
    TimedOut,
    /// Socket is not connected (sendto/recvfrom style operation needed
    /// instead).
    NotConnected,
    /// Socket is already connected (connect-only operation attempted).
    IsConnected,
    /// No destination address supplied and the socket has none of its own.
    DestinationRequired,
    /// Message length exceeds the transport's maximum or the caller's
    /// buffer.
    MessageTooLong,
    /// Address family not supported by this domain.
    AddressFamilyNotSupported,
    /// Socket option not recognized for this protocol.
    OptionNotSupported,
    /// Operation recognized but not implemented for this object.
    Unsupported,
}

impl From<()> for NetError {
    fn from(_: ()) -> Self {
        NetError::NoMemory
    }
}

impl NetError {
    /// POSIX-ish errno mapping for the socket interface boundary.
    pub fn to_errno(self) -> i32 {
        match self {
            NetError::NoMemory => 12,                   // ENOMEM
            NetError::NoBufferSpace => 105,              // ENOBUFS
            NetError::BadValue => 22,                    // EINVAL
            NetError::BadAddress => 14,                  // EFAULT
            NetError::DeviceNotFound => 19,               // ENODEV
            NetError::NetworkUnreachable => 101,          // ENETUNREACH
            NetError::NameInUse => 98,                    // EADDRINUSE
            NetError::FileExists => 17,                   // EEXIST
            NetError::MismatchedValues => 22,             // EINVAL
            NetError::NotAllowed => 1,                    // EPERM
            NetError::Busy => 16,                         // EBUSY
            NetError::Interrupted => 4,                   // EINTR
            NetError::WouldBlock => 11,                   // EAGAIN
            NetError::TimedOut => 110,                    // ETIMEDOUT
            NetError::NotConnected => 107,                // ENOTCONN
            NetError::IsConnected => 106,                 // EISCONN
            NetError::DestinationRequired => 89,          // EDESTADDRREQ
            NetError::MessageTooLong => 90,                // EMSGSIZE
            NetError::AddressFamilyNotSupported => 97,    // EAFNOSUPPORT
            NetError::OptionNotSupported => 92,            // ENOPROTOOPT
            NetError::Unsupported => 95,                   // EOPNOTSUPP
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NetError::NoMemory => "out of memory",
            NetError::NoBufferSpace => "no buffer space available",
            NetError::BadValue => "invalid argument",
            NetError::BadAddress => "bad address",
            NetError::DeviceNotFound => "no such device",
            NetError::NetworkUnreachable => "network unreachable",
            NetError::NameInUse => "address already in use",
            NetError::FileExists => "already exists",
            NetError::MismatchedValues => "mismatched values",
            NetError::NotAllowed => "operation not permitted",
            NetError::Busy => "resource busy",
            NetError::Interrupted => "interrupted",
            NetError::WouldBlock => "operation would block",
            NetError::TimedOut => "timed out",
            NetError::NotConnected => "socket not connected",
            NetError::IsConnected => "socket already connected",
            NetError::DestinationRequired => "destination address required",
            NetError::MessageTooLong => "message too long",
            NetError::AddressFamilyNotSupported => "address family not supported",
            NetError::OptionNotSupported => "option not supported",
            NetError::Unsupported => "not supported",
        };
        f.write_str(msg)
    }
}

pub type NetResult<T> = Result<T, NetError>;
