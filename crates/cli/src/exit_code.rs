//! Process exit codes reported by the `transfer` binary.

use transfer::FailureClass;

/// Exit status of one `transfer` invocation.
///
/// Each failing variant corresponds to one [`FailureClass`]; the numeric
/// values are stable and scripts may rely on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// The destination received the complete output.
    Ok = 0,

    /// Connecting failed, or the connection was lost, cancelled or timed out.
    Connection = 1,

    /// The resource was missing, empty, or the peer spoke something other
    /// than the expected protocol.
    Protocol = 2,

    /// The compressed stream was corrupt, truncated, or rejected by the codec.
    Codec = 3,

    /// Reading a local resource or writing the destination failed.
    Io = 4,

    /// The command line could not be understood.
    Usage = 5,
}

impl ExitCode {
    /// Returns the numeric exit code value.
    ///
    /// ```
    /// use cli::ExitCode;
    ///
    /// assert_eq!(ExitCode::Ok.as_i32(), 0);
    /// assert_eq!(ExitCode::Usage.as_i32(), 5);
    /// ```
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns a short human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::Connection => "connection failure",
            Self::Protocol => "resource not found or protocol error",
            Self::Codec => "corrupt or undecodable stream",
            Self::Io => "error in file I/O",
            Self::Usage => "syntax or usage error",
        }
    }

    /// Returns `true` for [`ExitCode::Ok`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Creates an exit code from its numeric value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Connection),
            2 => Some(Self::Protocol),
            3 => Some(Self::Codec),
            4 => Some(Self::Io),
            5 => Some(Self::Usage),
            _ => None,
        }
    }
}

impl From<FailureClass> for ExitCode {
    fn from(class: FailureClass) -> Self {
        match class {
            FailureClass::Connection => Self::Connection,
            FailureClass::Protocol => Self::Protocol,
            FailureClass::Codec => Self::Codec,
            FailureClass::Io => Self::Io,
            FailureClass::Usage => Self::Usage,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
