//! Exit status codes of the `dbk` binary.
//! reference: [SYSEXITS](https://man.freebsd.org/cgi/man.cgi?query=sysexits&sektion=3)

use crate::Error;

/// value: 2 <br>
/// Misuse of shell builtins (according to Bash documentation)
pub const EX_KEYWORD: i32 = 2;

/// value: 65 <br>
/// The input data was incorrect in some way. Used when two trees differ.
pub const EX_DATAERR: i32 = 65;

/// value: 66 <br>
/// An input file did not exist or was not readable.
pub const EX_NOINPUT: i32 = 66;

/// value: 70 <br>
/// An internal software error has been detected.
pub const EX_SOFTWARE: i32 = 70;

/// value: 73 <br>
/// A (user specified) output file cannot be created.
pub const EX_CANTCREAT: i32 = 73;

/// value: 74 <br>
/// An error occurred while doing I/O on some file.
pub const EX_IOERR: i32 = 74;

/// value: 77 <br>
/// You did not have sufficient permission to perform the operation.
pub const EX_NOPERM: i32 = 77;

/// value: 78 <br>
/// Something was found in an unconfigured or misconfigured state.
pub const EX_CONFIG: i32 = 78;

/// Maps a library error to the exit status reported by the binary.
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::PathNotFound { .. } | Error::NotADirectory { .. } => EX_NOINPUT,
        Error::Permission { .. } => EX_NOPERM,
        Error::ArchiveWrite { .. } => EX_CANTCREAT,
        Error::PartialDeletion { .. } | Error::Io { .. } | Error::Comparison { .. } => EX_IOERR,
        Error::VerificationFailed { .. } => EX_DATAERR,
        Error::Overlap { .. } | Error::Config { .. } => EX_CONFIG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code() {
        let path = PathBuf::from("/x");
        assert_eq!(exit_code(&Error::PathNotFound { path: path.clone() }), EX_NOINPUT);
        assert_eq!(
            exit_code(&Error::archive(&path, std::io::Error::other("full"))),
            EX_CANTCREAT
        );
        assert_eq!(
            exit_code(&Error::VerificationFailed {
                left: path.clone(),
                right: path
            }),
            EX_DATAERR
        );
        assert_eq!(exit_code(&Error::config("missing")), EX_CONFIG);
    }
}
