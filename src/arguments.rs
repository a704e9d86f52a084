//! Command-line marshalling: the wide Win32 command line becomes UTF-8
//! strings for the Dart entrypoint, with the binary path dropped.

use log::warn;

use crate::error::RunnerError;

/// Converts a UTF-16 string to UTF-8.
///
/// `None` yields an empty string, as does any input holding an unpaired
/// surrogate. Input is read up to the first NUL, if there is one.
pub fn utf8_from_utf16(utf16: Option<&[u16]>) -> String {
    let Some(units) = utf16 else {
        return String::new();
    };
    transcode_argument(0, units).unwrap_or_default()
}

fn transcode_argument(index: usize, units: &[u16]) -> Result<String, RunnerError> {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16(&units[..end]).map_err(|_| RunnerError::Transcode { index })
}

/// Transcodes tokenized arguments, skipping argv[0].
///
/// An argument that fails strict conversion is forwarded as an empty string
/// so positions stay stable for the Dart side.
pub fn arguments_from_argv<'a, I>(argv: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [u16]>,
{
    argv.into_iter()
        .enumerate()
        .skip(1)
        .map(|(index, units)| {
            transcode_argument(index, units).unwrap_or_else(|e| {
                warn!("[Arguments] {e}; forwarding an empty argument");
                String::new()
            })
        })
        .collect()
}

/// Reads and tokenizes the process command line with `CommandLineToArgvW`.
/// Returns an empty list if the tokenizer fails.
#[cfg(windows)]
pub fn command_line_arguments() -> Vec<String> {
    use std::ffi::c_void;
    use windows::Win32::{
        Foundation::{HLOCAL, LocalFree},
        System::Environment::GetCommandLineW,
        UI::Shell::CommandLineToArgvW,
    };

    let mut argc = 0i32;
    let argv = unsafe { CommandLineToArgvW(GetCommandLineW(), &mut argc) };
    if argv.is_null() {
        warn!(
            "[Arguments] CommandLineToArgvW failed: {}",
            std::io::Error::last_os_error()
        );
        return Vec::new();
    }

    let tokens: Vec<&[u16]> = (0..argc.max(0) as usize)
        .map(|i| unsafe {
            let token = *argv.add(i);
            if token.is_null() {
                &[][..]
            } else {
                std::slice::from_raw_parts(token.0 as *const u16, token.len())
            }
        })
        .collect();
    let arguments = arguments_from_argv(tokens);

    unsafe {
        let _ = LocalFree(Some(HLOCAL(argv as *mut c_void)));
    }
    log::debug!("[Arguments] Forwarding {} argument(s) to Dart", arguments.len());
    arguments
}

#[cfg(not(windows))]
pub fn command_line_arguments() -> Vec<String> {
    os_arguments(std::env::args_os())
}

/// Strict conversion of already-split OS arguments, skipping argv[0].
/// A non-Unicode argument is forwarded as an empty string.
#[cfg(not(windows))]
fn os_arguments<I>(argv: I) -> Vec<String>
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    argv.into_iter()
        .skip(1)
        .map(|arg| arg.into_string().unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn null_input_is_empty() {
        assert_eq!(utf8_from_utf16(None), "");
    }

    #[test]
    fn valid_input_is_canonical_utf8() {
        for s in ["", "--route=/home", "Grüße", "トレーニング", "💪 set 3"] {
            let w = wide(s);
            let out = utf8_from_utf16(Some(&w));
            assert_eq!(out, s);
            assert_eq!(out.as_bytes(), s.as_bytes());
        }
    }

    #[test]
    fn stops_at_terminating_nul() {
        let mut w = wide("abc");
        w.push(0);
        w.extend(wide("ignored"));
        assert_eq!(utf8_from_utf16(Some(&w)), "abc");
    }

    #[test]
    fn unpaired_surrogate_yields_empty() {
        let w = [0x0061, 0xD800, 0x0062];
        assert_eq!(utf8_from_utf16(Some(&w)), "");
        let w = [0xDC00];
        assert_eq!(utf8_from_utf16(Some(&w)), "");
    }

    #[test]
    fn argv0_is_dropped() {
        let argv: Vec<Vec<u16>> = ["C:\\app\\trainova.exe", "a", "b", "c", "d"]
            .iter()
            .map(|s| wide(s))
            .collect();
        let out = arguments_from_argv(argv.iter().map(Vec::as_slice));
        assert_eq!(out.len(), argv.len() - 1);
        assert_eq!(out, ["a", "b", "c", "d"]);
    }

    #[test]
    fn only_binary_path_gives_no_arguments() {
        let argv = [wide("trainova.exe")];
        assert!(arguments_from_argv(argv.iter().map(Vec::as_slice)).is_empty());
        assert!(arguments_from_argv(std::iter::empty::<&[u16]>()).is_empty());
    }

    #[test]
    fn unicode_arguments_are_forwarded_in_order() {
        let argv = [wide("trainova.exe"), wide("--user=Zoë"), wide("計画"), wide("🏋️")];
        let out = arguments_from_argv(argv.iter().map(Vec::as_slice));
        assert_eq!(out, ["--user=Zoë", "計画", "🏋️"]);
        assert!(out.iter().all(|a| !a.is_empty()));
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_os_argument_becomes_empty() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let argv = vec![
            OsString::from("trainova"),
            OsString::from("--user=Zoë"),
            OsString::from_vec(vec![0x66, 0x6f, 0xff, 0x6f]),
            OsString::from("last"),
        ];
        assert_eq!(os_arguments(argv), ["--user=Zoë", "", "last"]);
    }

    #[test]
    fn invalid_argument_keeps_its_slot() {
        let bad = vec![0xD83D];
        let argv = [wide("trainova.exe"), wide("first"), bad, wide("third")];
        let out = arguments_from_argv(argv.iter().map(Vec::as_slice));
        assert_eq!(out, ["first", "", "third"]);
    }
}
