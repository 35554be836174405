use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::commons::{Addr, Instr, Instructions};
use crate::error::{RecordError, TraceError};

/// Path of the trace for processor `core` of benchmark `testname`.
pub fn trace_path(dir: &Path, testname: &str, core: usize) -> PathBuf {
    dir.join(format!("{testname}_{core}.data"))
}

/// Reads `<dir>/<testname>_<i>.data` for every processor `i`, in processor
/// order. Fails on the first trace that is missing or malformed.
pub fn read_testfiles(dir: &Path, testname: &str, num_procs: usize) -> Result<Vec<Instructions>, TraceError> {
    (0..num_procs)
        .map(|core| -> Result<Instructions, TraceError> {
            let path = trace_path(dir, testname, core);
            info!("reading file: {}", path.display());
            let text = fs::read_to_string(&path).map_err(|source| TraceError::Io {
                core,
                path: path.clone(),
                source,
            })?;
            let insts = parse_trace(&text, &path)?;
            info!("core {}: {} instructions", core, insts.len());
            Ok(insts)
        })
        .collect()
}

/// Parses a whole trace. `path` is only used in error messages.
pub fn parse_trace(text: &str, path: &Path) -> Result<Instructions, TraceError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            parse_instr(line).map_err(|reason| TraceError::Parse {
                path: path.to_path_buf(),
                line: n + 1,
                reason,
            })
        })
        .collect()
}

/// Parses one `<kind> <hex value>` record.
pub fn parse_instr(line: &str) -> Result<Instr, RecordError> {
    let mut parts = line.split_whitespace();
    let (Some(kind), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RecordError::Shape(line.trim().to_string()));
    };
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    // from_str_radix would accept a leading sign
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RecordError::NotHex(value.to_string()));
    }
    let val = u32::from_str_radix(digits, 16).map_err(|source| RecordError::Value {
        value: value.to_string(),
        source,
    })?;
    match kind {
        "0" => Ok(Instr::Read(Addr(val))),
        "1" => Ok(Instr::Write(Addr(val))),
        "2" => Ok(Instr::Other(val)),
        _ => Err(RecordError::Kind(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records() {
        assert_eq!(parse_instr("0 0x817b08"), Ok(Instr::Read(Addr(0x817b08))));
        assert_eq!(parse_instr("1 817ae8"), Ok(Instr::Write(Addr(0x817ae8))));
        assert_eq!(parse_instr("2 0x1f"), Ok(Instr::Other(31)));
        assert_eq!(parse_instr("  2\t0xA  "), Ok(Instr::Other(10)));
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(matches!(parse_instr("0"), Err(RecordError::Shape(_))));
        assert!(matches!(parse_instr("0 0x10 0x20"), Err(RecordError::Shape(_))));
        assert_eq!(parse_instr("3 0x10"), Err(RecordError::Kind("3".into())));
        assert_eq!(parse_instr("x 0x10"), Err(RecordError::Kind("x".into())));
        assert_eq!(parse_instr("0 0xzz"), Err(RecordError::NotHex("0xzz".into())));
        assert_eq!(parse_instr("0 0x"), Err(RecordError::NotHex("0x".into())));
        // wider than a 32-bit address
        assert!(matches!(parse_instr("0 0x100000000"), Err(RecordError::Value { .. })));
    }

    #[test]
    fn rejects_signed_values() {
        assert_eq!(parse_instr("0 +10"), Err(RecordError::NotHex("+10".into())));
        assert_eq!(parse_instr("2 0x+10"), Err(RecordError::NotHex("0x+10".into())));
        assert_eq!(parse_instr("1 -4"), Err(RecordError::NotHex("-4".into())));
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_trace("0 0x0\n\n1 0x4\n2\n", Path::new("t_0.data")).unwrap_err();
        match err {
            TraceError::Parse { line, reason, .. } => {
                assert_eq!(line, 4);
                assert_eq!(reason, RecordError::Shape("2".into()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn skips_blank_lines() {
        let insts = parse_trace("0 0x0\n\n2 0x3\n", Path::new("t_0.data")).unwrap();
        assert_eq!(insts.len(), 2);
    }
}
