//! Line loop of the host transport.
//!
//! One request line in, one reply line out, strictly in order. Commands run
//! to completion before the next line is read.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use qpsess_bridge::Bridge;
use qpsess_common::ipc::{self, Reply};
use qpsess_common::QpSolver;
use tracing::{debug, warn};

/// Error kind reported for lines that are not a valid request.
pub const PROTOCOL_ERROR: &str = "protocol";

/// Counters for one served stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// Non-blank lines answered.
    pub requests: usize,
    /// Replies that carried an error.
    pub errors: usize,
}

/// Answers every request on `reader` until end of input.
///
/// Returns `Err` only when reading or writing fails; command failures become
/// error replies.
pub fn serve<S, R, W>(bridge: &mut Bridge<S>, reader: R, mut writer: W) -> Result<ServeStats>
where
    S: QpSolver,
    R: BufRead,
    W: Write,
{
    let mut stats = ServeStats::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(bridge, &line, index + 1);
        stats.requests += 1;
        if !reply.is_ok() {
            stats.errors += 1;
        }
        ipc::write_reply(&reply, &mut writer).context("Failed to write reply")?;
    }
    Ok(stats)
}

/// Answers a single request line. `line_no` is only used for logging.
pub fn handle_line<S: QpSolver>(bridge: &mut Bridge<S>, line: &str, line_no: usize) -> Reply {
    let request = match ipc::parse_request(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(line = line_no, "malformed request: {}", e);
            return Reply::error(PROTOCOL_ERROR, format!("malformed request on line {line_no}: {e}"));
        }
    };

    match bridge.dispatch(&request.command, &request.args) {
        Ok(values) => Reply::Ok(values),
        Err(err) => {
            debug!(line = line_no, command = %request.command, kind = err.kind(), "{}", err);
            Reply::error(err.kind(), err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpsess_clarabel::ClarabelSolver;
    use qpsess_common::ipc::parse_reply;
    use qpsess_common::HostValue;
    use std::io::{self, Cursor, Read};

    fn replies(output: &[u8]) -> Vec<Reply> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| parse_reply(l).unwrap())
            .collect()
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut bridge = Bridge::new(ClarabelSolver::new());
        let input = "\n{\"command\":\"new\",\"args\":[]}\n   \n\n";
        let mut out = Vec::new();

        let stats = serve(&mut bridge, Cursor::new(input), &mut out).unwrap();

        assert_eq!(stats, ServeStats { requests: 1, errors: 0 });
        let replies = replies(&out);
        assert_eq!(replies.len(), 1);
        match &replies[0] {
            Reply::Ok(values) => assert!(matches!(values[..], [HostValue::Int64(_)])),
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(bridge.live_sessions(), 1);
    }

    #[test]
    fn test_malformed_line_does_not_stop_the_stream() {
        let mut bridge = Bridge::new(ClarabelSolver::new());
        let input = "{oops\n{\"command\":\"new\"}\n";
        let mut out = Vec::new();

        let stats = serve(&mut bridge, Cursor::new(input), &mut out).unwrap();

        assert_eq!(stats, ServeStats { requests: 2, errors: 1 });
        let replies = replies(&out);
        match &replies[0] {
            Reply::Error(e) => {
                assert_eq!(e.kind, PROTOCOL_ERROR);
                assert!(e.message.contains("line 1"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert!(replies[1].is_ok());
    }

    #[test]
    fn test_bridge_errors_carry_their_kind() {
        let mut bridge = Bridge::new(ClarabelSolver::new());
        let reply = handle_line(&mut bridge, r#"{"command":"frobnicate","args":[]}"#, 1);
        match reply {
            Reply::Error(e) => assert_eq!(e.kind, "unknown_command"),
            other => panic!("unexpected reply {other:?}"),
        }

        let reply = handle_line(&mut bridge, r#"{"command":"solve","args":[{"int64":99}]}"#, 2);
        match reply {
            Reply::Error(e) => assert_eq!(e.kind, "invalid_handle"),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_overflowing_shape_gets_an_error_reply() {
        let mut bridge = Bridge::new(ClarabelSolver::new());
        let handle = match handle_line(&mut bridge, r#"{"command":"new"}"#, 1) {
            Reply::Ok(mut values) => values.remove(0),
            other => panic!("unexpected reply {other:?}"),
        };
        let HostValue::Int64(raw) = handle else {
            panic!("handle {handle:?}");
        };

        let line = format!(
            r#"{{"command":"setup","args":[{{"int64":{raw}}},"empty","empty",{{"matrix":{{"rows":{},"cols":2,"data":[]}}}},{{"matrix":{{"rows":0,"cols":1,"data":[]}}}},{{"matrix":{{"rows":0,"cols":1,"data":[]}}}},"empty","empty"]}}"#,
            usize::MAX
        );
        match handle_line(&mut bridge, &line, 2) {
            Reply::Error(e) => assert_eq!(e.kind, "dimension_mismatch"),
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(bridge.live_sessions(), 1);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_read_failure_is_an_error() {
        let mut bridge = Bridge::new(ClarabelSolver::new());
        let reader = io::BufReader::new(FailingReader);
        let err = serve(&mut bridge, reader, Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read request"));
    }
}
