//! Harness generation around submitted code.
//!
//! The generated script binds the input payload to [`INPUT_BINDING`], runs the
//! submitted code, calls its `main()` and reports the return value between the
//! result markers on stdout. An exception from `main` is reported on stderr as
//! `ERROR: <message>` followed by the traceback, and the script exits with 1.

use serde_json::{Map, Value};

/// Name under which the input payload is visible to the submitted code.
pub const INPUT_BINDING: &str = "input_data";

/// Line printed before the JSON-encoded return value.
pub const RESULT_START: &str = "RESULT_START";

/// Line printed after the JSON-encoded return value.
pub const RESULT_END: &str = "RESULT_END";

/// Wrap validated code in the execution harness.
///
/// The input is serialized to JSON and embedded as a string literal that the
/// harness decodes with `json.loads`, so no input value can alter the program
/// text.
pub fn wrap(code: &str, input: Option<&Map<String, Value>>) -> String {
    let payload = Value::Object(input.cloned().unwrap_or_default()).to_string();
    let literal = python_string_literal(&payload);

    let mut script = String::with_capacity(code.len() + 1024);
    script.push_str(&format!(
        r#"def _sandbox_load_input():
    import json
    return json.loads({literal})


def _sandbox_track_stdout():
    import sys

    class LineTracker:
        def __init__(self, stream):
            self._stream = stream
            self.at_line_start = True

        def write(self, text):
            if text:
                self.at_line_start = text.endswith("\n")
            return self._stream.write(text)

        def __getattr__(self, name):
            return getattr(self._stream, name)

    sys.stdout = LineTracker(sys.stdout)
    return sys.stdout


{INPUT_BINDING} = _sandbox_load_input()
_sandbox_stdout = _sandbox_track_stdout()
del _sandbox_load_input, _sandbox_track_stdout

"#
    ));
    script.push_str(code);
    if !code.ends_with('\n') {
        script.push('\n');
    }
    script.push_str(&format!(
        r#"

def _sandbox_run():
    import json
    import sys
    import traceback

    try:
        payload = json.dumps(main())
    except Exception as exc:
        print("ERROR:", str(exc), file=sys.stderr)
        traceback.print_exc(file=sys.stderr)
        sys.exit(1)
    # The markers must start their own lines even after `print(..., end="")`.
    if not _sandbox_stdout.at_line_start:
        _sandbox_stdout.write("\n")
    print("{RESULT_START}", file=_sandbox_stdout)
    print(payload, file=_sandbox_stdout)
    print("{RESULT_END}", file=_sandbox_stdout)


if __name__ == "__main__":
    _sandbox_run()
"#
    ));
    script
}

/// Quote text as a Python string literal.
///
/// A JSON string is a valid Python string literal: every escape JSON emits
/// (`\"`, `\\`, `\n`, `\uXXXX`, ...) means the same thing to Python.
fn python_string_literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
