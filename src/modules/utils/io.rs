use std::io::{self, Write};

/// Helper function to read a line from stdin
pub fn read_line() -> io::Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(trim_line_ending(&input).to_string())
}

/// Print `label` and read the answer on the same line
pub fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    read_line()
}

/// Read a password without echoing it
pub fn prompt_password(label: &str) -> io::Result<String> {
    rpassword::prompt_password(format!("{}: ", label))
}

// Only the line terminator is stripped; field values are validated as typed
fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(&['\n', '\r'][..])
}
