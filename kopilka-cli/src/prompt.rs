use anyhow::{Result, bail};
use std::io::{self, Write};

pub fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        bail!("no input for {label}");
    }
    Ok(s.trim().to_string())
}

/// Use the flag value when given, otherwise ask.
pub fn or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt(label),
    }
}

pub fn prompt_secret(label: &str) -> Result<String> {
    // Plain stdin: works with piped input as well as a terminal.
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        bail!("no input for {label}");
    }
    Ok(s.trim_end_matches(['\r', '\n']).to_string())
}
