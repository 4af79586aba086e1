use std::io::{self, BufRead};
use std::path::Path;

use anyhow::{Context, Result};

use crate::args::Cli;

/// Gather addresses from the positional arguments, `--input` and `--stdin`,
/// in that order.
pub fn collect_addresses(cli: &Cli) -> Result<Vec<String>> {
    let mut addresses = parse_lines(cli.emails.iter().map(String::as_str));

    if let Some(path) = &cli.input {
        addresses.extend(read_file(path)?);
    }

    if cli.stdin {
        let lines = io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .context("read stdin")?;
        addresses.extend(parse_lines(lines.iter().map(String::as_str)));
    }

    Ok(addresses)
}

fn read_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read input file {}", path.display()))?;
    Ok(parse_lines(content.lines()))
}

/// Trim each line and drop blank ones, preserving order.
pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_drops_blank_lines() {
        let content = "  good@example.com \r\n\n\t\nbad-syntax\nnodomain@doesnotexist.invalidtld\n";
        assert_eq!(
            parse_lines(content.lines()),
            [
                "good@example.com",
                "bad-syntax",
                "nodomain@doesnotexist.invalidtld"
            ]
        );
    }

    #[test]
    fn keeps_duplicates_in_order() {
        assert_eq!(parse_lines(["b@x.io", "a@x.io", "b@x.io"]), ["b@x.io", "a@x.io", "b@x.io"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_file(Path::new("/nonexistent/emails.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/emails.txt"));
    }
}
