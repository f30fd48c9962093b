use std::io::{self, BufRead, Write};

/// Prints `question`, reads one line. `None` on end of input.
pub fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<Option<String>> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Only an explicit `y`/`yes` counts as consent.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    let answer = prompt_line(input, output, question)?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_line_strips_newline() {
        let mut input = io::Cursor::new("chrome.exe\r\nnext\n");
        let mut output = Vec::new();

        let answer = prompt_line(&mut input, &mut output, "name: ").unwrap();
        assert_eq!(answer.as_deref(), Some("chrome.exe"));
        assert_eq!(String::from_utf8(output).unwrap(), "name: ");
    }

    #[test]
    fn test_prompt_line_eof() {
        let mut input = io::Cursor::new("");
        assert_eq!(prompt_line(&mut input, &mut io::sink(), "? ").unwrap(), None);
    }

    #[test]
    fn test_confirm() {
        assert!(confirm(&mut io::Cursor::new("y\n"), &mut io::sink(), "? ").unwrap());
        assert!(confirm(&mut io::Cursor::new(" YES \n"), &mut io::sink(), "? ").unwrap());
        assert!(!confirm(&mut io::Cursor::new("n\n"), &mut io::sink(), "? ").unwrap());
        assert!(!confirm(&mut io::Cursor::new(""), &mut io::sink(), "? ").unwrap());
    }
}
