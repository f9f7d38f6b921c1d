//! Operator prompts
//!
//! Every decision in the repair loop goes through an `Operator`. The console
//! implementation talks to the terminal; tests script the answers.

use std::io::{self, BufRead, Write};

/// The human in the loop
pub trait Operator {
    /// Display text to the operator
    fn show(&mut self, text: &str);

    /// Ask for one line of free text, without the trailing newline.
    ///
    /// End of input is `io::ErrorKind::UnexpectedEof`.
    fn ask(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask a yes/no question until the answer is exactly "yes" or "no",
    /// ignoring case and surrounding whitespace.
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let prompt = format!("{} (yes/no): ", question);
        loop {
            let answer = self.ask(&prompt)?;
            match answer.trim().to_lowercase().as_str() {
                "yes" => return Ok(true),
                "no" => return Ok(false),
                _ => self.show("Invalid choice. Please enter 'yes' or 'no'. Try again."),
            }
        }
    }
}

impl<O: Operator + ?Sized> Operator for &mut O {
    fn show(&mut self, text: &str) {
        (**self).show(text)
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        (**self).ask(prompt)
    }
}

/// Operator on the process's stdin/stdout
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn show(&mut self, text: &str) {
        println!("{}", text);
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "operator input closed",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Script {
        answers: VecDeque<String>,
        shown: Vec<String>,
    }

    impl Operator for Script {
        fn show(&mut self, text: &str) {
            self.shown.push(text.to_string());
        }

        fn ask(&mut self, _prompt: &str) -> io::Result<String> {
            self.answers
                .pop_front()
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }
    }

    fn script(answers: &[&str]) -> Script {
        Script {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Script::default()
        }
    }

    #[test]
    fn test_confirm_is_case_insensitive() {
        assert!(script(&["  Yes "]).confirm("Go?").unwrap());
        assert!(!script(&["NO"]).confirm("Go?").unwrap());
    }

    #[test]
    fn test_confirm_reprompts_on_anything_else() {
        let mut op = script(&["y", "nope", "yes please", "no"]);
        assert!(!op.confirm("Go?").unwrap());
        assert_eq!(op.shown.len(), 3);
    }

    #[test]
    fn test_confirm_fails_when_input_closes() {
        let err = script(&["maybe"]).confirm("Go?").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
