//! Interactive input for identifiers missing from the command line.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use types::{AttributePath, ConfigurationRequest};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask until the answer parses. Closed input is an error rather than an
    /// endless loop.
    pub fn number<T: FromStr>(&mut self, label: &str) -> io::Result<T> {
        loop {
            let line = self.ask(label)?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "input closed while prompting")
            })?;
            let answer = line.trim();

            if answer.is_empty() {
                writeln!(self.output, "Value is required. Please enter a number.")?;
                continue;
            }
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.output, "Please enter a valid number.")?,
            }
        }
    }

    /// `true` only for answers starting with `y` or `Y`.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(question)?.unwrap_or_default();
        Ok(answer.trim_start().to_ascii_lowercase().starts_with('y'))
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Identifiers given as positional arguments; gaps are prompted for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInput {
    pub node_id: Option<u64>,
    pub endpoint_id: Option<u16>,
    pub cluster_id: Option<u32>,
    pub attribute_id: Option<u32>,
    pub attribute_value: Option<i64>,
}

impl RequestInput {
    pub fn complete<R: BufRead, W: Write>(
        self,
        prompter: &mut Prompter<R, W>,
        server_url: impl Into<String>,
    ) -> io::Result<ConfigurationRequest> {
        let node_id = fill(self.node_id, prompter, "Enter Matter node ID")?;
        let endpoint_id = fill(self.endpoint_id, prompter, "Enter endpoint ID")?;
        let cluster_id = fill(self.cluster_id, prompter, "Enter cluster ID")?;
        let attribute_id = fill(self.attribute_id, prompter, "Enter attribute ID")?;
        let desired_value = fill(
            self.attribute_value,
            prompter,
            "Enter desired attribute value",
        )?;

        Ok(ConfigurationRequest::new(
            node_id,
            AttributePath::new(endpoint_id, cluster_id, attribute_id),
            desired_value,
            server_url,
        ))
    }
}

fn fill<T: FromStr, R: BufRead, W: Write>(
    given: Option<T>,
    prompter: &mut Prompter<R, W>,
    label: &str,
) -> io::Result<T> {
    match given {
        Some(value) => Ok(value),
        None => prompter.number(label),
    }
}
