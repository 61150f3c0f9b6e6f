//! One interactive run: prompts, summary, confirmation, configure, report.

use std::io::{BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::error;

use attribute_configurator::{AttributeConfigurator, ConfigurationResult};
use matter_client::Connector;
use types::ConfigurationRequest;

use crate::prompt::{Prompter, RequestInput};
use crate::report;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The operator declined; nothing was sent to the server.
    Cancelled,
    Completed(ConfigurationResult),
}

/// Fill in the request and ask for confirmation. `None` means the operator
/// declined, after "Operation cancelled." was printed.
pub fn confirm_request<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    input: RequestInput,
    server_url: String,
) -> Result<Option<ConfigurationRequest>> {
    let request = input
        .complete(prompter, server_url)
        .context("reading configuration values failed")?;
    report::print_summary(prompter.output(), &request)?;

    if !prompter.confirm("Continue? (y/N)")? {
        writeln!(prompter.output(), "Operation cancelled.")?;
        return Ok(None);
    }
    Ok(Some(request))
}

pub async fn apply<C: Connector>(
    out: &mut impl Write,
    configurator: &AttributeConfigurator<C>,
    request: &ConfigurationRequest,
) -> Result<ConfigurationResult> {
    let result = configurator.configure(request).await;
    report::print_outcome(out, request, &result)?;
    out.flush()?;
    Ok(result)
}

/// The whole run over one input/output pair.
pub async fn run_session<R: BufRead, W: Write, C: Connector>(
    prompter: &mut Prompter<R, W>,
    input: RequestInput,
    server_url: String,
    configurator: &AttributeConfigurator<C>,
) -> Result<SessionOutcome> {
    let Some(request) = confirm_request(prompter, input, server_url)? else {
        return Ok(SessionOutcome::Cancelled);
    };
    let result = apply(prompter.output(), configurator, &request).await?;
    Ok(SessionOutcome::Completed(result))
}

/// Every reported outcome, cancellation included, exits 0. Only errors that
/// kept the run from reporting exit 1.
pub fn exit_code<T>(outcome: &Result<T>) -> ExitCode {
    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "unexpected error");
            ExitCode::FAILURE
        }
    }
}
