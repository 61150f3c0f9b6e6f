//! Operator-facing text around a configuration run.

use std::io::{self, Write};

use attribute_configurator::{ConfigurationResult, FailureReason};
use types::ConfigurationRequest;

fn rule(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(50))
}

pub fn print_intro(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Matter Device Attribute Configuration Tool")?;
    rule(out)?;
    writeln!(out)?;
    writeln!(out, "This tool allows you to configure Matter device attributes")?;
    writeln!(out, "via the Matter server WebSocket API.")?;
    writeln!(out)?;
    writeln!(
        out,
        "Note: Make sure the Matter Server add-on is running in Home Assistant."
    )?;
    writeln!(out, "If connection fails, you may need to:")?;
    writeln!(
        out,
        "  1. Go to Settings -> Add-ons -> Matter Server -> Configuration"
    )?;
    writeln!(out, "  2. Under 'Network', add port 5580 to expose the WebSocket")?;
    writeln!(out, "  3. Restart the Matter Server add-on")?;
    writeln!(out)
}

pub fn print_summary(out: &mut impl Write, request: &ConfigurationRequest) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Configuration:")?;
    writeln!(out, "  Matter Server URL: {}", request.server_url)?;
    writeln!(out, "  Node ID: {}", request.node_id)?;
    writeln!(out, "  Endpoint ID: {}", request.path.endpoint_id)?;
    writeln!(out, "  Cluster ID: {}", request.path.cluster_id)?;
    writeln!(out, "  Attribute ID: {}", request.path.attribute_id)?;
    writeln!(out, "  Attribute Value: {}", request.desired_value)?;
    writeln!(out)?;
    writeln!(
        out,
        "Attempting to set attribute {} to {}...",
        request.path, request.desired_value
    )?;
    writeln!(out, "This will change the device attribute value.")?;
    writeln!(out)
}

pub fn print_outcome(
    out: &mut impl Write,
    request: &ConfigurationRequest,
    result: &ConfigurationResult,
) -> io::Result<()> {
    writeln!(out)?;
    rule(out)?;
    match result {
        ConfigurationResult::Success { value } => {
            writeln!(out, "✓ Configuration completed successfully!")?;
            writeln!(out, "Device attribute {} is now set to {value}.", request.path)?;
            writeln!(
                out,
                "You may need to wait a few minutes for the change to take effect."
            )?;
        }
        ConfigurationResult::VerificationMismatch { expected, observed } => {
            writeln!(out, "✗ Configuration could not be verified!")?;
            writeln!(
                out,
                "The write was accepted but the device reports {observed} (expected {expected})."
            )?;
            writeln!(
                out,
                "The device may clamp, round or reject out-of-range values."
            )?;
        }
        ConfigurationResult::Failure(reason) => {
            writeln!(out, "✗ Configuration failed: {reason}")?;
            writeln!(out, "Please check the logs above for error details.")?;
            if *reason == FailureReason::VerificationReadEmpty {
                writeln!(out, "The value may still have been set.")?;
            }
            writeln!(out, "Common issues:")?;
            writeln!(out, "  - Matter server not running or not accessible")?;
            writeln!(out, "  - Incorrect node/endpoint/cluster/attribute IDs")?;
            writeln!(out, "  - Device doesn't support this attribute")?;
            writeln!(out, "  - Network connectivity issues")?;
        }
    }
    rule(out)
}
