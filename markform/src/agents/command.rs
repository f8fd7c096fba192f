//! Agent that shells out to a configured command once per turn.
//!
//! The command receives a rendered prompt on stdin and must print a JSON
//! array of patches on stdout. Output is schema-checked before it is
//! deserialized, so malformed output fails the turn with a message the
//! operator can act on rather than a serde type error.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use minijinja::{Environment, context};
use serde_json::Value;

use crate::harness::{Agent, AgentTurn};
use crate::io::process::run_command_with_timeout;
use crate::model::DEFAULT_ROLE;
use crate::patch::Patch;

const FILL_TEMPLATE: &str = include_str!("prompts/fill.md");
const PATCHES_SCHEMA: &str = include_str!("../../schemas/patches.schema.json");

pub struct CommandAgent {
    command: Vec<String>,
    role: String,
    timeout: Duration,
    output_limit_bytes: usize,
    env: Environment<'static>,
}

impl CommandAgent {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Result<Self> {
        if command.is_empty() {
            bail!("agent command must not be empty");
        }
        let mut env = Environment::new();
        env.add_template("fill", FILL_TEMPLATE)
            .context("fill template should be valid")?;
        Ok(Self {
            command,
            role: DEFAULT_ROLE.to_string(),
            timeout,
            output_limit_bytes,
            env,
        })
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    fn render_prompt(&self, turn: &AgentTurn<'_>) -> Result<String> {
        let template = self.env.get_template("fill")?;
        let rendered = template.render(context! {
            turn => turn.turn,
            role => self.role,
            issues => turn.issues,
            form_text => turn.form_text,
        })?;
        Ok(rendered)
    }
}

impl Agent for CommandAgent {
    fn propose(&mut self, turn: &AgentTurn<'_>) -> Result<Vec<Patch>> {
        let prompt = self.render_prompt(turn)?;
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )?;
        if output.timed_out {
            bail!(
                "agent command timed out after {}s",
                self.timeout.as_secs()
            );
        }
        if !output.status.success() {
            bail!(
                "agent command exited with {}: {}",
                output.status,
                output.stderr_text().trim()
            );
        }
        parse_patches(&output.stdout)
    }
}

/// Parse and schema-check the agent's stdout.
pub fn parse_patches(stdout: &[u8]) -> Result<Vec<Patch>> {
    let text = std::str::from_utf8(stdout).context("agent output is not UTF-8")?;
    let instance: Value = serde_json::from_str(text.trim()).context("parse agent output JSON")?;
    validate_against_schema(&instance)?;
    let patches: Vec<Patch> =
        serde_json::from_value(instance).context("deserialize patches")?;
    Ok(patches)
}

fn validate_against_schema(instance: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(PATCHES_SCHEMA).context("parse bundled patches schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile patches schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "agent output failed schema validation:\n- {}",
            messages.join("\n- ")
        ));
    }
    Ok(())
}
