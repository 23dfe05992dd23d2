//! Line-oriented console presentation.
//!
//! Renders the current step with its checklist and answers the completion
//! prompts from a line reader. Generic over the reader and writer so tests can
//! drive it with in-memory buffers.

use std::fmt::Display;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::procedure::{Procedure, Requirement, Step};
use crate::core::review::Reviewer;
use crate::core::types::{Confirmation, TargetId};

const STEP_TEMPLATE: &str = include_str!("views/step.txt");

/// One line of operator input at the checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Toggle the requirement at this zero-based position.
    Toggle(usize),
    Next,
    Previous,
    /// Switch to the procedure assigned to another target.
    Switch(TargetId),
    Quit,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse one input line. Numbers are one-based as displayed.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "n" | "next" => return Command::Next,
            "p" | "prev" | "previous" => return Command::Previous,
            "q" | "quit" => return Command::Quit,
            "" | "?" | "h" | "help" => return Command::Help,
            _ => {}
        }
        if let Some((word, id)) = trimmed.split_once(char::is_whitespace)
            && matches!(word.to_ascii_lowercase().as_str(), "t" | "target")
        {
            return match id.trim().parse::<i32>() {
                Ok(id) => Command::Switch(TargetId::new(id)),
                Err(_) => Command::Unknown(trimmed.to_string()),
            };
        }
        match trimmed.parse::<usize>() {
            Ok(number) if number > 0 => Command::Toggle(number - 1),
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

pub const HELP: &str = "commands: <number> toggle requirement, n next step, p previous step, t <id> switch target, q quit";

#[derive(Debug, Serialize)]
struct RequirementView<'a> {
    label: &'a str,
    checked: bool,
}

/// Step renderer around minijinja.
#[derive(Debug)]
pub struct StepView {
    env: Environment<'static>,
}

impl StepView {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("step.txt", STEP_TEMPLATE)
            .context("compile step template")?;
        Ok(Self { env })
    }

    /// Render step `index` of `procedure` with the checklist as currently displayed.
    pub fn render(&self, procedure: &Procedure, index: usize, checked: &[bool]) -> Result<String> {
        let step = procedure
            .steps
            .get(index)
            .with_context(|| format!("step index {index} out of bounds"))?;
        let requirements: Vec<RequirementView<'_>> = step
            .requirements
            .iter()
            .enumerate()
            .map(|(idx, req)| RequirementView {
                label: req.label(),
                checked: checked.get(idx).copied().unwrap_or(req.completed),
            })
            .collect();
        let template = self.env.get_template("step.txt")?;
        let rendered = template.render(context! {
            number => index + 1,
            total => procedure.steps.len(),
            name => step.name.trim(),
            description => step.description.trim(),
            equipment => step.equipment_needed.as_deref().unwrap_or_default(),
            safety => &procedure.safety_requirements,
            requirements => &requirements,
        })?;
        Ok(rendered)
    }
}

pub struct Console<R, W> {
    input: R,
    output: W,
    view: StepView,
    comment_prompt: String,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, comment_prompt: impl Into<String>) -> Result<Self> {
        Ok(Self {
            input,
            output,
            view: StepView::new()?,
            comment_prompt: comment_prompt.into(),
        })
    }

    pub fn show_step(
        &mut self,
        procedure: &Procedure,
        index: usize,
        checked: &[bool],
    ) -> Result<()> {
        let rendered = self.view.render(procedure, index, checked)?;
        write!(self.output, "\n{rendered}").context("write step")?;
        Ok(())
    }

    pub fn say(&mut self, line: impl Display) -> Result<()> {
        writeln!(self.output, "{line}").context("write to console")
    }

    /// Read the next checklist command; `None` at end of input.
    pub fn read_command(&mut self) -> Result<Option<Command>> {
        Ok(self.prompt("> ")?.map(|line| Command::parse(&line)))
    }

    /// Ask before a target switch throws away the loaded procedure; end of input means no.
    pub fn confirm_switch(&mut self, target: TargetId) -> Result<bool> {
        self.say(format!(
            "Switch to target {target}? All unsaved test results will be lost. [y/n]"
        ))?;
        Ok(self.choose(&['y', 'n'])? == Some('y'))
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush().context("flush console")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read console input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Ask until one of `choices` is answered; `None` at end of input.
    fn choose(&mut self, choices: &[char]) -> Result<Option<char>> {
        loop {
            let Some(answer) = self.prompt("> ")? else {
                return Ok(None);
            };
            let mut chars = answer.trim().chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                let first = first.to_ascii_lowercase();
                if choices.contains(&first) {
                    return Ok(Some(first));
                }
            }
            let options: Vec<String> = choices.iter().map(char::to_string).collect();
            self.say(format!("please answer {}", options.join("/")))?;
        }
    }
}

impl<R: BufRead, W: Write> Reviewer for Console<R, W> {
    fn confirm_save(&mut self) -> Result<bool> {
        self.say("Save the test results? [y/n]")?;
        Ok(self.choose(&['y', 'n'])? == Some('y'))
    }

    fn confirm_unmet(&mut self, step: &Step, requirement: &Requirement) -> Result<Confirmation> {
        self.say(format!(
            "\n{}: \"{}\" is not checked.",
            step.name.trim(),
            requirement.label()
        ))?;
        self.say("  y = it was not completed, add a comment")?;
        self.say("  n = it was completed, mark it done")?;
        self.say("  c = cancel the review and go back to the checklist")?;
        Ok(match self.choose(&['y', 'n', 'c'])? {
            Some('y') => Confirmation::Unmet,
            Some('n') => Confirmation::Met,
            _ => Confirmation::Abort,
        })
    }

    fn collect_comment(
        &mut self,
        _step: &Step,
        requirement: &Requirement,
    ) -> Result<Option<String>> {
        let prompt = self.comment_prompt.clone();
        self.say(format!("\"{}\": {prompt}", requirement.label()))?;
        let comment = self
            .prompt("> ")?
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty());
        Ok(comment)
    }
}
