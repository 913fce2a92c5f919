use chrono::NaiveDate;
use minijinja::{context, path_loader, Environment};
use parley_core::{ModelChoice, ParleyError, ParleyResult, ResponseStyle};
use std::path::Path;
use tracing::info;

const SYSTEM_TEMPLATE: &str = "system.md";

const EMBEDDED: [(&str, &str); 4] = [
    (SYSTEM_TEMPLATE, include_str!("../prompts/system.md")),
    (
        "3-7-sonnet_extras.md",
        include_str!("../prompts/3-7-sonnet_extras.md"),
    ),
    (
        "3-5-sonnet_extras.md",
        include_str!("../prompts/3-5-sonnet_extras.md"),
    ),
    (
        "3-5-haiku_extras.md",
        include_str!("../prompts/3-5-haiku_extras.md"),
    ),
];

/// Name of the per-model extras template.
pub fn extras_template(model: ModelChoice) -> &'static str {
    match model {
        ModelChoice::Claude37Sonnet => "3-7-sonnet_extras.md",
        ModelChoice::Claude35Sonnet => "3-5-sonnet_extras.md",
        ModelChoice::Claude35Haiku => "3-5-haiku_extras.md",
    }
}

/// Renders system prompts from `system.md` and the per-model extras.
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    /// Renderer over the templates compiled into the binary.
    pub fn embedded() -> ParleyResult<Self> {
        let mut env = Environment::new();
        for (name, source) in EMBEDDED {
            env.add_template(name, source).map_err(template_error)?;
        }
        Ok(Self { env })
    }

    /// Renderer that reads templates from `dir`, falling back to the embedded
    /// copy for any file the directory does not provide.
    pub fn from_dir(dir: &Path) -> ParleyResult<Self> {
        if !dir.is_dir() {
            return Err(ParleyError::Config(format!(
                "Prompt directory {} does not exist",
                dir.display()
            )));
        }

        let mut env = Environment::new();
        env.set_loader(path_loader(dir));
        for (name, source) in EMBEDDED {
            if !dir.join(name).is_file() {
                env.add_template(name, source).map_err(template_error)?;
            }
        }
        info!(dir = %dir.display(), "Loaded prompt templates");
        Ok(Self { env })
    }

    /// `system.md` rendered with the model's extras and the given date.
    pub fn base_prompt(&self, model: ModelChoice, date: NaiveDate) -> ParleyResult<String> {
        let extras = self
            .env
            .get_template(extras_template(model))
            .and_then(|t| t.render(context! {}))
            .map_err(template_error)?;

        self.env
            .get_template(SYSTEM_TEMPLATE)
            .and_then(|t| {
                t.render(context! {
                    extras => extras,
                    current_date => date.format("%B %d, %Y").to_string(),
                })
            })
            .map_err(template_error)
    }

    /// Base prompt plus the style directive, separated by a blank line.
    pub fn system_prompt(
        &self,
        model: ModelChoice,
        style: &ResponseStyle,
        date: NaiveDate,
    ) -> ParleyResult<String> {
        let base = self.base_prompt(model, date)?;
        Ok(match style.directive() {
            Some(directive) => format!("{base}\n\n{directive}"),
            None => base,
        })
    }
}

fn template_error(e: minijinja::Error) -> ParleyError {
    ParleyError::Template(e.to_string())
}
