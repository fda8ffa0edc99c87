//! Paso 1: logline de una oración (25 palabras como máximo).

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{word_count, Logline, StoryCategory};

use super::util::{normalize, require, shape_issue, with_guidance};

/// Máximo de palabras permitido en el logline.
pub const MAX_LOGLINE_WORDS: usize = 25;

const SYSTEM: &str = "You are a story development assistant. You compress a story into a single selling sentence. \
                      Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Story brief:\n{brief}\n\nPositioning:\n{category}\n\nWrite a one-sentence summary of at \
                             most 25 words: no character names, lead + role + goal + opposition. Respond with JSON:\n\
                             {\"logline\": \"<sentence>\", \"word_count\": <n>, \"components\": {\"lead\": \"...\", \
                             \"role\": \"...\", \"goal\": \"...\", \"opposition\": \"...\"}}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct LoglineStep;

impl StepDefinition for LoglineStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let category = ctx.parent_typed::<StoryCategory>(0)?;
        let user = USER_TEMPLATE.replace("{brief}", &ctx.seed)
                                .replace("{category}",
                                         &format!("{} — {}", category.category, category.story_kind));
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        let parsed = normalize::<Logline>(lenient_json(raw));
        if parsed.degraded {
            return parsed;
        }
        // recalcular el conteo: el modelo suele reportarlo mal
        match serde_json::from_value::<Logline>(parsed.value.clone()) {
            Ok(logline) => {
                let corrected = Logline::new(logline.logline, logline.components);
                match serde_json::to_value(&corrected) {
                    Ok(value) => ParsedPayload::clean(value),
                    Err(_) => parsed,
                }
            }
            Err(_) => parsed,
        }
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(logline) = shape_issue::<Logline>(payload, &mut report, "logline") else {
            return report;
        };
        require(&mut report, "logline", &logline.logline);
        let words = word_count(&logline.logline);
        if words > MAX_LOGLINE_WORDS {
            report.push("word_count",
                        format!("logline has {words} words, the maximum is {MAX_LOGLINE_WORDS}"),
                        format!("rewrite the sentence with {MAX_LOGLINE_WORDS} words or fewer"));
        }
        require(&mut report, "components.lead", &logline.components.lead);
        require(&mut report, "components.role", &logline.components.role);
        require(&mut report, "components.goal", &logline.components.goal);
        require(&mut report, "components.opposition", &logline.components.opposition);
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let logline: Logline = serde_json::from_value(payload.clone()).ok()?;
        Some(format!("{} ({} words)", logline.logline, logline.word_count))
    }
}
