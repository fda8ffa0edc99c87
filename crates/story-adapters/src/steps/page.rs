//! Paso 4: sinopsis de una página (cinco párrafos, uno por oración).

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{word_count, PageSynopsis, ParagraphSummary};

use super::util::{normalize, shape_issue, with_guidance};

/// Mínimo de palabras por párrafo.
pub const MIN_PARAGRAPH_WORDS: usize = 50;

const SYSTEM: &str = "You are a story development assistant. You expand each sentence of a summary paragraph into a \
                      full paragraph. Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Summary paragraph, sentence by sentence:\n{sentences}\n\nExpand each sentence into one \
                             paragraph of at least 50 words, keeping the disasters where they are. Respond with \
                             JSON:\n{\"paragraphs\": {\"1\": \"...\", \"2\": \"...\", \"3\": \"...\", \"4\": \
                             \"...\", \"5\": \"...\"}}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct PageStep;

impl StepDefinition for PageStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let summary = ctx.parent_typed::<ParagraphSummary>(2)?;
        let sentences = summary.sentences
                               .iter()
                               .enumerate()
                               .map(|(i, s)| format!("{}. {s}", i + 1))
                               .collect::<Vec<_>>()
                               .join("\n");
        let user = USER_TEMPLATE.replace("{sentences}", &sentences);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<PageSynopsis>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(synopsis) = shape_issue::<PageSynopsis>(payload, &mut report, "one-page synopsis") else {
            return report;
        };
        for key in PageSynopsis::KEYS {
            match synopsis.paragraph(key) {
                None => report.push("missing_field",
                                    format!("paragraph {key} is missing"),
                                    format!("add paragraph {key}, expanding sentence {key} of the summary")),
                Some(text) => {
                    let words = word_count(text);
                    if words < MIN_PARAGRAPH_WORDS {
                        report.push("word_count",
                                    format!("paragraph {key} has {words} words, the minimum is {MIN_PARAGRAPH_WORDS}"),
                                    format!("expand paragraph {key} to at least {MIN_PARAGRAPH_WORDS} words"));
                    }
                }
            }
        }
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let synopsis: PageSynopsis = serde_json::from_value(payload.clone()).ok()?;
        Some(PageSynopsis::KEYS.iter()
                               .filter_map(|k| synopsis.paragraph(k))
                               .collect::<Vec<_>>()
                               .join("\n\n"))
    }
}
