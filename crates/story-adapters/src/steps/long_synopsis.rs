//! Paso 6: sinopsis larga (2.500–3.000 palabras). Permite fallback.

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{word_count, LongSynopsis, PageSynopsis, ParagraphSummary};

use super::util::{normalize, shape_issue, with_guidance};

/// Rango de palabras exigido a la sinopsis larga.
pub const MIN_WORDS: usize = 2_500;
pub const MAX_WORDS: usize = 3_000;

const SYSTEM: &str = "You are a story development assistant. You expand a one-page synopsis into a long narrative \
                      synopsis. Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "One-page synopsis:\n{page}\n\nMoral premise: {moral}\n\nExpand into a continuous \
                             narrative synopsis of 2500 to 3000 words covering the whole story. Respond with \
                             JSON:\n{\"long_synopsis\": \"...\"}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct LongSynopsisStep;

impl StepDefinition for LongSynopsisStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let paragraph = ctx.parent_typed::<ParagraphSummary>(2)?;
        let page = ctx.parent_typed::<PageSynopsis>(4)?;
        let page_text = PageSynopsis::KEYS.iter()
                                          .filter_map(|k| page.paragraph(k))
                                          .collect::<Vec<_>>()
                                          .join("\n\n");
        let user = USER_TEMPLATE.replace("{page}", &page_text)
                                .replace("{moral}", &paragraph.moral_premise);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<LongSynopsis>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(synopsis) = shape_issue::<LongSynopsis>(payload, &mut report, "long synopsis") else {
            return report;
        };
        let words = word_count(&synopsis.long_synopsis);
        if !(MIN_WORDS..=MAX_WORDS).contains(&words) {
            report.push("word_count",
                        format!("long synopsis has {words} words, the required range is {MIN_WORDS}-{MAX_WORDS}"),
                        format!("rewrite the synopsis to land between {MIN_WORDS} and {MAX_WORDS} words"));
        }
        report
    }

    /// Fallback estructuralmente mínimo: la página del paso 4 expandida de
    /// forma determinista con la premisa moral.
    fn fallback(&self, ctx: &StepContext) -> Option<Value> {
        let paragraph = ctx.parent_typed::<ParagraphSummary>(2).ok()?;
        let page = ctx.parent_typed::<PageSynopsis>(4).ok()?;
        let mut sections: Vec<String> = Vec::new();
        for key in PageSynopsis::KEYS {
            if let Some(text) = page.paragraph(key) {
                sections.push(format!("Act movement {key}. {text}"));
            }
        }
        sections.push(format!("Throughout, the story argues its moral premise: {}", paragraph.moral_premise));
        serde_json::to_value(LongSynopsis { long_synopsis: sections.join("\n\n") }).ok()
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let synopsis: LongSynopsis = serde_json::from_value(payload.clone()).ok()?;
        Some(synopsis.long_synopsis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn ctx() -> StepContext {
        StepContext { seed: "seed".into(),
                      guidance: None,
                      parents: BTreeMap::new(),
                      upstream_hash: "up".into() }
    }

    fn text_of(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    #[test]
    fn word_bounds_are_inclusive() {
        for words in [2_500usize, 3_000] {
            let payload = json!({"long_synopsis": text_of(words)});
            assert!(LongSynopsisStep.validate(&payload, &ctx()).is_ok(), "{words} words must pass");
        }
        for words in [2_499usize, 3_001] {
            let payload = json!({"long_synopsis": text_of(words)});
            assert!(!LongSynopsisStep.validate(&payload, &ctx()).is_ok(), "{words} words must fail");
        }
    }
}
