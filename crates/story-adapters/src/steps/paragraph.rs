//! Paso 2: párrafo de cinco oraciones con tres desastres y premisa moral.

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{Logline, ParagraphSummary};

use super::util::{normalize, require, shape_issue, with_guidance};

/// Cantidad exacta de oraciones del párrafo.
pub const SENTENCE_COUNT: usize = 5;
/// Cantidad exacta de desastres.
pub const DISASTER_COUNT: usize = 3;

const SYSTEM: &str = "You are a story development assistant. You expand a logline into a five-sentence paragraph \
                      with three escalating disasters. Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Logline:\n{logline}\n\nWrite a five-sentence summary paragraph: sentence 1 sets up, \
                             sentences 2-4 are the three disasters (each disaster sentence must use the word \
                             'forces' or 'must'), sentence 5 resolves. State the moral premise that pivots at the \
                             second disaster. Respond with JSON:\n{\"paragraph\": \"...\", \"sentences\": \
                             [\"s1\", \"s2\", \"s3\", \"s4\", \"s5\"], \"moral_premise\": \"...\", \"disasters\": \
                             [\"d1\", \"d2\", \"d3\"]}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct ParagraphStep;

fn has_compulsion_marker(sentence: &str) -> bool {
    let s = sentence.to_ascii_lowercase();
    s.contains("forces") || s.contains("must")
}

impl StepDefinition for ParagraphStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let logline = ctx.parent_typed::<Logline>(1)?;
        let user = USER_TEMPLATE.replace("{logline}", &logline.logline);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<ParagraphSummary>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(summary) = shape_issue::<ParagraphSummary>(payload, &mut report, "paragraph summary") else {
            return report;
        };
        require(&mut report, "paragraph", &summary.paragraph);
        require(&mut report, "moral_premise", &summary.moral_premise);
        if summary.sentences.len() != SENTENCE_COUNT {
            report.push("sentence_count",
                        format!("paragraph has {} sentences, exactly {SENTENCE_COUNT} are required",
                                summary.sentences.len()),
                        format!("restructure the paragraph into exactly {SENTENCE_COUNT} sentences"));
        }
        if summary.disasters.len() != DISASTER_COUNT {
            report.push("cardinality",
                        format!("{} disasters listed, exactly {DISASTER_COUNT} are required", summary.disasters.len()),
                        format!("list exactly {DISASTER_COUNT} disasters, one per middle sentence"));
        }
        for (i, disaster) in summary.disasters.iter().enumerate() {
            if !has_compulsion_marker(disaster) {
                report.push("missing_marker",
                            format!("disaster {} does not state compulsion ('forces'/'must')", i + 1),
                            "rewrite the disaster so it forces the lead into the next act ('forces' or 'must')");
            }
        }
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let summary: ParagraphSummary = serde_json::from_value(payload.clone()).ok()?;
        Some(format!("{}\n\nMoral premise: {}", summary.paragraph, summary.moral_premise))
    }
}
