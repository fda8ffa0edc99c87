//! Paso 0: categoría, tipo de relato y promesa al lector.

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::StoryCategory;

use super::util::{normalize, require, shape_issue, with_guidance};

const SYSTEM: &str = "You are a story development assistant. You position a story commercially before any \
                      writing begins. Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Story brief:\n{brief}\n\nDecide the commercial positioning. Respond with JSON:\n\
                             {\"category\": \"<bookstore shelf category>\", \"story_kind\": \"<one-phrase kind of \
                             story>\", \"audience_delight\": [\"<delight 1>\", \"<delight 2>\", \"<delight 3>\"]}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct CategoryStep;

impl StepDefinition for CategoryStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let user = USER_TEMPLATE.replace("{brief}", &ctx.seed);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<StoryCategory>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(category) = shape_issue::<StoryCategory>(payload, &mut report, "story category") else {
            return report;
        };
        require(&mut report, "category", &category.category);
        require(&mut report, "story_kind", &category.story_kind);
        if category.audience_delight.iter().filter(|d| !d.trim().is_empty()).count() < 3 {
            report.push("cardinality",
                        "audience_delight needs at least three non-empty entries",
                        "list three or more concrete delight factors for the target audience");
        }
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let category: StoryCategory = serde_json::from_value(payload.clone()).ok()?;
        Some(format!("Category: {}\nKind: {}\nAudience delight:\n{}",
                     category.category,
                     category.story_kind,
                     category.audience_delight
                             .iter()
                             .map(|d| format!("  - {d}"))
                             .collect::<Vec<_>>()
                             .join("\n")))
    }
}
