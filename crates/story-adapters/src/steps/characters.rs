//! Paso 3: fichas de personajes principales. Permite fallback de emergencia.

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{CharacterRoster, CharacterSummary, Logline, ParagraphSummary};

use super::util::{normalize, require, shape_issue, with_guidance};

/// Mínimo de personajes exigido.
pub const MIN_CHARACTERS: usize = 2;

const SYSTEM: &str = "You are a story development assistant. You derive the principal cast from a story summary. \
                      Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Logline:\n{logline}\n\nSummary paragraph:\n{paragraph}\n\nList the principal characters \
                             (at least two, lead first). Respond with JSON:\n{\"characters\": [{\"name\": \"...\", \
                             \"role\": \"...\", \"goal\": \"...\", \"ambition\": \"...\", \"values\": [\"...\"], \
                             \"conflict\": \"...\", \"epiphany\": \"...\", \"arc\": \"<one-sentence arc>\"}]}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct CharactersStep;

impl StepDefinition for CharactersStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let logline = ctx.parent_typed::<Logline>(1)?;
        let paragraph = ctx.parent_typed::<ParagraphSummary>(2)?;
        let user = USER_TEMPLATE.replace("{logline}", &logline.logline)
                                .replace("{paragraph}", &paragraph.paragraph);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<CharacterRoster>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(roster) = shape_issue::<CharacterRoster>(payload, &mut report, "character roster") else {
            return report;
        };
        if roster.characters.len() < MIN_CHARACTERS {
            report.push("cardinality",
                        format!("{} characters listed, at least {MIN_CHARACTERS} are required",
                                roster.characters.len()),
                        "add the antagonist and any other principal character");
        }
        for (i, character) in roster.characters.iter().enumerate() {
            let field = |name: &str| format!("characters[{i}].{name}");
            require(&mut report, &field("name"), &character.name);
            require(&mut report, &field("role"), &character.role);
            require(&mut report, &field("goal"), &character.goal);
            require(&mut report, &field("conflict"), &character.conflict);
            require(&mut report, &field("epiphany"), &character.epiphany);
            require(&mut report, &field("arc"), &character.arc);
            if character.values.iter().all(|v| v.trim().is_empty()) {
                report.push("missing_field",
                            format!("characters[{i}].values is empty"),
                            "list at least one core value for the character");
            }
        }
        report
    }

    /// Elenco mínimo determinista sintetizado desde el logline del paso 1.
    fn fallback(&self, ctx: &StepContext) -> Option<Value> {
        let logline = ctx.parent_typed::<Logline>(1).ok()?;
        let c = &logline.components;
        let lead = CharacterSummary { name: "The Lead".into(),
                                      role: c.role.clone(),
                                      goal: c.goal.clone(),
                                      ambition: format!("become more than {}", c.role),
                                      values: vec!["perseverance".into()],
                                      conflict: format!("opposed by {}", c.opposition),
                                      epiphany: "learns what the goal truly costs".into(),
                                      arc: format!("{} pursues {} against {}", c.lead, c.goal, c.opposition) };
        let opposition = CharacterSummary { name: "The Opposition".into(),
                                            role: c.opposition.clone(),
                                            goal: format!("stop {}", c.lead),
                                            ambition: "keep the status quo".into(),
                                            values: vec!["control".into()],
                                            conflict: format!("threatened by {}", c.lead),
                                            epiphany: "none; the opposition does not change".into(),
                                            arc: format!("{} escalates until defeated", c.opposition) };
        serde_json::to_value(CharacterRoster { characters: vec![lead, opposition] }).ok()
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let roster: CharacterRoster = serde_json::from_value(payload.clone()).ok()?;
        Some(roster.characters
                   .iter()
                   .map(|c| format!("{} ({}): {}", c.name, c.role, c.arc))
                   .collect::<Vec<_>>()
                   .join("\n"))
    }
}
