//! Paso 5: sinopsis extendida por personaje (≥ 300 palabras cada una).

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{word_count, CharacterRoster, CharacterSynopses};

use super::util::{normalize, shape_issue, with_guidance};

/// Mínimo de palabras por sinopsis de personaje.
pub const MIN_SYNOPSIS_WORDS: usize = 300;

const SYSTEM: &str = "You are a story development assistant. You tell the whole story from each character's point of \
                      view. Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Principal cast:\n{characters}\n\nFor every character above, write a synopsis of the full \
                             story from their point of view, at least 300 words each, using the exact same names. \
                             Respond with JSON:\n{\"character_synopses\": [{\"name\": \"...\", \"synopsis\": \
                             \"...\"}]}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct CharacterSynopsesStep;

impl StepDefinition for CharacterSynopsesStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let roster = ctx.parent_typed::<CharacterRoster>(3)?;
        let characters = roster.characters
                               .iter()
                               .map(|c| format!("- {} ({}): {}", c.name, c.role, c.arc))
                               .collect::<Vec<_>>()
                               .join("\n");
        let user = USER_TEMPLATE.replace("{characters}", &characters);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<CharacterSynopses>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(synopses) = shape_issue::<CharacterSynopses>(payload, &mut report, "character synopses") else {
            return report;
        };
        if let Ok(roster) = ctx.parent_typed::<CharacterRoster>(3) {
            for character in &roster.characters {
                if !synopses.character_synopses.iter().any(|s| s.name == character.name) {
                    report.push("cardinality",
                                format!("no synopsis for character '{}'", character.name),
                                format!("add a synopsis entry named exactly '{}'", character.name));
                }
            }
            for synopsis in &synopses.character_synopses {
                if !roster.contains(&synopsis.name) {
                    report.push("unknown_character",
                                format!("synopsis names unknown character '{}'", synopsis.name),
                                "use only the names from the principal cast");
                }
            }
        }
        for synopsis in &synopses.character_synopses {
            let words = word_count(&synopsis.synopsis);
            if words < MIN_SYNOPSIS_WORDS {
                report.push("word_count",
                            format!("synopsis for '{}' has {words} words, the minimum is {MIN_SYNOPSIS_WORDS}",
                                    synopsis.name),
                            format!("expand the synopsis for '{}' to at least {MIN_SYNOPSIS_WORDS} words",
                                    synopsis.name));
            }
        }
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let synopses: CharacterSynopses = serde_json::from_value(payload.clone()).ok()?;
        Some(synopses.character_synopses
                     .iter()
                     .map(|s| format!("== {} ==\n{}", s.name, s.synopsis))
                     .collect::<Vec<_>>()
                     .join("\n\n"))
    }
}
