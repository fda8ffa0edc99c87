//! Paso 7: biblias de personaje (dossier completo por miembro del elenco).

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{CharacterBibles, CharacterRoster, CharacterSynopses};

use super::util::{normalize, require, shape_issue, with_guidance};

const SYSTEM: &str = "You are a story development assistant. You write complete character bibles for a novel. \
                      Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Principal cast:\n{characters}\n\nPer-character story synopses:\n{synopses}\n\nWrite one \
                             bible per character, using the exact same names. Respond with JSON:\n{\"bibles\": \
                             [{\"name\": \"...\", \"physical\": \"...\", \"voice\": \"...\", \"background\": \
                             \"...\", \"personality\": \"...\", \"relationships\": \"...\", \"quirks\": [\"...\"], \
                             \"vulnerabilities\": [\"...\"]}]}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct CharacterBiblesStep;

impl StepDefinition for CharacterBiblesStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let roster = ctx.parent_typed::<CharacterRoster>(3)?;
        let synopses = ctx.parent_typed::<CharacterSynopses>(5)?;
        let characters = roster.characters
                               .iter()
                               .map(|c| format!("- {} ({})", c.name, c.role))
                               .collect::<Vec<_>>()
                               .join("\n");
        let synopses_text = synopses.character_synopses
                                    .iter()
                                    .map(|s| format!("== {} ==\n{}", s.name, s.synopsis))
                                    .collect::<Vec<_>>()
                                    .join("\n\n");
        let user = USER_TEMPLATE.replace("{characters}", &characters)
                                .replace("{synopses}", &synopses_text);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<CharacterBibles>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(bibles) = shape_issue::<CharacterBibles>(payload, &mut report, "character bibles") else {
            return report;
        };
        if let Ok(roster) = ctx.parent_typed::<CharacterRoster>(3) {
            for character in &roster.characters {
                if !bibles.contains(&character.name) {
                    report.push("cardinality",
                                format!("no bible for character '{}'", character.name),
                                format!("add a bible entry named exactly '{}'", character.name));
                }
            }
        }
        for (i, bible) in bibles.bibles.iter().enumerate() {
            let field = |name: &str| format!("bibles[{i}].{name}");
            require(&mut report, &field("name"), &bible.name);
            require(&mut report, &field("physical"), &bible.physical);
            require(&mut report, &field("voice"), &bible.voice);
            require(&mut report, &field("background"), &bible.background);
            require(&mut report, &field("personality"), &bible.personality);
            require(&mut report, &field("relationships"), &bible.relationships);
        }
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let bibles: CharacterBibles = serde_json::from_value(payload.clone()).ok()?;
        Some(bibles.bibles
                   .iter()
                   .map(|b| format!("== {} ==\nVoice: {}\nBackground: {}", b.name, b.voice, b.background))
                   .collect::<Vec<_>>()
                   .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use story_core::ArtifactEnvelope;

    fn ctx_with_roster() -> StepContext {
        let roster = json!({"characters": [
            {"name": "Mireille", "role": "detective", "goal": "g", "ambition": "a", "values": ["v"],
             "conflict": "c", "epiphany": "e", "arc": "arc"},
        ]});
        let mut parents = BTreeMap::new();
        parents.insert(3, ArtifactEnvelope::new(3, "characters", "up".into(), roster, None, 1, false));
        StepContext { seed: "seed".into(),
                      guidance: None,
                      parents,
                      upstream_hash: "up".into() }
    }

    fn bible(name: &str) -> Value {
        json!({"name": name, "physical": "p", "voice": "v", "background": "b", "personality": "pe",
               "relationships": "r", "quirks": ["q"], "vulnerabilities": ["vu"]})
    }

    #[test]
    fn bible_per_cast_member_passes() {
        let payload = json!({"bibles": [bible("Mireille")]});
        assert!(CharacterBiblesStep.validate(&payload, &ctx_with_roster()).is_ok());
    }

    #[test]
    fn missing_bible_fails() {
        let payload = json!({"bibles": []});
        let report = CharacterBiblesStep.validate(&payload, &ctx_with_roster());
        assert!(report.issues.iter().any(|i| i.code == "cardinality"));
    }

    #[test]
    fn empty_section_is_flagged() {
        let mut payload = json!({"bibles": [bible("Mireille")]});
        payload["bibles"][0]["voice"] = json!("");
        let report = CharacterBiblesStep.validate(&payload, &ctx_with_roster());
        assert!(report.issues.iter().any(|i| i.code == "missing_field"));
    }
}
