//! Paso 8: lista maestra de escenas (40–80, POV conocido, targets de palabras).

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 ValidationReport};
use story_domain::{CharacterBibles, LongSynopsis, SceneList};

use super::util::{normalize, require, shape_issue, with_guidance};

/// Rango admitido de escenas.
pub const MIN_SCENES: usize = 40;
pub const MAX_SCENES: usize = 80;

/// Largo objetivo de la novela y tolerancia sobre la suma de targets.
pub const NOVEL_TARGET_WORDS: u64 = 90_000;
pub const TARGET_TOLERANCE: f64 = 0.25;

const SYSTEM: &str = "You are a story development assistant. You break a long synopsis into a complete scene list \
                      for a novel. Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Long synopsis:\n{synopsis}\n\nPoint-of-view characters available:\n{povs}\n\nProduce \
                             between 40 and 80 scenes alternating proactive and reactive beats, 1-based sequential \
                             indices, word targets summing to roughly 90000. Respond with JSON:\n{\"scenes\": \
                             [{\"index\": 1, \"type\": \"proactive\", \"pov\": \"<character name>\", \"summary\": \
                             \"...\", \"location\": \"...\", \"time\": \"...\", \"word_target\": 1500, \
                             \"conflict\": \"...\", \"disaster_anchor\": null, \"hooks\": \"...\"}]}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct SceneListStep;

impl StepDefinition for SceneListStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let synopsis = ctx.parent_typed::<LongSynopsis>(6)?;
        let bibles = ctx.parent_typed::<CharacterBibles>(7)?;
        let povs = bibles.bibles
                         .iter()
                         .map(|b| format!("- {}", b.name))
                         .collect::<Vec<_>>()
                         .join("\n");
        let user = USER_TEMPLATE.replace("{synopsis}", &synopsis.long_synopsis)
                                .replace("{povs}", &povs);
        Ok(StepPlan::Single { prompt: PromptBundle { system: SYSTEM.to_string(),
                                                     user: with_guidance(user, ctx) } })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        normalize::<SceneList>(lenient_json(raw))
    }

    fn validate(&self, payload: &Value, ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(list) = shape_issue::<SceneList>(payload, &mut report, "scene list") else {
            return report;
        };
        let count = list.len();
        if !(MIN_SCENES..=MAX_SCENES).contains(&count) {
            report.push("scene_count",
                        format!("{count} scenes listed, the required range is {MIN_SCENES}-{MAX_SCENES}"),
                        format!("restructure the list to between {MIN_SCENES} and {MAX_SCENES} scenes"));
        }
        for (position, scene) in list.scenes.iter().enumerate() {
            if scene.index != position + 1 {
                report.push("scene_index",
                            format!("scene at position {} carries index {}", position + 1, scene.index),
                            "number scenes sequentially starting at 1");
            }
            require(&mut report, &format!("scenes[{position}].summary"), &scene.summary);
            require(&mut report, &format!("scenes[{position}].conflict"), &scene.conflict);
            if let Some(anchor) = scene.disaster_anchor {
                if !(1..=3).contains(&anchor) {
                    report.push("enum_value",
                                format!("scene {} anchors to disaster {anchor}, valid anchors are 1-3", scene.index),
                                "use disaster_anchor 1, 2 or 3, or null");
                }
            }
        }
        // integridad referencial POV ↔ biblias (el paso 7 es padre directo)
        if let Ok(bibles) = ctx.parent_typed::<CharacterBibles>(7) {
            for scene in &list.scenes {
                if !bibles.contains(&scene.pov) {
                    report.push("pov_unknown",
                                format!("scene {} has POV '{}' with no character bible", scene.index, scene.pov),
                                "use a POV character that exists in the character bibles");
                }
            }
        }
        let total = list.word_target_total();
        let low = (NOVEL_TARGET_WORDS as f64 * (1.0 - TARGET_TOLERANCE)) as u64;
        let high = (NOVEL_TARGET_WORDS as f64 * (1.0 + TARGET_TOLERANCE)) as u64;
        if count > 0 && !(low..=high).contains(&total) {
            report.push("word_target_sum",
                        format!("scene word targets sum to {total}, expected {low}-{high} for a \
                                 {NOVEL_TARGET_WORDS}-word novel"),
                        "rebalance per-scene word targets toward the novel length");
        }
        report
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let list: SceneList = serde_json::from_value(payload.clone()).ok()?;
        Some(list.scenes
                 .iter()
                 .map(|s| format!("{:>3}. [{}] ({}) {}", s.index, s.pov, s.word_target, s.summary))
                 .collect::<Vec<_>>()
                 .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use story_core::ArtifactEnvelope;

    fn ctx_with_bibles() -> StepContext {
        let bibles = json!({"bibles": [
            {"name": "Mireille", "physical": "p", "voice": "v", "background": "b", "personality": "pe",
             "relationships": "r", "quirks": [], "vulnerabilities": []},
        ]});
        let mut parents = BTreeMap::new();
        parents.insert(7, ArtifactEnvelope::new(7, "character_bibles", "up".into(), bibles, None, 1, false));
        StepContext { seed: "seed".into(),
                      guidance: None,
                      parents,
                      upstream_hash: "up".into() }
    }

    fn scene_list(count: usize) -> Value {
        let word_target = (NOVEL_TARGET_WORDS as usize / count) as u32;
        let scenes: Vec<Value> = (1..=count).map(|i| {
                                                json!({
                                                    "index": i,
                                                    "type": if i % 2 == 1 { "proactive" } else { "reactive" },
                                                    "pov": "Mireille",
                                                    "summary": format!("Scene {i} summary"),
                                                    "location": "Paris",
                                                    "time": "night",
                                                    "word_target": word_target,
                                                    "conflict": "a conflict",
                                                    "disaster_anchor": null,
                                                    "hooks": "a hook",
                                                })
                                            })
                                            .collect();
        json!({ "scenes": scenes })
    }

    #[test]
    fn forty_and_eighty_scenes_pass() {
        for count in [40usize, 80] {
            let report = SceneListStep.validate(&scene_list(count), &ctx_with_bibles());
            assert!(report.is_ok(), "{count} scenes must pass: {:?}", report.issues);
        }
    }

    #[test]
    fn thirty_nine_and_eighty_one_scenes_fail() {
        for count in [39usize, 81] {
            let report = SceneListStep.validate(&scene_list(count), &ctx_with_bibles());
            assert!(report.issues.iter().any(|i| i.code == "scene_count"), "{count} scenes must fail");
        }
    }

    #[test]
    fn unknown_pov_is_rejected() {
        let mut payload = scene_list(40);
        payload["scenes"][5]["pov"] = json!("Nobody");
        let report = SceneListStep.validate(&payload, &ctx_with_bibles());
        assert!(report.issues.iter().any(|i| i.code == "pov_unknown"));
    }

    #[test]
    fn word_target_sum_out_of_tolerance_fails() {
        let mut payload = scene_list(40);
        for scene in payload["scenes"].as_array_mut().unwrap() {
            scene["word_target"] = json!(100);
        }
        let report = SceneListStep.validate(&payload, &ctx_with_bibles());
        assert!(report.issues.iter().any(|i| i.code == "word_target_sum"));
    }

    #[test]
    fn non_sequential_indices_fail() {
        let mut payload = scene_list(40);
        payload["scenes"][10]["index"] = json!(99);
        let report = SceneListStep.validate(&payload, &ctx_with_bibles());
        assert!(report.issues.iter().any(|i| i.code == "scene_index"));
    }
}
