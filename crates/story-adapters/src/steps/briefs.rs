//! Paso 9: un brief por escena, generado con fanout concurrente.
//!
//! Cada sub-tarea produce el brief de una escena (proactiva: goal/conflict/
//! setback/stakes; reactiva: reaction/dilemma/decision/stakes). El ensamble
//! preserva el orden de la lista de escenas del paso 8.

use once_cell::sync::Lazy;
use serde_json::Value;
use story_core::hashing::hash_str;
use story_core::{lenient_json, EngineError, ParsedPayload, PromptBundle, StepContext, StepDefinition, StepPlan,
                 SubPrompt, ValidationReport};
use story_domain::{Scene, SceneBrief, SceneBriefBody, SceneBriefList, SceneList, SceneType};

use super::util::{shape_issue, with_guidance};

const SYSTEM: &str = "You are a story development assistant. You design the internal structure of a single scene. \
                      Respond with a single JSON object and nothing else.";

const USER_TEMPLATE: &str = "Scene {index} ({kind}), POV {pov}:\n{summary}\nConflict: {conflict}\n\nWrite the scene \
                             brief. For a proactive scene respond with JSON {\"kind\": \"proactive\", \"goal\": \
                             \"...\", \"conflict\": \"...\", \"setback\": \"...\", \"stakes\": \"...\"}; for a \
                             reactive scene respond with {\"kind\": \"reactive\", \"reaction\": \"...\", \
                             \"dilemma\": \"...\", \"decision\": \"...\", \"stakes\": \"...\"}";

static PROMPT_VERSION: Lazy<String> = Lazy::new(|| hash_str(&format!("{SYSTEM}\n{USER_TEMPLATE}")));

#[derive(Debug, Default)]
pub struct SceneBriefsStep;

fn scene_kind(scene: &Scene) -> &'static str {
    match scene.scene_type {
        SceneType::Proactive => "proactive",
        SceneType::Reactive => "reactive",
    }
}

/// Brief determinista de emergencia para una escena.
fn fallback_brief(scene: &Scene) -> SceneBrief {
    let body = match scene.scene_type {
        SceneType::Proactive => SceneBriefBody::Proactive { goal: format!("pursue: {}", scene.summary),
                                                            conflict: scene.conflict.clone(),
                                                            setback: "the attempt fails and the situation worsens".into(),
                                                            stakes: format!("what hangs over scene {}", scene.index) },
        SceneType::Reactive => SceneBriefBody::Reactive { reaction: format!("absorb the blow of: {}", scene.summary),
                                                          dilemma: scene.conflict.clone(),
                                                          decision: "commit to the least bad option".into(),
                                                          stakes: format!("what hangs over scene {}", scene.index) },
    };
    SceneBrief { scene_index: scene.index,
                 body }
}

fn brief_fields_empty(body: &SceneBriefBody) -> bool {
    match body {
        SceneBriefBody::Proactive { goal, conflict, setback, stakes } => {
            [goal, conflict, setback, stakes].iter().any(|f| f.trim().is_empty())
        }
        SceneBriefBody::Reactive { reaction, dilemma, decision, stakes } => {
            [reaction, dilemma, decision, stakes].iter().any(|f| f.trim().is_empty())
        }
    }
}

impl SceneBriefsStep {
    fn scenes(ctx: &StepContext) -> Result<SceneList, EngineError> {
        ctx.parent_typed::<SceneList>(8)
    }
}

impl StepDefinition for SceneBriefsStep {
    fn prompt_version(&self) -> &str {
        &PROMPT_VERSION
    }

    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError> {
        let list = Self::scenes(ctx)?;
        let subtasks = list.scenes
                           .iter()
                           .map(|scene| {
                               let user = USER_TEMPLATE.replace("{index}", &scene.index.to_string())
                                                       .replace("{kind}", scene_kind(scene))
                                                       .replace("{pov}", &scene.pov)
                                                       .replace("{summary}", &scene.summary)
                                                       .replace("{conflict}", &scene.conflict);
                               SubPrompt { label: format!("scene {}", scene.index),
                                           prompt: PromptBundle { system: SYSTEM.to_string(),
                                                                  user: with_guidance(user, ctx) } }
                           })
                           .collect();
        Ok(StepPlan::Fanout { subtasks })
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        lenient_json(raw)
    }

    fn parse_sub(&self, sub: usize, raw: &str) -> ParsedPayload {
        let parsed = lenient_json(raw);
        if parsed.degraded {
            return parsed;
        }
        match serde_json::from_value::<SceneBriefBody>(parsed.value.clone()) {
            Ok(body) => {
                let brief = SceneBrief { scene_index: sub + 1,
                                         body };
                match serde_json::to_value(&brief) {
                    Ok(value) => ParsedPayload::clean(value),
                    Err(_) => parsed,
                }
            }
            Err(_) => parsed,
        }
    }

    fn validate_sub(&self, sub: usize, payload: &Value, ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(brief) = shape_issue::<SceneBrief>(payload, &mut report, "scene brief") else {
            return report;
        };
        if brief_fields_empty(&brief.body) {
            report.push("missing_field",
                        format!("brief for scene {} has empty fields", sub + 1),
                        "fill every field of the brief with concrete content");
        }
        if let Ok(list) = Self::scenes(ctx) {
            if let Some(scene) = list.scenes.get(sub) {
                if !brief.body.matches(scene.scene_type) {
                    report.push("brief_mismatch",
                                format!("scene {} is {} but the brief is not", scene.index, scene_kind(scene)),
                                format!("write a {} brief for this scene", scene_kind(scene)));
                }
            }
        }
        report
    }

    fn validate(&self, payload: &Value, ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let Some(briefs) = shape_issue::<SceneBriefList>(payload, &mut report, "scene brief list") else {
            return report;
        };
        let Ok(list) = Self::scenes(ctx) else {
            return report;
        };
        if briefs.briefs.len() != list.len() {
            report.push("cardinality",
                        format!("{} briefs for {} scenes", briefs.briefs.len(), list.len()),
                        "produce exactly one brief per scene, in scene order");
            return report;
        }
        for (scene, brief) in list.scenes.iter().zip(&briefs.briefs) {
            if brief.scene_index != scene.index {
                report.push("cardinality",
                            format!("brief at position {} carries scene_index {}", scene.index, brief.scene_index),
                            "keep briefs in scene order with matching scene_index");
            }
            if !brief.body.matches(scene.scene_type) {
                report.push("brief_mismatch",
                            format!("scene {} is {} but its brief is not", scene.index, scene_kind(scene)),
                            format!("replace with a {} brief", scene_kind(scene)));
            }
        }
        report
    }

    fn assemble(&self, _ctx: &StepContext, subs: Vec<Value>) -> Result<Value, EngineError> {
        let mut briefs = Vec::with_capacity(subs.len());
        for (i, value) in subs.into_iter().enumerate() {
            let brief: SceneBrief =
                serde_json::from_value(value).map_err(|e| {
                                                 EngineError::Parse(format!("subtask {i} produced no scene brief: {e}"))
                                             })?;
            briefs.push(brief);
        }
        serde_json::to_value(SceneBriefList { briefs }).map_err(|e| EngineError::Internal(e.to_string()))
    }

    fn fallback(&self, ctx: &StepContext) -> Option<Value> {
        let list = Self::scenes(ctx).ok()?;
        let briefs: Vec<SceneBrief> = list.scenes.iter().map(fallback_brief).collect();
        serde_json::to_value(SceneBriefList { briefs }).ok()
    }

    fn fallback_sub(&self, ctx: &StepContext, sub: usize) -> Option<Value> {
        let list = Self::scenes(ctx).ok()?;
        let scene = list.scenes.get(sub)?;
        serde_json::to_value(fallback_brief(scene)).ok()
    }

    fn render_text(&self, payload: &Value) -> Option<String> {
        let briefs: SceneBriefList = serde_json::from_value(payload.clone()).ok()?;
        Some(briefs.briefs
                   .iter()
                   .map(|b| match &b.body {
                       SceneBriefBody::Proactive { goal, .. } => format!("{:>3}. proactive: {goal}", b.scene_index),
                       SceneBriefBody::Reactive { decision, .. } => format!("{:>3}. reactive: {decision}", b.scene_index),
                   })
                   .collect::<Vec<_>>()
                   .join("\n"))
    }
}
