//! Tabla completa del pipeline snowflake (pasos 0..10).
//!
//! La tabla de dependencias es contrato; cambiarla invalida artifacts
//! existentes vía upstream hash. Tiers y presupuestos de tokens siguen el
//! costo esperado de cada paso.

use std::sync::Arc;

use story_core::{EngineError, ModelTier, StepDescriptor, StepRegistry};

use crate::steps::{CategoryStep, CharacterBiblesStep, CharacterSynopsesStep, CharactersStep, LoglineStep,
                   LongSynopsisStep, ManuscriptStep, PageStep, ParagraphStep, SceneBriefsStep, SceneListStep};

pub fn snowflake_registry() -> Result<StepRegistry, EngineError> {
    let steps = vec![StepDescriptor { index: 0,
                                      name: "category",
                                      parents: &[],
                                      tier: ModelTier::Fast,
                                      max_tokens: 400,
                                      temperature: 0.7,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(CategoryStep) },
                     StepDescriptor { index: 1,
                                      name: "logline",
                                      parents: &[0],
                                      tier: ModelTier::Balanced,
                                      max_tokens: 300,
                                      temperature: 0.8,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(LoglineStep) },
                     StepDescriptor { index: 2,
                                      name: "paragraph",
                                      parents: &[0, 1],
                                      tier: ModelTier::Balanced,
                                      max_tokens: 700,
                                      temperature: 0.7,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(ParagraphStep) },
                     StepDescriptor { index: 3,
                                      name: "characters",
                                      parents: &[0, 1, 2],
                                      tier: ModelTier::Balanced,
                                      max_tokens: 1_500,
                                      temperature: 0.7,
                                      fanout: false,
                                      allow_fallback: true,
                                      definition: Arc::new(CharactersStep) },
                     StepDescriptor { index: 4,
                                      name: "page",
                                      parents: &[0, 1, 2],
                                      tier: ModelTier::Balanced,
                                      max_tokens: 1_800,
                                      temperature: 0.7,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(PageStep) },
                     StepDescriptor { index: 5,
                                      name: "character_synopses",
                                      parents: &[3],
                                      tier: ModelTier::Balanced,
                                      max_tokens: 3_000,
                                      temperature: 0.7,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(CharacterSynopsesStep) },
                     StepDescriptor { index: 6,
                                      name: "long_synopsis",
                                      parents: &[2, 4],
                                      tier: ModelTier::Quality,
                                      max_tokens: 5_000,
                                      temperature: 0.6,
                                      fanout: false,
                                      allow_fallback: true,
                                      definition: Arc::new(LongSynopsisStep) },
                     StepDescriptor { index: 7,
                                      name: "character_bibles",
                                      parents: &[3, 5],
                                      tier: ModelTier::Quality,
                                      max_tokens: 4_000,
                                      temperature: 0.6,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(CharacterBiblesStep) },
                     StepDescriptor { index: 8,
                                      name: "scene_list",
                                      parents: &[6, 7],
                                      tier: ModelTier::Quality,
                                      max_tokens: 8_000,
                                      temperature: 0.5,
                                      fanout: false,
                                      allow_fallback: false,
                                      definition: Arc::new(SceneListStep) },
                     StepDescriptor { index: 9,
                                      name: "scene_briefs",
                                      parents: &[8],
                                      tier: ModelTier::Balanced,
                                      max_tokens: 800,
                                      temperature: 0.6,
                                      fanout: true,
                                      allow_fallback: true,
                                      definition: Arc::new(SceneBriefsStep) },
                     StepDescriptor { index: 10,
                                      name: "manuscript",
                                      parents: &[8, 9],
                                      tier: ModelTier::Quality,
                                      max_tokens: 2_500,
                                      temperature: 0.8,
                                      fanout: true,
                                      allow_fallback: false,
                                      definition: Arc::new(ManuscriptStep) }];
    StepRegistry::new(steps)
}
