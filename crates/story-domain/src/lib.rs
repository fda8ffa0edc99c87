//! story-domain: esquemas tipados de los artifacts del pipeline.
//!
//! Propósito:
//! - Definir los payloads de los 11 pasos (categoría → manuscrito) como
//!   tipos serde estables, sin conocimiento del motor.
//! - Proveer helpers de medición de texto (palabras, oraciones) usados por
//!   los validadores y los fallbacks deterministas.
//!
//! Este crate no conoce eventos, stores ni proveedores LLM; sólo datos.

pub mod category;
pub mod characters;
pub mod logline;
pub mod manuscript;
pub mod paragraph;
pub mod scenes;
pub mod synopsis;
pub mod text;

pub use category::StoryCategory;
pub use characters::{CharacterBible, CharacterBibles, CharacterRoster, CharacterSummary, CharacterSynopses, CharacterSynopsis};
pub use logline::{Logline, LoglineComponents};
pub use manuscript::{Chapter, Manuscript, SceneProse};
pub use paragraph::ParagraphSummary;
pub use scenes::{SceneBrief, SceneBriefBody, SceneBriefList, SceneList, SceneType, Scene};
pub use synopsis::{LongSynopsis, PageSynopsis};
pub use text::{split_sentences, word_count};
