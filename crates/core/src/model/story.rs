use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::ChapterId;
use crate::model::level::CefrLevel;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoryError {
    #[error("chapter {chapter}: title cannot be empty")]
    EmptyTitle { chapter: ChapterId },

    #[error("chapter {chapter}, scene {scene}: dialogue line {line} has no text")]
    EmptyDialogue {
        chapter: ChapterId,
        scene: usize,
        line: usize,
    },

    #[error("chapter {chapter}, scene {scene}: choice list is present but empty")]
    EmptyChoiceList { chapter: ChapterId, scene: usize },

    #[error("chapter {chapter}, scene {scene}: choice {choice} has no text")]
    EmptyChoiceText {
        chapter: ChapterId,
        scene: usize,
        choice: usize,
    },
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Authoring shape of a chapter, as found in catalog JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDraft {
    pub id: u32,
    pub level: CefrLevel,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub xp_reward: u32,
    #[serde(default)]
    pub scenes: Vec<SceneDraft>,
    #[serde(default)]
    pub vocabulary_focus: Vec<String>,
    #[serde(default)]
    pub grammar_points: Vec<String>,
    #[serde(default)]
    pub cultural_notes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDraft {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub dialogue: Vec<DialogueLineDraft>,
    #[serde(default)]
    pub choices: Option<Vec<ChoiceDraft>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLineDraft {
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub grammar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceDraft {
    pub text: String,
    #[serde(default)]
    pub translation: String,
    pub correct: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub xp: u32,
}

impl ChapterDraft {
    /// Validate the draft into an immutable `Chapter`.
    ///
    /// Id density is a catalog-wide rule and is checked by `Catalog`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError` for blank titles, blank dialogue or choice text,
    /// or a scene whose choice list is present but empty.
    pub fn validate(self) -> Result<Chapter, StoryError> {
        let id = ChapterId::new(self.id);
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(StoryError::EmptyTitle { chapter: id });
        }

        let scenes = self
            .scenes
            .into_iter()
            .enumerate()
            .map(|(index, scene)| scene.validate(id, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Chapter {
            id,
            level: self.level,
            title,
            description: self.description.trim().to_string(),
            xp_reward: self.xp_reward,
            scenes,
            vocabulary_focus: self.vocabulary_focus,
            grammar_points: self.grammar_points,
            cultural_notes: self.cultural_notes,
        })
    }
}

impl SceneDraft {
    fn validate(self, chapter: ChapterId, scene: usize) -> Result<Scene, StoryError> {
        let mut dialogue = Vec::with_capacity(self.dialogue.len());
        for (line, draft) in self.dialogue.into_iter().enumerate() {
            if draft.text.trim().is_empty() {
                return Err(StoryError::EmptyDialogue {
                    chapter,
                    scene,
                    line,
                });
            }
            dialogue.push(DialogueLine {
                speaker: draft.speaker.trim().to_string(),
                text: draft.text,
                translation: draft.translation,
                grammar: draft.grammar.filter(|g| !g.trim().is_empty()),
            });
        }

        let choices = match self.choices {
            None => Vec::new(),
            Some(list) if list.is_empty() => {
                return Err(StoryError::EmptyChoiceList { chapter, scene });
            }
            Some(list) => {
                let mut choices = Vec::with_capacity(list.len());
                for (choice, draft) in list.into_iter().enumerate() {
                    if draft.text.trim().is_empty() {
                        return Err(StoryError::EmptyChoiceText {
                            chapter,
                            scene,
                            choice,
                        });
                    }
                    choices.push(Choice {
                        text: draft.text,
                        translation: draft.translation,
                        correct: draft.correct,
                        feedback: draft.feedback,
                        xp: draft.xp,
                    });
                }
                choices
            }
        };

        Ok(Scene {
            location: self.location,
            dialogue,
            choices,
        })
    }
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

/// A unit of scripted content, gated behind completing its predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    id: ChapterId,
    level: CefrLevel,
    title: String,
    description: String,
    xp_reward: u32,
    scenes: Vec<Scene>,
    vocabulary_focus: Vec<String>,
    grammar_points: Vec<String>,
    cultural_notes: Vec<String>,
}

impl Chapter {
    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn level(&self) -> CefrLevel {
        self.level
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Experience granted the first time the chapter is completed.
    #[must_use]
    pub fn xp_reward(&self) -> u32 {
        self.xp_reward
    }

    #[must_use]
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    #[must_use]
    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    #[must_use]
    pub fn is_last_scene(&self, index: usize) -> bool {
        index + 1 >= self.scenes.len()
    }

    #[must_use]
    pub fn vocabulary_focus(&self) -> &[String] {
        &self.vocabulary_focus
    }

    #[must_use]
    pub fn grammar_points(&self) -> &[String] {
        &self.grammar_points
    }

    #[must_use]
    pub fn cultural_notes(&self) -> &[String] {
        &self.cultural_notes
    }
}

//
// ─── SCENE ─────────────────────────────────────────────────────────────────────
//

/// One dialogue beat, optionally ending in a learner choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    location: String,
    dialogue: Vec<DialogueLine>,
    choices: Vec<Choice>,
}

impl Scene {
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn dialogue(&self) -> &[DialogueLine] {
        &self.dialogue
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    #[must_use]
    pub fn choice(&self, index: usize) -> Option<&Choice> {
        self.choices.get(index)
    }

    /// A scene without choices is passed through without waiting on the learner.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.choices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
    pub translation: String,
    pub grammar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub text: String,
    pub translation: String,
    pub correct: bool,
    pub feedback: String,
    pub xp: u32,
}

impl Choice {
    /// Experience earned by picking this choice: its value if correct, else 0.
    #[must_use]
    pub fn earned_xp(&self) -> u32 {
        if self.correct { self.xp } else { 0 }
    }
}
