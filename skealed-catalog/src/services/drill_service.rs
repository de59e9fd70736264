use serde::Serialize;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};

use crate::services::listing;

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub sender: &'static str,
    pub meta: &'static str,
    pub body: &'static str,
    pub is_scam: bool,
}

pub struct InteractiveDrill {
    pub slug: &'static str,
    pub title: &'static str,
    pub scenarios: &'static [Scenario],
}

const SCAM_SENSOR: InteractiveDrill = InteractiveDrill {
    slug: "scam-sensor",
    title: "Scam Sensor",
    scenarios: &[
        Scenario {
            sender: "Apple Support",
            meta: "security@apple-verify-auth.me",
            body: "Your Apple ID logged in from a new device. Click to lock: bit.ly/id-lock-22",
            is_scam: true,
        },
        Scenario {
            sender: "Chase Bank",
            meta: "alerts@chase.com",
            body: "Debit card ending in 4242 used for $12.50 at 'Coffee 2026'. Respond NO if unauthorized.",
            is_scam: false,
        },
        Scenario {
            sender: "Mom",
            meta: "+1 (555) 012-9844",
            body: "Hey! My card isn't working at the taxi. Can you Venmo $50 to @AirportHelp-Admin? ASAP!",
            is_scam: true,
        },
        Scenario {
            sender: "Spotify",
            meta: "no-reply@spotify.com",
            body: "Your 'Year in Review 2025' is ready! See your top genres and beats.",
            is_scam: false,
        },
    ],
};

const INTERACTIVE: &[InteractiveDrill] = &[SCAM_SENSOR];

pub fn find_interactive(slug: &str) -> Option<&'static InteractiveDrill> {
    INTERACTIVE.iter().find(|d| d.slug == slug)
}

/// Slugs become file names for embedded drills, so only `[a-z0-9_-]` is accepted.
pub fn validate_slug(slug: &str) -> AppResult<()> {
    let ok = !slug.is_empty()
        && slug.len() <= 120
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if ok {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::InvalidDrillSlug, "drill names use lowercase letters, digits, '-' and '_'"))
    }
}

/// A scenario as sent to the player, without its answer.
#[derive(Debug, Serialize)]
pub struct ScenarioPrompt {
    pub sender: &'static str,
    pub meta: &'static str,
    pub body: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrillContent {
    Interactive { scenarios: Vec<ScenarioPrompt> },
    Embedded { app_path: String },
}

pub fn describe(slug: &str) -> (String, DrillContent) {
    match find_interactive(slug) {
        Some(drill) => (
            drill.title.to_string(),
            DrillContent::Interactive {
                scenarios: drill
                    .scenarios
                    .iter()
                    .map(|s| ScenarioPrompt { sender: s.sender, meta: s.meta, body: s.body })
                    .collect(),
            },
        ),
        None => (
            listing::drill_title(slug),
            DrillContent::Embedded { app_path: format!("/apps/{slug}.html") },
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Start,
    Play,
    End,
}

/// One pass through an interactive drill.
pub struct DrillRun {
    scenarios: &'static [Scenario],
    state: RunState,
    index: usize,
    score: u32,
}

impl DrillRun {
    pub fn new(drill: &'static InteractiveDrill) -> Self {
        Self { scenarios: drill.scenarios, state: RunState::Start, index: 0, score: 0 }
    }

    pub fn start(&mut self) {
        self.state = RunState::Play;
        self.index = 0;
        self.score = 0;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn current(&self) -> Option<&Scenario> {
        (self.state == RunState::Play).then(|| &self.scenarios[self.index])
    }

    /// `choice` is the player's "this is a scam" verdict. Returns whether it was right.
    pub fn answer(&mut self, choice: bool) -> AppResult<bool> {
        let scenario = self
            .current()
            .copied()
            .ok_or_else(|| AppError::bad_request("drill is not in progress"))?;

        let correct = choice == scenario.is_scam;
        if correct {
            self.score += 1;
        }

        if self.index + 1 < self.scenarios.len() {
            self.index += 1;
        } else {
            self.state = RunState::End;
        }
        Ok(correct)
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total(&self) -> u32 {
        self.scenarios.len() as u32
    }
}

#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub score: u32,
    pub total: u32,
    pub correct: Vec<bool>,
}

/// Plays a full run from a list of verdicts, one per scenario.
pub fn score_attempt(drill: &'static InteractiveDrill, answers: &[bool]) -> AppResult<AttemptResult> {
    if answers.len() != drill.scenarios.len() {
        return Err(AppError::with_details(
            ErrorCode::DrillAnswersMismatch,
            "answer every scenario exactly once",
            serde_json::json!({ "expected": drill.scenarios.len(), "received": answers.len() }),
        ));
    }

    let mut run = DrillRun::new(drill);
    run.start();
    let correct = answers
        .iter()
        .map(|&choice| run.answer(choice))
        .collect::<AppResult<Vec<bool>>>()?;

    Ok(AttemptResult { score: run.score(), total: run.total(), correct })
}
