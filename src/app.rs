//! Terminal kitchen: the interactive view over the orchestrator.
//!
//! # Architecture
//!
//! [`KitchenApp`] reads one command per line from stdin, turns it into a
//! [`UserIntent`] and dispatches it to the [`RecipeOrchestrator`] or the
//! [`AudioSession`].  Slow intents (generate, edit, listen) run on spawned
//! tasks so the prompt stays responsive.  Two listeners render what changed:
//!
//! * [`StudioEvent`]s from the orchestrator's broadcast channel.
//! * [`AudioState`] transitions from the session's watch channel.
//!
//! Whenever the active recipe changes, narration for the previous recipe is
//! torn down.
//!
//! # Commands
//!
//! | Command | Effect |
//! |---------|--------|
//! | `generate a, b, c` | Write a recipe from the ingredients |
//! | `fav` | Toggle the active recipe in favorites |
//! | `remove <id>` | Delete a saved recipe |
//! | `select <id>` | Open a saved recipe |
//! | `edit <instruction>` | Edit the active recipe's image |
//! | `listen` | Play / stop narration |
//! | `new` | Start over |
//! | `retry` | Dismiss the error |
//! | `favorites [date\|az]` | List saved recipes |
//! | `show` | Print the active recipe |
//! | `help` | List commands |
//! | `quit` | Exit |

use std::ops::ControlFlow;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

use crate::audio::{AudioSession, AudioState};
use crate::pipeline::{GenerationStatus, RecipeOrchestrator, StudioError, StudioEvent};
use crate::recipe::{Recipe, RecipeId, SortOption};

const HELP: &str = "\
commands:
  generate <a, b, c>     write a recipe from comma-separated ingredients
  fav                    save / unsave the current recipe
  remove <id>            delete a saved recipe
  select <id>            open a saved recipe
  edit <instruction>     edit the current recipe's image
  listen                 play / stop narration of the current recipe
  new                    start over
  retry                  dismiss the last error
  favorites [date|az]    list saved recipes
  show                   print the current recipe
  help                   show this help
  quit                   exit";

// ---------------------------------------------------------------------------
// UserIntent
// ---------------------------------------------------------------------------

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    Generate(Vec<String>),
    ToggleFavorite,
    Remove(RecipeId),
    Select(RecipeId),
    EditImage(String),
    Listen,
    StartOver,
    Retry,
    /// `None` uses the configured default order.
    Favorites(Option<SortOption>),
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}, type `help`")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("unknown sort {0:?}, use `date` or `az`")]
    BadSort(String),
}

/// Parse one input line.
///
/// ```
/// use tcm_kitchen::app::{parse_intent, UserIntent};
///
/// assert_eq!(
///     parse_intent("generate ginger, rice").unwrap(),
///     UserIntent::Generate(vec!["ginger".into(), "rice".into()])
/// );
/// assert_eq!(parse_intent("  fav ").unwrap(), UserIntent::ToggleFavorite);
/// ```
pub fn parse_intent(line: &str) -> Result<UserIntent, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let intent = match command.to_lowercase().as_str() {
        "generate" | "gen" | "g" => UserIntent::Generate(
            rest.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        "fav" | "favorite" | "favourite" => UserIntent::ToggleFavorite,
        "remove" | "rm" => UserIntent::Remove(required(rest, "remove")?.into()),
        "select" | "open" => UserIntent::Select(required(rest, "select")?.into()),
        "edit" => UserIntent::EditImage(required(rest, "edit")?.to_string()),
        "listen" | "play" | "stop" => UserIntent::Listen,
        "new" => UserIntent::StartOver,
        "retry" => UserIntent::Retry,
        "favorites" | "favs" | "list" => UserIntent::Favorites(match rest.to_lowercase().as_str() {
            "" => None,
            "date" | "new" | "newest" => Some(SortOption::Date),
            "az" | "a-z" | "alpha" | "alphabetical" => Some(SortOption::Alphabetical),
            other => return Err(ParseError::BadSort(other.to_string())),
        }),
        "show" => UserIntent::Show,
        "help" | "?" => UserIntent::Help,
        "quit" | "exit" | "q" => UserIntent::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(intent)
}

fn required<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        Err(ParseError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Full recipe card.
pub fn render_recipe(recipe: &Recipe, favorite: bool, status: GenerationStatus) -> String {
    let mut out = String::new();
    let star = if favorite { " *" } else { "" };
    out.push_str(&format!("== {}{star} ==\n", recipe.title));
    out.push_str(&format!("id: {}\n", recipe.id));
    out.push_str(&format!(
        "created: {}\n",
        recipe.created_at.format("%Y-%m-%d %H:%M")
    ));

    let image = match (&recipe.image_url, status) {
        (Some(url), _) => format!("ready ({} KB)", url.len() / 1024),
        (None, GenerationStatus::GeneratingMedia) => "generating...".to_string(),
        (None, _) => "none".to_string(),
    };
    out.push_str(&format!("image: {image}\n"));

    out.push_str("\ningredients:\n");
    for ingredient in &recipe.ingredients {
        out.push_str(&format!("  - {ingredient}\n"));
    }
    out.push_str("\nsteps:\n");
    for (n, step) in recipe.steps.iter().enumerate() {
        out.push_str(&format!("  {}. {step}\n", n + 1));
    }
    out.push_str(&format!("\nbenefits: {}", recipe.benefits));
    out
}

/// One line per saved recipe.
pub fn render_favorites(recipes: &[Recipe]) -> String {
    if recipes.is_empty() {
        return "no saved recipes yet".to_string();
    }
    recipes
        .iter()
        .map(|r| {
            let image = if r.has_image() { "img" } else { "   " };
            format!(
                "{}  {}  [{image}]  {}",
                r.created_at.format("%Y-%m-%d"),
                r.id,
                r.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Status-line text for an event, if it deserves one.
pub fn render_event(event: &StudioEvent) -> Option<String> {
    match event {
        StudioEvent::StatusChanged(GenerationStatus::Idle) => None,
        StudioEvent::StatusChanged(status) => Some(format!("[{}]", status.label())),
        StudioEvent::GenerationFailed(message) => Some(format!("! {message} (type `retry`)")),
        StudioEvent::ImageEdited { id } => Some(format!("image of {id} updated")),
        StudioEvent::FavoritesChanged { count } => Some(format!("{count} saved recipe(s)")),
        StudioEvent::ActiveRecipeChanged(_) => None,
    }
}

// ---------------------------------------------------------------------------
// KitchenApp
// ---------------------------------------------------------------------------

/// Line-oriented front end.
pub struct KitchenApp {
    orchestrator: RecipeOrchestrator,
    /// `None` when narration is disabled in the config.
    audio: Option<Arc<AudioSession>>,
    default_sort: SortOption,
}

impl KitchenApp {
    pub fn new(
        orchestrator: RecipeOrchestrator,
        audio: Option<Arc<AudioSession>>,
        default_sort: SortOption,
    ) -> Self {
        Self {
            orchestrator,
            audio,
            default_sort,
        }
    }

    /// Run until `quit` or end of input.
    pub async fn run<R>(self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut events = self.orchestrator.subscribe();
        let mut audio_rx = self.audio.as_ref().map(|session| session.subscribe());

        println!("TCM kitchen. Type `help` for commands.");
        println!("{}", render_favorites(&self.orchestrator.favorites(self.default_sort)));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let flow = self.dispatch(&line);
                    self.sync_narration();
                    if flow.is_break() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.on_event(&event),
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("app: skipped {n} event(s)");
                        self.sync_narration();
                    }
                    Err(RecvError::Closed) => break,
                },
                state = audio_changed(&mut audio_rx) => {
                    if let Some(state) = state {
                        println!("narration: {}", state.label());
                    }
                }
            }
        }

        if let Some(session) = &self.audio {
            session.teardown();
        }
        log::info!("app: bye");
        Ok(())
    }

    fn on_event(&self, event: &StudioEvent) {
        self.sync_narration();
        if let StudioEvent::ActiveRecipeChanged(active) = event {
            if let Some(recipe) = active {
                println!(
                    "{}",
                    render_recipe(
                        recipe,
                        self.orchestrator.is_favorite(&recipe.id),
                        self.orchestrator.status()
                    )
                );
            }
        }
        if let Some(line) = render_event(event) {
            println!("{line}");
        }
    }

    /// Tear narration down when it belongs to a recipe that is no longer shown.
    ///
    /// Reads the orchestrator's current view rather than event payloads, so a
    /// lagged event receiver cannot leave a stale narration running.
    fn sync_narration(&self) {
        let Some(session) = &self.audio else { return };
        let Some(playing) = session.recipe_id() else { return };
        let shown = self.orchestrator.active_recipe().map(|r| r.id);
        if shown.as_ref() != Some(&playing) {
            log::debug!("app: narration for {playing} no longer shown");
            session.teardown();
        }
    }

    fn dispatch(&self, line: &str) -> ControlFlow<()> {
        let intent = match parse_intent(line) {
            Ok(intent) => intent,
            Err(ParseError::Empty) => return ControlFlow::Continue(()),
            Err(e) => {
                println!("{e}");
                return ControlFlow::Continue(());
            }
        };
        log::debug!("app: {intent:?}");

        match intent {
            UserIntent::Generate(ingredients) => {
                let orchestrator = self.orchestrator.clone();
                tokio::spawn(async move {
                    match orchestrator.generate(&ingredients).await {
                        // Detached; completion arrives as events.
                        Ok(_pending) => {}
                        Err(StudioError::EmptyIngredients) => println!("{}", StudioError::EmptyIngredients),
                        Err(e) => log::debug!("app: generate ended: {e}"),
                    }
                });
            }
            UserIntent::ToggleFavorite => {
                if let Some(recipe) = self.active_or_hint() {
                    match self.orchestrator.toggle_favorite(&recipe) {
                        Ok(true) => println!("saved {}", recipe.title),
                        Ok(false) => println!("removed {}", recipe.title),
                        Err(e) => println!("{e}"),
                    }
                }
            }
            UserIntent::Remove(id) => match self.orchestrator.remove_favorite(&id) {
                Ok(true) => println!("removed {id}"),
                Ok(false) => println!("no saved recipe {id}"),
                Err(e) => println!("{e}"),
            },
            UserIntent::Select(id) => {
                if let Err(e) = self.orchestrator.select_recipe(&id) {
                    println!("{e}");
                }
            }
            UserIntent::EditImage(instruction) => {
                if let Some(recipe) = self.active_or_hint() {
                    let orchestrator = self.orchestrator.clone();
                    println!("editing image...");
                    tokio::spawn(async move {
                        if let Err(e) = orchestrator.edit_recipe_image(&recipe, &instruction).await {
                            println!("{e}");
                        }
                    });
                }
            }
            UserIntent::Listen => match (&self.audio, self.active_or_hint()) {
                (None, _) => println!("narration is disabled"),
                (Some(_), None) => {}
                (Some(session), Some(recipe)) => {
                    let session = Arc::clone(session);
                    tokio::spawn(async move {
                        if let Err(e) = session.toggle(&recipe).await {
                            println!("narration failed: {e}");
                        }
                    });
                }
            },
            UserIntent::StartOver => self.orchestrator.start_over(),
            UserIntent::Retry => {
                if self.orchestrator.status() == GenerationStatus::Error {
                    self.orchestrator.dismiss_error();
                    println!("ready for new ingredients");
                }
            }
            UserIntent::Favorites(sort) => {
                let sort = sort.unwrap_or(self.default_sort);
                println!("{}", render_favorites(&self.orchestrator.favorites(sort)));
            }
            UserIntent::Show => {
                let status = self.orchestrator.status();
                match self.orchestrator.active_recipe() {
                    Some(recipe) => println!(
                        "{}",
                        render_recipe(&recipe, self.orchestrator.is_favorite(&recipe.id), status)
                    ),
                    None => match self.orchestrator.error_message() {
                        Some(message) => println!("! {message}"),
                        None => println!("[{}]", status.label()),
                    },
                }
            }
            UserIntent::Help => println!("{HELP}"),
            UserIntent::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn active_or_hint(&self) -> Option<Recipe> {
        let active = self.orchestrator.active_recipe();
        if active.is_none() {
            println!("no recipe yet, try `generate ginger, rice`");
        }
        active
    }
}

/// Next narration state, or pending forever when narration is disabled.
async fn audio_changed(
    rx: &mut Option<tokio::sync::watch::Receiver<AudioState>>,
) -> Option<AudioState> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
