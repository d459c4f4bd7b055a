use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Select, Text};
use std::sync::Arc;
use story2book::core::book::{ArtStyle, Sheet};
use story2book::core::keys::{FileKeyStore, CREDENTIAL_KEY};
use story2book::core::state::AppState;
use story2book::services::export;
use story2book::services::pipeline::StorybookPipeline;

const MENU_SURPRISE: &str = "Surprise me (random character and story)";
const MENU_STYLE: &str = "Choose art style";
const MENU_CHARACTER: &str = "Describe the character";
const MENU_PAGES: &str = "Set page count";
const MENU_TEXTS: &str = "Write the page texts";
const MENU_GENERATE: &str = "Generate storybook";
const MENU_SHOW: &str = "Show storybook";
const MENU_EXPORT: &str = "Export EPUB";
const MENU_START_OVER: &str = "Start over";
const MENU_CHANGE_KEY: &str = "Change API key";
const MENU_QUIT: &str = "Quit";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let keys = Arc::new(FileKeyStore::new(format!("{}.txt", CREDENTIAL_KEY)));
    let mut state = AppState::new(keys);

    println!("story2book — bring your stories to life.");
    println!("Describe your character, write your story, and create an illustrated book.\n");

    loop {
        if !state.has_credential() {
            prompt_for_key(&mut state)?;
        }

        if let Some(err) = state.last_error.take() {
            eprintln!("\nError: {}\n", err);
        }

        let choice = Select::new(
            "What would you like to do?",
            vec![
                MENU_SURPRISE,
                MENU_STYLE,
                MENU_CHARACTER,
                MENU_PAGES,
                MENU_TEXTS,
                MENU_GENERATE,
                MENU_SHOW,
                MENU_EXPORT,
                MENU_START_OVER,
                MENU_CHANGE_KEY,
                MENU_QUIT,
            ],
        )
        .prompt()?;

        match choice {
            MENU_SURPRISE => {
                println!("Dreaming up a character and story...");
                state.surprise_me().await;
                if state.last_error.is_none() {
                    print_inputs(&state);
                }
            }
            MENU_STYLE => {
                let names: Vec<&str> = ArtStyle::ALL.iter().map(|s| s.name()).collect();
                let name = Select::new("Art style:", names).prompt()?;
                state.inputs.art_style = ArtStyle::from_name(name);
            }
            MENU_CHARACTER => {
                state.inputs.character = Text::new("Describe your main character:")
                    .with_initial_value(&state.inputs.character)
                    .prompt()?;
            }
            MENU_PAGES => {
                let answer = Text::new("Number of pages (1-10):")
                    .with_initial_value(&state.inputs.page_count().to_string())
                    .prompt()?;
                match answer.trim().parse::<usize>() {
                    Ok(count) => state.set_page_count(count),
                    Err(_) => eprintln!("Not a number: {}", answer),
                }
            }
            MENU_TEXTS => {
                for index in 0..state.inputs.page_count() {
                    let text = Text::new(&format!("Page {} text:", index + 1))
                        .with_initial_value(&state.inputs.page_texts[index])
                        .prompt()?;
                    state.inputs.page_texts[index] = text;
                }
            }
            MENU_GENERATE => generate(&mut state).await?,
            MENU_SHOW => show_book(&state),
            MENU_EXPORT => export_book(&state)?,
            MENU_START_OVER => {
                state.start_over();
                println!("Inputs reset.");
            }
            MENU_CHANGE_KEY => state.clear_credential(),
            MENU_QUIT => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn prompt_for_key(state: &mut AppState) -> Result<()> {
    loop {
        let key = Text::new("Enter your Gemini API key:").prompt()?;
        match state.set_credential(&key) {
            Ok(()) => return Ok(()),
            Err(err) => eprintln!("{}", err),
        }
    }
}

fn print_inputs(state: &AppState) {
    let style = state
        .inputs
        .art_style
        .map(|s| s.name())
        .unwrap_or("(none)");
    println!("\nArt style: {}", style);
    println!("Character: {}", state.inputs.character);
    for (index, text) in state.inputs.page_texts.iter().enumerate() {
        println!("  Page {}: {}", index + 1, text);
    }
    println!();
}

async fn generate(state: &mut AppState) -> Result<()> {
    let pb = ProgressBar::new(StorybookPipeline::step_count(&state.inputs) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("illustrating...");

    state
        .start_generation(|book| {
            pb.inc(1);
            if book.back_cover.is_some() {
                pb.set_message("done");
            } else if let Some(page) = book.pages.last() {
                pb.set_message(format!("page {} ready", page.page_number));
            } else if let Some(cover) = &book.cover {
                pb.set_message(format!("cover ready: {}", cover.title));
            }
        })
        .await;
    pb.finish_and_clear();

    if state.last_error.is_none() {
        if let Some(cover) = &state.book.cover {
            println!("\nYour storybook \"{}\" is ready!\n", cover.title);
        }
    }
    Ok(())
}

fn show_book(state: &AppState) {
    let sheets = state.book.sheets();
    if sheets.is_empty() {
        println!("Nothing generated yet. Your illustrated storybook will appear here.");
        return;
    }
    for sheet in sheets {
        match sheet {
            Sheet::Cover(cover) => println!("[Cover] {}", cover.title),
            Sheet::Page(page) => println!("[Page {}] {}", page.page_number, page.text),
            Sheet::BackCover(_) => println!("[Back cover] The End"),
        }
    }
}

fn export_book(state: &AppState) -> Result<()> {
    if !state.book.is_complete() {
        eprintln!("Cannot export without a generated storybook.");
        return Ok(());
    }
    let path = export::export_to_dir(&state.book, std::path::Path::new("."))?;
    println!("Saved {}", path.display());
    Ok(())
}
