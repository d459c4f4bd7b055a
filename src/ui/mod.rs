use crate::core::book::{ArtStyle, GeneratedBook, Sheet};
use crate::core::error::GenError;
use crate::core::inputs::{StoryInputs, DEFAULT_PAGE_COUNT, MAX_PAGE_COUNT, MIN_PAGE_COUNT};
use crate::core::keys::{KeyStore, WebKeyStore};
use crate::services::gateway::StoryGateway;
use crate::services::pipeline::StorybookPipeline;
use leptos::*;
use rand::Rng;

#[component]
pub fn App() -> impl IntoView {
    let (api_key, set_api_key) = create_signal(WebKeyStore::new().load());
    let (art_style, set_art_style) = create_signal(None::<ArtStyle>);
    let (character, set_character) = create_signal(String::new());
    let (page_texts, set_page_texts) = create_signal(vec![String::new(); DEFAULT_PAGE_COUNT]);
    let (book, set_book) = create_signal(GeneratedBook::default());
    let (is_loading, set_is_loading) = create_signal(false);
    let (is_surprising, set_is_surprising) = create_signal(false);
    let (error, set_error) = create_signal(None::<String>);

    let busy = move || is_loading.get() || is_surprising.get();

    let handle_error = move |err: GenError| {
        if err == GenError::MissingOrInvalidCredential {
            if let Err(e) = WebKeyStore::new().clear() {
                log::warn!("Failed to clear stored key: {:#}", e);
            }
            set_api_key.set(None);
        }
        set_error.set(Some(err.to_string()));
        set_book.set(GeneratedBook::default());
    };

    let on_page_count = move |count: usize| {
        let count = count.clamp(MIN_PAGE_COUNT, MAX_PAGE_COUNT);
        set_page_texts.update(|texts| texts.resize(count, String::new()));
        // A new page count invalidates prior output.
        set_book.set(GeneratedBook::default());
    };

    let on_generate = move |_| {
        set_error.set(None);
        let inputs = StoryInputs {
            art_style: art_style.get(),
            character: character.get(),
            page_texts: page_texts.get(),
        };
        if let Err(err) = inputs.validate() {
            set_error.set(Some(err.to_string()));
            return;
        }
        let Some(key) = api_key.get() else {
            handle_error(GenError::MissingOrInvalidCredential);
            return;
        };

        set_is_loading.set(true);
        set_book.set(GeneratedBook::default());
        spawn_local(async move {
            let result = match StoryGateway::with_key(&key) {
                Ok(gateway) => StorybookPipeline::new(&gateway)
                    .run(&inputs, |snapshot| set_book.set(snapshot.clone()))
                    .await
                    .map(|_| ()),
                Err(err) => Err(err),
            };
            set_is_loading.set(false);
            if let Err(err) = result {
                handle_error(err);
            }
        });
    };

    let on_surprise = move |_| {
        set_error.set(None);
        let Some(key) = api_key.get() else {
            handle_error(GenError::MissingOrInvalidCredential);
            return;
        };

        let page_count = rand::rng().random_range(1..=5);
        on_page_count(page_count);
        set_is_surprising.set(true);
        spawn_local(async move {
            let result = match StoryGateway::with_key(&key) {
                Ok(gateway) => gateway.generate_surprise_content(page_count).await,
                Err(err) => Err(err),
            };
            set_is_surprising.set(false);
            match result {
                Ok(content) => {
                    set_art_style.set(Some(ArtStyle::random()));
                    set_character.set(content.character);
                    set_page_texts.set(content.story);
                }
                Err(err) => handle_error(err),
            }
        });
    };

    let on_start_over = move |_| {
        set_art_style.set(None);
        set_character.set(String::new());
        set_page_texts.set(vec![String::new(); DEFAULT_PAGE_COUNT]);
        set_book.set(GeneratedBook::default());
        set_error.set(None);
    };

    let on_change_key = move |_| {
        if let Err(e) = WebKeyStore::new().clear() {
            log::warn!("Failed to clear stored key: {:#}", e);
        }
        set_api_key.set(None);
    };

    view! {
        <div class="app">
            <header>
                <h1>"Personalized Storybook Illustrator"</h1>
                <p>"Describe your character, write your story, and create a book."</p>
            </header>
            {move || match api_key.get() {
                None => view! { <ApiKeyGate set_api_key=set_api_key error=error/> }.into_view(),
                Some(_) => view! {
                    <main>
                        <div class="actions">
                            <button on:click=on_surprise disabled=busy>
                                {move || if is_surprising.get() { "Creating..." } else { "✨ Surprise Me!" }}
                            </button>
                            <button on:click=on_start_over disabled=busy>"Start Over"</button>
                        </div>
                        <section class="setup">
                            <label>"Art Style"</label>
                            <select on:change=move |ev| set_art_style.set(ArtStyle::from_name(&event_target_value(&ev)))>
                                <option value="" selected=move || art_style.get().is_none()>"Pick a style"</option>
                                {ArtStyle::ALL
                                    .into_iter()
                                    .map(|style| {
                                        let name = style.name();
                                        view! {
                                            <option value=name selected=move || art_style.get() == Some(style)>
                                                {name}
                                            </option>
                                        }
                                    })
                                    .collect_view()}
                            </select>
                            <label>"Your Character"</label>
                            <textarea
                                prop:value=move || character.get()
                                on:input=move |ev| set_character.set(event_target_value(&ev))
                                placeholder="e.g., A small owl with moon-grey feathers"
                            ></textarea>
                            <label>"Number of Pages"</label>
                            <input
                                type="number"
                                min=MIN_PAGE_COUNT
                                max=MAX_PAGE_COUNT
                                prop:value=move || page_texts.with(|t| t.len()).to_string()
                                on:change=move |ev| {
                                    if let Ok(count) = event_target_value(&ev).parse::<usize>() {
                                        on_page_count(count);
                                    }
                                }
                            />
                        </section>
                        <section class="story">
                            {move || {
                                page_texts
                                    .get()
                                    .into_iter()
                                    .enumerate()
                                    .map(|(index, text)| {
                                        view! {
                                            <textarea
                                                prop:value=text
                                                placeholder=format!("What happens on page {}?", index + 1)
                                                on:input=move |ev| {
                                                    set_page_texts
                                                        .update(|texts| texts[index] = event_target_value(&ev))
                                                }
                                            ></textarea>
                                        }
                                    })
                                    .collect_view()
                            }}
                            {move || error.get().map(|message| view! { <p class="error">{message}</p> })}
                            <button on:click=on_generate disabled=busy>
                                {move || if is_loading.get() { "Illustrating..." } else { "Generate Storybook" }}
                            </button>
                        </section>
                        <Gallery book=book is_loading=is_loading/>
                        <footer>
                            <button on:click=on_change_key>"Change API Key"</button>
                        </footer>
                    </main>
                }.into_view(),
            }}
        </div>
    }
}

#[component]
fn ApiKeyGate(set_api_key: WriteSignal<Option<String>>, error: ReadSignal<Option<String>>) -> impl IntoView {
    let (draft, set_draft) = create_signal(String::new());

    let on_save = move |_| {
        let key = draft.get().trim().to_string();
        if key.is_empty() {
            return;
        }
        if let Err(e) = WebKeyStore::new().store(&key) {
            log::warn!("Failed to persist key: {:#}", e);
        }
        set_api_key.set(Some(key));
    };

    view! {
        <section class="api-key">
            <h2>"Enter your Gemini API key"</h2>
            {move || error.get().map(|message| view! { <p class="error">{message}</p> })}
            <input
                type="password"
                prop:value=move || draft.get()
                on:input=move |ev| set_draft.set(event_target_value(&ev))
            />
            <button on:click=on_save>"Save"</button>
        </section>
    }
}

/// Paginated view over {cover?, page 1..N, back cover?}.
#[component]
fn Gallery(book: ReadSignal<GeneratedBook>, is_loading: ReadSignal<bool>) -> impl IntoView {
    let (index, set_index) = create_signal(0usize);

    // Jump back to the first sheet whenever the book changes.
    create_effect(move |_| {
        book.track();
        set_index.set(0);
    });

    let total = move || book.with(|b| b.sheets().len());

    // Owned render data for the current sheet.
    let current = move || {
        book.with(|b| {
            b.sheets().get(index.get()).map(|sheet| match sheet {
                Sheet::Cover(cover) => {
                    (Some(cover.title.clone()), cover.image.as_data_url(), None)
                }
                Sheet::Page(page) => {
                    (None, page.image.as_data_url(), Some(page.text.clone()))
                }
                Sheet::BackCover(image) => (None, image.as_data_url(), None),
            })
        })
    };

    view! {
        <section class="gallery">
            <h2>"Your Storybook"</h2>
            {move || {
                if is_loading.get() && total() == 0 {
                    return view! { <p>"Brewing up your story... This takes some time."</p> }.into_view();
                }
                match current() {
                    None => view! { <p>"Your illustrated storybook will appear here once generated."</p> }
                        .into_view(),
                    Some((title, image_url, caption)) => view! {
                        <div class="sheet">
                            {title.map(|t| view! { <h3>{t}</h3> })}
                            <img src=image_url alt="Storybook illustration"/>
                            {caption.map(|c| view! { <p>{c}</p> })}
                        </div>
                        <div class="nav">
                            <button
                                on:click=move |_| set_index.update(|i| *i = i.saturating_sub(1))
                                disabled=move || index.get() == 0
                            >
                                "Previous"
                            </button>
                            <span>{move || format!("{} / {}", index.get() + 1, total())}</span>
                            <button
                                on:click=move |_| set_index.update(|i| *i += 1)
                                disabled=move || index.get() + 1 >= total()
                            >
                                "Next"
                            </button>
                        </div>
                    }
                    .into_view(),
                }
            }}
        </section>
    }
}
