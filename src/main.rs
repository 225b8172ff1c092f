use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flashcard_generator::archive::TopicArchive;
use flashcard_generator::auth::{IdentityProvider, LocalIdentityProvider};
use flashcard_generator::completion::CompletionTracker;
use flashcard_generator::database::{SqliteStorage, Storage};
use flashcard_generator::export::export_to_file;
use flashcard_generator::preferences::{ApiKeyStore, ThemePreference, mask};
use flashcard_generator::{Config, Flashcard, FlashcardGenerator, GenerationStatus};

#[derive(Parser)]
#[command(name = "flashcards", about = "Generate study flashcards for any topic")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login { email: String, password: String },
    /// Create an account
    Signup { email: String, password: String },
    /// Sign out, keeping the API key and saved topics
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage the saved API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Show or toggle dark mode
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Generate flashcards for a topic
    Generate {
        topic: String,
        /// API key for this request; falls back to the saved key
        #[arg(long)]
        key: Option<String>,
        /// Save the result to your topics
        #[arg(long)]
        save: bool,
        /// Write the result as CSV
        #[arg(long)]
        export: Option<Option<PathBuf>>,
    },
    /// Mark a flashcard as reviewed
    Complete { term: String, definition: String },
    /// Browse saved topics
    Topics {
        #[command(subcommand)]
        action: TopicAction,
    },
    /// Show profile statistics
    Profile {
        /// Change the account email
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    Set { key: String },
    Clear,
    Show {
        #[arg(long)]
        reveal: bool,
    },
}

#[derive(Subcommand)]
enum TopicAction {
    List,
    Show { id: String },
    Delete { id: String },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flashcard_generator=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_flashcards(flashcards: &[Flashcard], tracker: &CompletionTracker) {
    for (i, card) in flashcards.iter().enumerate() {
        let mark = if tracker.is_completed(card) { "✅" } else { "  " };
        println!("{} {:>3}. {}", mark, i + 1, card.term);
        println!("        {}", card.definition);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let storage: Arc<dyn Storage> =
        Arc::new(SqliteStorage::open(&PathBuf::from(&config.database.db_file)).await?);
    let auth = LocalIdentityProvider::new(storage.clone());

    match cli.command {
        Command::Login { email, password } => {
            let user = auth.sign_in(&email, &password).await?;
            println!("👋 Signed in as {} ({})", user.username, user.email);
        }
        Command::Signup { email, password } => {
            let user = auth.sign_up(&email, &password).await?;
            println!("✨ Account created for {}", user.email);
        }
        Command::Logout => {
            auth.sign_out().await?;
            println!("👋 Signed out");
        }
        Command::Whoami => match auth.current_user().await? {
            Some(user) => println!("{} <{}>", user.username, user.email),
            None => println!("Not signed in"),
        },
        Command::Key { action } => {
            let keys = ApiKeyStore::new(storage.clone());
            match action {
                KeyAction::Set { key } => {
                    keys.save(&key).await?;
                    println!("🔑 API key saved");
                }
                KeyAction::Clear => {
                    keys.save("").await?;
                    println!("🔑 API key removed");
                }
                KeyAction::Show { reveal } => match keys.stored().await? {
                    Some(key) if reveal => println!("{}", key),
                    Some(key) => println!("{}", mask(&key)),
                    None => println!("No API key saved"),
                },
            }
        }
        Command::Theme { toggle } => {
            let theme = ThemePreference::new(storage.clone());
            let dark = if toggle {
                theme.toggle().await?
            } else {
                theme.is_dark().await?
            };
            println!("{}", if dark { "🌙 Dark mode" } else { "☀️  Light mode" });
        }
        Command::Generate {
            topic,
            key,
            save,
            export,
        } => {
            let keys = ApiKeyStore::new(storage.clone());
            let mut api_key = keys.resolve(key.as_deref().unwrap_or("")).await?;
            if api_key.is_empty() {
                api_key = config.api.api_key.clone().unwrap_or_default();
            }

            println!("🔄 Generating flashcards...");
            let mut generator = FlashcardGenerator::new(&config);
            let state = generator.generate(&topic, &api_key).await;

            if state.status != GenerationStatus::Succeeded {
                anyhow::bail!("{}", state.error_message());
            }

            let tracker = CompletionTracker::load(storage.clone()).await?;
            println!("📝 {} flashcards for {:?}", state.flashcards.len(), topic);
            print_flashcards(&state.flashcards, &tracker);

            if save {
                let mut archive = TopicArchive::load(storage.clone(), auth.current_user().await?).await?;
                match archive.add_topic(&topic, &state.flashcards).await? {
                    Some(id) => println!("💾 Saved as topic {}", id),
                    None => println!("⚠️  Sign in to save topics"),
                }
            }

            if let Some(path) = export {
                let path = path.unwrap_or_else(|| PathBuf::from(&config.output.export_file));
                export_to_file(&state.flashcards, &path)?;
                println!("📄 Exported to {}", path.display());
            }
        }
        Command::Complete { term, definition } => {
            let mut tracker = CompletionTracker::load(storage.clone()).await?;
            let card = Flashcard::new(term, definition);
            if tracker.mark_completed(&card).await? {
                println!("✅ Marked {:?} as reviewed", card.term);
            } else {
                println!("Already reviewed");
            }
        }
        Command::Topics { action } => {
            let mut archive = TopicArchive::load(storage.clone(), auth.current_user().await?).await?;
            if archive.user().is_none() {
                anyhow::bail!("Sign in to browse saved topics");
            }
            match action {
                TopicAction::List => {
                    if !archive.has_topics() {
                        println!("No saved topics yet");
                    }
                    for topic in archive.topics() {
                        println!(
                            "{}  {}  ({} cards, {})",
                            topic.id,
                            topic.name,
                            topic.flashcard_count,
                            topic.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
                TopicAction::Show { id } => {
                    let Some(topic) = archive.topic(&id) else {
                        anyhow::bail!("No topic with id {}", id);
                    };
                    println!("📚 {}", topic.name);
                    let tracker = CompletionTracker::load(storage.clone()).await?;
                    print_flashcards(&archive.topic_flashcards(&id), &tracker);
                }
                TopicAction::Delete { id } => {
                    archive.delete_topic(&id).await?;
                    println!("🗑️  Deleted {}", id);
                }
            }
        }
        Command::Profile { email } => {
            let mut user = auth
                .current_user()
                .await?
                .ok_or_else(|| anyhow::anyhow!("Sign in to view your profile"))?;
            if let Some(email) = email {
                user = auth.update_email(&email).await?;
                println!("Profile updated successfully!");
            }

            let archive = TopicArchive::load(storage.clone(), Some(user.clone())).await?;
            let stats = archive.user_stats();
            println!("👤 {} <{}>", user.username, user.email);
            println!("   Topics explored: {}", stats.topics_explored);
            println!("   Total flashcards: {}", stats.total_flashcards);
        }
    }

    Ok(())
}
