//! Command-line interface for a local Discovera book catalog.
//!
//! Opens the sled-backed store under a data directory, runs one command, and
//! exits. Review authorship is taken from the current session, so `login` and
//! `register` affect what `review add` stamps as the reviewer name.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use discovera_core::{Book, BookId, ReadingStatus};
use discovera_engine::{BookStore, NewReview, StorageBackend, SystemClock, BOOKS_KEY};
use discovera_session::SessionStore;
use discovera_storage_sled::{SledBackend, SledBackendConfig};
use discovera_stream_local::LocalSnapshotStream;

#[derive(Parser)]
#[command(author, version, about = "Discovera book tracker", long_about = None)]
struct Cli {
    /// Data directory holding the sled database.
    #[arg(long, default_value = ".discovera")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog, optionally filtered by status and a search term
    List {
        /// Only show books with this status (want-to-read, reading, read)
        #[arg(long)]
        status: Option<String>,
        /// Case-insensitive substring match over title and author
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a single book as JSON
    Show {
        /// Book id
        id: u32,
    },
    /// Set the reading status of a book
    SetStatus {
        /// Book id
        id: u32,
        /// One of want-to-read, reading, read
        status: String,
    },
    /// Manage reviews on a book
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Register a new account (and log it in)
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in with an existing account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Clear the current session
    Logout,
    /// Print the logged-in user
    Whoami,
    /// Clear the persisted catalog so the seed list loads on next run
    Seed,
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Add a review to a book, authored by the current session
    Add {
        /// Book id
        id: u32,
        /// Review text
        text: String,
    },
    /// Remove a review from a book by position (0 is newest)
    Rm {
        /// Book id
        id: u32,
        /// Review position
        index: usize,
    },
}

fn parse_status(raw: &str) -> Result<ReadingStatus> {
    match raw {
        "want-to-read" => Ok(ReadingStatus::WantToRead),
        "reading" => Ok(ReadingStatus::Reading),
        "read" => Ok(ReadingStatus::Read),
        other => bail!("unknown status {other:?}; expected want-to-read, reading, or read"),
    }
}

fn open_store(
    backend: SledBackend,
) -> BookStore<SledBackend, LocalSnapshotStream, SystemClock> {
    BookStore::new(backend, LocalSnapshotStream::new(), SystemClock)
}

fn matches_search(book: &Book, term: &str) -> bool {
    let term = term.to_lowercase();
    book.title().to_lowercase().contains(&term) || book.author().to_lowercase().contains(&term)
}

fn list(backend: SledBackend, status: Option<String>, search: Option<String>) -> Result<()> {
    let status = status.as_deref().map(parse_status).transpose()?;
    let store = open_store(backend);
    let mut books = store.books();

    if let Some(status) = status {
        books.retain(|b| b.status() == Some(status));
    }
    if let Some(term) = &search {
        let term = term.trim();
        if !term.is_empty() {
            books.retain(|b| matches_search(b, term));
        }
    }

    if books.is_empty() {
        println!("No books match.");
        return Ok(());
    }
    for book in &books {
        let status = book
            .status()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>3}  {} by {}  [{}]  rating {}  reviews {}",
            book.id(),
            book.title(),
            book.author(),
            status,
            book.rating(),
            book.reviews().len(),
        );
    }
    Ok(())
}

fn show(backend: SledBackend, id: u32) -> Result<()> {
    let store = open_store(backend);
    match store.book_by_id(BookId::new(id)) {
        Some(book) => println!("{}", serde_json::to_string_pretty(&book)?),
        None => println!("Book {id} not found"),
    }
    Ok(())
}

fn set_status(backend: SledBackend, id: u32, status: &str) -> Result<()> {
    let status = parse_status(status)?;
    let store = open_store(backend);
    let id = BookId::new(id);
    if store.book_by_id(id).is_none() {
        println!("Book {id} not found");
        return Ok(());
    }
    store.update_status(id, status);
    println!("Book {id} marked {status}");
    Ok(())
}

fn add_review(backend: SledBackend, id: u32, text: String) -> Result<()> {
    if text.trim().is_empty() {
        bail!("review text cannot be empty");
    }
    let session = SessionStore::new(backend.clone());
    let store = open_store(backend);
    let id = BookId::new(id);
    if store.book_by_id(id).is_none() {
        println!("Book {id} not found");
        return Ok(());
    }
    let reviewer = session.display_name();
    store.add_review(
        id,
        NewReview {
            text,
            reviewer_name: Some(reviewer.clone()),
            reviewer_avatar: None,
        },
    );
    println!("Review added to book {id} as {reviewer}");
    Ok(())
}

fn rm_review(backend: SledBackend, id: u32, index: usize) -> Result<()> {
    let store = open_store(backend);
    let id = BookId::new(id);
    let book = match store.book_by_id(id) {
        Some(book) => book,
        None => {
            println!("Book {id} not found");
            return Ok(());
        }
    };
    if index >= book.reviews().len() {
        println!(
            "Book {id} has {} reviews; index {index} is out of range",
            book.reviews().len()
        );
        return Ok(());
    }
    store.delete_review(id, index);
    println!("Review {index} removed from book {id}");
    Ok(())
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let cli = Cli::parse();
    let backend = SledBackend::open(SledBackendConfig::new(&cli.data_dir))?;

    match cli.command {
        Commands::List { status, search } => list(backend, status, search)?,
        Commands::Show { id } => show(backend, id)?,
        Commands::SetStatus { id, status } => set_status(backend, id, &status)?,
        Commands::Review { command } => match command {
            ReviewCommands::Add { id, text } => add_review(backend, id, text)?,
            ReviewCommands::Rm { id, index } => rm_review(backend, id, index)?,
        },
        Commands::Register {
            email,
            username,
            password,
        } => {
            let session = SessionStore::new(backend);
            match session.register(&email, &username, &password) {
                Ok(user) => println!("Registered and logged in as {}", user.username),
                Err(err) => println!("Registration failed: {err}"),
            }
        }
        Commands::Login { email, password } => {
            let session = SessionStore::new(backend);
            match session.login(&email, &password) {
                Ok(user) => println!("Logged in as {}", user.username),
                Err(err) => println!("Login failed: {err}"),
            }
        }
        Commands::Logout => {
            SessionStore::new(backend).logout();
            println!("Logged out");
        }
        Commands::Whoami => match SessionStore::new(backend).current_user() {
            Some(user) => println!("{} <{}>", user.username, user.email),
            None => println!("Not logged in"),
        },
        Commands::Seed => {
            backend.remove(BOOKS_KEY)?;
            println!("Catalog cleared; the seed list will load on next run");
        }
    }

    Ok(())
}
