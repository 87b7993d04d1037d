//! sweet-shop CLI
//!
//! Storefront and admin front end over the shop REST API.
//!
//! Usage:
//!   sweet-shop login -u alice -p secret
//!   sweet-shop search --category chocolate --max-price 5
//!   sweet-shop watch          # type `name=choc`, `category=mint`, `clear`, `quit`
//!   sweet-shop purchase -i 3 -q 2

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sweet_shop::auth::{inspect_token, TokenStatus};
use sweet_shop::config::{self, Config};
use sweet_shop::error::ApiError;
use sweet_shop::forms::{format_price, purchase_total, SweetForm};
use sweet_shop::models::{Credentials, RegisterUser, Sweet};
use sweet_shop::query::{FilterField, SearchDebouncer, SearchFilters};
use sweet_shop::rest::{ApiClient, Navigator};
use sweet_shop::session::SessionContext;
use sweet_shop::shop::{Listing, ListingSink, ResultSlot, Storefront};
use sweet_shop::storage::TokenStore;

#[derive(Parser)]
#[command(name = "sweet-shop")]
#[command(about = "Storefront and admin client for the sweet shop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (overrides SWEET_SHOP_API_URL)
    #[arg(short, long)]
    url: Option<String>,

    /// Token store directory (overrides SWEET_SHOP_DATA_DIR)
    #[arg(long)]
    data_dir: Option<String>,

    /// Mirror logs to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        email: Option<String>,
    },
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    /// Show the current session
    Whoami,
    List,
    Search {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        min_price: Option<String>,
        #[arg(long)]
        max_price: Option<String>,
    },
    /// Interactive search: reads `field=value` lines and re-queries after a quiet period
    Watch,
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        category: String,
        #[arg(short, long)]
        price: String,
        #[arg(short, long)]
        quantity: String,
    },
    Edit {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        price: Option<String>,
        #[arg(short, long)]
        quantity: Option<String>,
    },
    Delete {
        #[arg(short, long)]
        id: String,
    },
    Purchase {
        #[arg(short, long)]
        id: String,
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    Restock {
        #[arg(short, long)]
        id: String,
        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,
    },
}

/// Forced logout lands here: republish the session, then point the user at `login`
struct CliNavigator {
    session: Arc<SessionContext>,
}

impl Navigator for CliNavigator {
    fn redirect(&self, path: &str) {
        self.session.redirect(path);
        eprintln!("Session is no longer valid. Run `sweet-shop login` to sign in again.");
    }
}

fn init_logging(log_dir: &str, verbose: bool) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "sweet-shop.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(stderr_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    // Subscriber goes in first so config fallbacks are logged
    let _guard = init_logging(&config::log_dir(), cli.verbose);
    let config = Config::load();

    let base_url = cli.url.clone().unwrap_or(config.api_base_url.clone());
    let data_dir = cli.data_dir.clone().unwrap_or(config.data_dir.clone());
    info!("Using API {} with token store at {}", base_url, data_dir);

    let store = TokenStore::open(&data_dir)?;
    let session = SessionContext::new(store.clone());
    session.initialize();

    let navigator = Arc::new(CliNavigator {
        session: Arc::clone(&session),
    });
    let api = ApiClient::new(&base_url, config.http_timeout, store, navigator)?;
    let shop = Storefront::new(api, session);

    let (result, fallback) = match cli.command {
        Commands::Register { username, password, email } => (
            register(&shop, RegisterUser { username, password, email }).await,
            "Registration failed",
        ),
        Commands::Login { username, password } => (
            login(&shop, Credentials { username, password }).await,
            "Login failed",
        ),
        Commands::Logout => {
            let result = shop.logout().map(|_| println!("Logged out (token removed)."));
            (result, "Logout failed")
        }
        Commands::Whoami => (whoami(&shop), "Could not read session"),
        Commands::List => (list(&shop, SearchFilters::default()).await, "Failed to fetch sweets"),
        Commands::Search { name, category, min_price, max_price } => {
            let filters = SearchFilters {
                name: name.unwrap_or_default(),
                category: category.unwrap_or_default(),
                min_price: min_price.unwrap_or_default(),
                max_price: max_price.unwrap_or_default(),
            };
            (list(&shop, filters).await, "Failed to fetch sweets")
        }
        Commands::Watch => (watch(&shop, config.debounce).await, "Search failed"),
        Commands::Add { name, category, price, quantity } => {
            let form = SweetForm { name, category, price, quantity };
            let result = shop.save(None, &form).await.map(|sweet| {
                println!("Sweet created successfully!");
                print_sweets(&[sweet]);
            });
            (result, "Failed to create sweet")
        }
        Commands::Edit { id, name, category, price, quantity } => (
            edit(&shop, &id, name, category, price, quantity).await,
            "Failed to update sweet",
        ),
        Commands::Delete { id } => {
            let result = shop
                .delete(&id)
                .await
                .map(|_| println!("Sweet deleted successfully!"));
            (result, "Failed to delete sweet")
        }
        Commands::Purchase { id, quantity } => (
            purchase(&shop, &id, quantity).await,
            "Purchase failed. Please try again.",
        ),
        Commands::Restock { id, quantity } => {
            let result = shop.restock(&id, quantity).await.map(|sweet| {
                println!("Restocked. {} now has {} in stock.", sweet.name, sweet.quantity);
            });
            (result, "Restock failed")
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Command failed: {}", e);
            // The navigator already printed the login hint for a 401
            if !e.is_unauthorized() {
                eprintln!("Error: {}", e.user_message(fallback));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn register(shop: &Storefront, user: RegisterUser) -> Result<(), ApiError> {
    let username = user.username.clone();
    let response = shop.register(&user).await?;
    match (&response.token, shop.session().session()) {
        (Some(_), Some(session)) => println!("Registered and logged in as {}", session.username),
        _ => println!(
            "{} Run `sweet-shop login -u {}` to sign in.",
            response.message.as_deref().unwrap_or("Registration successful."),
            username
        ),
    }
    Ok(())
}

async fn login(shop: &Storefront, credentials: Credentials) -> Result<(), ApiError> {
    match shop.login(&credentials).await? {
        Some(session) => {
            let role = if session.is_admin() { " (admin)" } else { "" };
            println!("Logged in as {}{}", session.username, role);
        }
        None => println!("Logged in, but the issued token carries no readable session."),
    }
    Ok(())
}

fn whoami(shop: &Storefront) -> Result<(), ApiError> {
    let snapshot = shop.session().snapshot();
    if snapshot.loading {
        println!("Session still loading");
        return Ok(());
    }

    if let Some(session) = &snapshot.session {
        let expires = chrono::DateTime::from_timestamp(session.exp as i64, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| session.exp.to_string());
        println!("User:    {}", session.username);
        println!("Id:      {}", session.sub);
        println!(
            "Roles:   {}",
            session.roles.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        println!("Admin:   {}", if snapshot.is_admin() { "yes" } else { "no" });
        println!("Expires: {}", expires);
        return Ok(());
    }

    // Anonymous: say why, when there is a reason to give
    match shop.session().token_store().get()? {
        None => println!("Not logged in"),
        Some(token) => match inspect_token(&token, chrono::Utc::now().timestamp_millis()) {
            TokenStatus::Expired(s) => println!("Session for {} has expired; please log in again", s.username),
            TokenStatus::Malformed => println!("Stored token is unreadable; please log in again"),
            TokenStatus::Valid(_) => println!("Not logged in"),
        },
    }
    Ok(())
}

async fn list(shop: &Storefront, filters: SearchFilters) -> Result<(), ApiError> {
    let sweets = shop.browse(&filters.to_query()).await?;
    print_sweets(&sweets);
    Ok(())
}

async fn edit(
    shop: &Storefront,
    id: &str,
    name: Option<String>,
    category: Option<String>,
    price: Option<String>,
    quantity: Option<String>,
) -> Result<(), ApiError> {
    let mut form = SweetForm::from_sweet(&shop.find_sweet(id).await?);
    if let Some(name) = name {
        form.name = name;
    }
    if let Some(category) = category {
        form.category = category;
    }
    if let Some(price) = price {
        form.price = price;
    }
    if let Some(quantity) = quantity {
        form.quantity = quantity;
    }

    let sweet = shop.save(Some(id), &form).await?;
    println!("Sweet updated successfully!");
    print_sweets(&[sweet]);
    Ok(())
}

async fn purchase(shop: &Storefront, id: &str, quantity: i64) -> Result<(), ApiError> {
    let sweet = shop.find_sweet(id).await?;
    let updated = shop.purchase(&sweet, quantity).await?;
    println!(
        "Purchase completed successfully! {} x {} for {}",
        quantity,
        sweet.name,
        format_price(purchase_total(&sweet, quantity as u32))
    );
    println!("{} left in stock.", updated.quantity);
    Ok(())
}

async fn watch(shop: &Storefront, quiet_period: std::time::Duration) -> Result<(), ApiError> {
    let slot = Arc::new(ResultSlot::default());
    let sink = Arc::new(ListingSink::new(shop.api().clone(), Arc::clone(&slot)));
    let mut debouncer = SearchDebouncer::new(sink, quiet_period);

    let mut rx = slot.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let listing: Listing = rx.borrow_and_update().clone();
            if let Some(message) = &listing.error {
                eprintln!("Error: {}", message);
            } else {
                print_sweets(&listing.sweets);
            }
        }
    });

    println!("Type `field=value` (name, category, minPrice, maxPrice), `clear`, or `quit`.");
    // Initial unfiltered listing
    debouncer.clear();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "clear" => debouncer.clear(),
            _ => match line.split_once('=') {
                Some((field, value)) => match field.parse::<FilterField>() {
                    Ok(field) => debouncer.on_filter_change(field, value.trim()),
                    Err(e) => eprintln!("{}", e),
                },
                None => debouncer.on_filter_change(FilterField::Name, line),
            },
        }
    }

    // Teardown: a pending search must not fire after we're gone
    drop(debouncer);
    drop(slot);
    printer.abort();
    Ok(())
}

fn print_sweets(sweets: &[Sweet]) {
    if sweets.is_empty() {
        println!("No sweets found");
        return;
    }
    println!(
        "{:>6}  {:<24} {:<12} {:>10} {:>6}  {}",
        "ID", "NAME", "CATEGORY", "PRICE", "QTY", "STOCK"
    );
    for sweet in sweets {
        println!(
            "{:>6}  {:<24} {:<12} {:>10} {:>6}  {}",
            sweet.id,
            sweet.name,
            sweet.category,
            format_price(sweet.price),
            sweet.quantity,
            sweet.stock_level().label()
        );
    }
}
