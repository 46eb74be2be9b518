//! Souq CLI - drive the cart and checkout client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in with a token issued by the backend
//! souq login --token "$TOKEN"
//!
//! # Switch language
//! souq lang set ar
//!
//! # Build a cart
//! souq cart add 5 --quantity 2
//! souq cart coupon apply RAMADAN10
//! souq cart show
//!
//! # Place a cash-on-delivery order
//! souq checkout --name "Mona Adel" --phone 01000000000 \
//!     --governorate Giza --city Dokki --street "12 Tahrir St"
//!
//! # Follow up
//! souq orders list
//! souq orders track 42
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` - Start or end the persisted session
//! - `lang` - Show or change the active locale
//! - `cart` - Show and modify the server-held cart
//! - `checkout` - Submit the cart as an order
//! - `orders` - Order history, detail, tracking and cancellation

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use souq_core::ShippingAddress;
use souq_storefront::{CheckoutForm, ClientConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "souq")]
#[command(author, version, about = "Souq storefront cart and checkout client")]
struct Cli {
    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token issued by the backend
    Login {
        /// Bearer token
        #[arg(long)]
        token: String,
    },
    /// Forget the stored token and the local cart
    Logout,
    /// Show or change the active locale
    Lang {
        #[command(subcommand)]
        action: LangAction,
    },
    /// Show and modify the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Submit the cart as a cash-on-delivery order
    Checkout(CheckoutArgs),
    /// Order history and follow-ups
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum LangAction {
    /// Print the active locale
    Get,
    /// Set the active locale (e.g. `en`, `ar`)
    Set { locale: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Fetch and print the cart
    Show,
    /// Add a product
    Add {
        product_id: i64,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a product in the cart
    Update {
        product_id: i64,
        #[arg(short, long)]
        quantity: u32,
    },
    /// Remove a product
    Remove { product_id: i64 },
    /// Empty the cart
    Clear,
    /// Apply or remove a coupon
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Apply a coupon code
    Apply { code: String },
    /// Remove the applied coupon
    Remove,
}

#[derive(Args)]
struct CheckoutArgs {
    /// Recipient name
    #[arg(long)]
    name: String,
    /// Recipient phone
    #[arg(long)]
    phone: String,
    /// Governorate / region
    #[arg(long)]
    governorate: String,
    #[arg(long)]
    city: String,
    /// Street address
    #[arg(long)]
    street: String,
    #[arg(long)]
    building: Option<String>,
    #[arg(long)]
    floor: Option<String>,
    #[arg(long)]
    apartment: Option<String>,
    #[arg(long)]
    landmark: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
    /// Delivery notes
    #[arg(long, default_value = "")]
    notes: String,
    /// Coupon code to send with the order
    #[arg(long)]
    coupon: Option<String>,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders
    List {
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one order
    Show { id: i64 },
    /// Show delivery tracking for an order
    Track { id: i64 },
    /// Cancel an order
    Cancel {
        id: i64,
        #[arg(long)]
        reason: Option<String>,
    },
}

impl From<CheckoutArgs> for CheckoutForm {
    fn from(args: CheckoutArgs) -> Self {
        Self {
            address: ShippingAddress {
                recipient_name: args.name,
                phone: args.phone,
                governorate: args.governorate,
                city: args.city,
                street: args.street,
                building: args.building,
                floor: args.floor,
                apartment: args.apartment,
                landmark: args.landmark,
                postal_code: args.postal_code,
            },
            notes: args.notes,
            coupon_code: args.coupon,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed before tracing so Sentry can be initialized first
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Logs go to stderr; stdout is reserved for command output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "souq_storefront=info,souq_cli=info".into());

    // JSON lines for log shippers, text for humans
    let log_json = std::env::var("SOUQ_LOG_JSON").is_ok_and(|v| v == "true" || v == "1");
    let json_layer = log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), commands::CliError> {
    let app = commands::App::new(config, cli.json)?;

    match cli.command {
        Commands::Login { token } => commands::session::login(&app, token)?,
        Commands::Logout => commands::session::logout(&app)?,
        Commands::Lang { action } => match action {
            LangAction::Get => commands::session::show_language(&app),
            LangAction::Set { locale } => commands::session::set_language(&app, &locale)?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&app).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&app, product_id, quantity).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&app, product_id, quantity).await?,
            CartAction::Remove { product_id } => commands::cart::remove(&app, product_id).await?,
            CartAction::Clear => commands::cart::clear(&app).await?,
            CartAction::Coupon { action } => match action {
                CouponAction::Apply { code } => commands::cart::apply_coupon(&app, &code).await?,
                CouponAction::Remove => commands::cart::remove_coupon(&app).await?,
            },
        },
        Commands::Checkout(args) => commands::checkout::submit(&app, args.into()).await?,
        Commands::Orders { action } => match action {
            OrdersAction::List { page } => commands::orders::list(&app, page).await?,
            OrdersAction::Show { id } => commands::orders::show(&app, id).await?,
            OrdersAction::Track { id } => commands::orders::track(&app, id).await?,
            OrdersAction::Cancel { id, reason } => {
                commands::orders::cancel(&app, id, reason.as_deref()).await?;
            }
        },
    }
    Ok(())
}
