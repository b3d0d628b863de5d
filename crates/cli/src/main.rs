//! Secure Store CLI - Drive the client state layer from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Check the backend
//! ss-cli health
//!
//! # Log in (password from --password or STORE_PASSWORD)
//! ss-cli login -u alice
//!
//! # Browse and fill the cart
//! ss-cli products
//! ss-cli cart add prod-123
//! ss-cli cart update prod-123 3
//!
//! # Place an order
//! ss-cli checkout submit --name "Alice" --address "1 Main St" --city Springfield \
//!     --state IL --zip 62701 --country US --email alice@example.com
//! ```
//!
//! # Commands
//!
//! - `health` - Check backend health
//! - `login` / `register` / `logout` / `whoami` / `refresh` - Session management
//! - `products` / `orders` - Catalog and order history
//! - `cart` - Show and edit the active cart
//! - `checkout` - Submit an order and follow its payment
//!
//! State is kept under `STORE_DATA_DIR`, so a cart built while logged out is
//! merged into the user's cart on the next `login`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use secure_store_client::api::types::ShippingInfo;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ss-cli")]
#[command(author, version, about = "Secure Store client CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check backend health
    Health,
    /// Log in and store the session
    Login(CredentialArgs),
    /// Create an account
    Register(CredentialArgs),
    /// End the stored session
    Logout,
    /// Show the current user
    Whoami,
    /// Refresh the stored token
    Refresh,
    /// List products
    Products,
    /// List your orders
    Orders,
    /// Show or edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place and follow an order
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
}

#[derive(Args)]
struct CredentialArgs {
    /// Account name
    #[arg(short, long)]
    username: String,

    /// Account password
    #[arg(short, long, env = "STORE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the active cart
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        product_id: String,
    },
    /// Set a product's quantity (0 removes it)
    Update {
        /// Product ID
        product_id: String,
        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product
    Remove {
        /// Product ID
        product_id: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Submit the cart as an order
    Submit(ShippingArgs),
    /// Show the payment status of the current order
    Status,
    /// Leave the checkout flow
    Finish,
}

#[derive(Args)]
struct ShippingArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    zip: String,
    #[arg(long)]
    country: String,
    #[arg(long)]
    email: String,
}

impl From<ShippingArgs> for ShippingInfo {
    fn from(args: ShippingArgs) -> Self {
        Self {
            name: args.name,
            address: args.address,
            city: args.city,
            state: args.state,
            zip: args.zip,
            country: args.country,
            email: args.email,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("secure_store_client=info,ss_cli=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Health => commands::catalog::health().await?,
        Commands::Login(args) => commands::session::login(&args.username, &args.password).await?,
        Commands::Register(args) => {
            commands::session::register(&args.username, &args.password).await?;
        }
        Commands::Logout => commands::session::logout()?,
        Commands::Whoami => commands::session::whoami().await?,
        Commands::Refresh => commands::session::refresh().await?,
        Commands::Products => commands::catalog::products().await?,
        Commands::Orders => commands::catalog::orders().await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show().await?,
            CartAction::Add { product_id } => commands::cart::add(&product_id).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&product_id, quantity).await?,
            CartAction::Remove { product_id } => commands::cart::remove(&product_id).await?,
            CartAction::Clear => commands::cart::clear().await?,
        },
        Commands::Checkout { action } => match action {
            CheckoutAction::Submit(shipping) => {
                commands::checkout::submit(shipping.into()).await?;
            }
            CheckoutAction::Status => commands::checkout::status().await?,
            CheckoutAction::Finish => commands::checkout::finish()?,
        },
    }
    Ok(())
}
