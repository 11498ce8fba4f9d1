use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

use grapherex_wallet_lib::security::init_security_config_from_env;
use grapherex_wallet_lib::{
    CredentialType, Currency, SendRequest, TransactionDirection, TransactionQuery, Wallet,
    WalletContext, WalletError, WalletResult,
};

#[derive(Parser)]
#[command(name = "grapherex-wallet", version, about = "Grapherex wallet backend client")]
struct Cli {
    /// Directory holding the wallet config and keychain
    #[arg(long, default_value = ".grapherex-wallet")]
    data_dir: PathBuf,

    /// PIN for wallets protected by one
    #[arg(long, global = true)]
    pin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List supported currencies
    Currencies,
    /// List wallets with balances and local names
    Wallets {
        /// Include wallets hidden locally
        #[arg(long)]
        all: bool,
    },
    /// Refresh one wallet
    WalletInfo(WalletArg),
    /// Create a wallet for a currency
    CreateWallet {
        #[arg(long)]
        currency: String,
        #[arg(long)]
        password: String,
    },
    /// Send funds from a wallet
    Send(SendArgs),
    /// Transaction history of a wallet
    Transactions(TransactionArgs),
    /// Set the initial password of a wallet
    SetFirstPassword {
        #[command(flatten)]
        wallet: WalletArg,
        #[arg(long)]
        password: String,
    },
    /// Change a wallet's password
    ChangePassword {
        #[command(flatten)]
        wallet: WalletArg,
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// Default fee of a currency
    BaseFee {
        #[arg(long)]
        currency: String,
    },
    /// Wallets of another account that can receive funds
    Recipients {
        #[arg(long)]
        account: String,
    },
    /// Local names, PINs and visibility
    #[command(subcommand)]
    Credentials(CredentialsCommand),
}

#[derive(Args)]
struct WalletArg {
    #[arg(long = "wallet")]
    wallet_id: String,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    wallet: WalletArg,
    #[arg(long)]
    to: String,
    #[arg(long)]
    amount: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    fee: Option<String>,
    #[arg(long, requires = "gas_limit")]
    gas_price: Option<String>,
    #[arg(long, requires = "gas_price")]
    gas_limit: Option<u64>,
}

#[derive(Args)]
struct TransactionArgs {
    #[command(flatten)]
    wallet: WalletArg,
    #[arg(long, default_value_t = grapherex_wallet_lib::api::DEFAULT_TRANSACTION_PAGE)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
    /// `in` or `out`
    #[arg(long)]
    direction: Option<String>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long)]
    ascending: bool,
}

#[derive(Subcommand)]
enum CredentialsCommand {
    /// Show the stored credentials of every wallet
    Show,
    SetName {
        #[command(flatten)]
        wallet: WalletArg,
        #[arg(long)]
        name: String,
    },
    SetPin {
        #[command(flatten)]
        wallet: WalletArg,
        #[arg(long = "new-pin")]
        new_pin: String,
    },
    ResetName(WalletArg),
    ResetPin(WalletArg),
    Hide(WalletArg),
    Unhide(WalletArg),
    /// Remove all local credentials, the wallet token and PIN sessions
    Wipe,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let security = match init_security_config_from_env() {
        Ok(security) => security,
        Err(e) => {
            eprintln!("Configuration error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::new()
        .filter_level(security.log_level())
        .parse_env("RUST_LOG")
        .init();

    let context = match WalletContext::initialize(&cli.data_dir, security) {
        Ok(context) => context,
        Err(e) => {
            log::error!("Failed to open wallet data in {}: {}", cli.data_dir.display(), e);
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    match run(&context, cli.command, cli.pin.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(context: &WalletContext, command: Command, pin: Option<&str>) -> WalletResult<()> {
    let api = context.api();
    match command {
        Command::Currencies => {
            for currency in api.get_currencies().await? {
                println!(
                    "{:<8} {:<20} rate {} {}  fee {}  decimals {}",
                    currency.symbol,
                    currency.name,
                    currency.rate,
                    currency.rate_symbol,
                    currency.base_fee,
                    currency.decimal_digits
                );
            }
        }
        Command::Wallets { all } => {
            let (response, _) = api.init_wallets().await?;
            println!(
                "Total: {} {}",
                response.fiat_total_balance, response.fiat_currency
            );
            for wallet in response.wallets.iter().filter(|w| all || !w.is_hidden()) {
                print_wallet(wallet);
            }
        }
        Command::WalletInfo(arg) => {
            let (wallet, _) = open_wallet(context, &arg.wallet_id, pin).await?;
            print_wallet(&api.get_wallet_info(&wallet).await?);
        }
        Command::CreateWallet { currency, password } => {
            let currencies = api.get_currencies().await?;
            let currency = find_currency(&currencies, &currency)?;
            let address = api
                .create_wallet(&currency, &SecretString::from(password))
                .await?;
            println!("Created {} wallet {}", currency.symbol, address);
        }
        Command::Send(args) => {
            let (wallet, _) = open_wallet(context, &args.wallet.wallet_id, pin).await?;
            let mut send = SendRequest::new(SecretString::from(args.password), args.to, args.amount);
            if let Some(fee) = args.fee {
                send = send.with_fee(fee);
            }
            if let (Some(price), Some(limit)) = (args.gas_price, args.gas_limit) {
                send = send.with_gas(price, limit);
            }
            let hash = api.send_currency(&wallet, &send).await?;
            println!("Transaction {}", hash);
        }
        Command::Transactions(args) => {
            let (wallet, currencies) = open_wallet(context, &args.wallet.wallet_id, pin).await?;
            let direction = match args.direction.as_deref() {
                Some(name) => Some(TransactionDirection::from_name(name).ok_or_else(|| {
                    WalletError::ValidationError(format!("Unknown direction '{}'", name))
                })?),
                None => None,
            };
            let query = TransactionQuery {
                limit: args.limit,
                offset: args.offset,
                direction,
                sort_by: args.sort_by,
                ascending: args.ascending,
            };
            for tx in api.get_transactions(&wallet, &currencies, &query).await? {
                println!(
                    "{} {:<3} {} {}  {} -> {}  {}",
                    tx.created_at,
                    tx.direction.as_str(),
                    tx.amount,
                    tx.currency.symbol,
                    tx.sender,
                    tx.recipient,
                    tx.hash
                );
            }
        }
        Command::SetFirstPassword { wallet, password } => {
            let (wallet, _) = open_wallet(context, &wallet.wallet_id, pin).await?;
            api.set_first_password(&wallet, &SecretString::from(password))
                .await?;
            println!("Password set for wallet {}", wallet.id);
        }
        Command::ChangePassword {
            wallet,
            old_password,
            new_password,
        } => {
            let (wallet, _) = open_wallet(context, &wallet.wallet_id, pin).await?;
            api.change_password(
                &wallet,
                &SecretString::from(old_password),
                &SecretString::from(new_password),
            )
            .await?;
            println!("Password changed for wallet {}", wallet.id);
        }
        Command::BaseFee { currency } => {
            let currencies = api.get_currencies().await?;
            let currency = find_currency(&currencies, &currency)?;
            let fee = api.get_base_fee(&currency).await?;
            println!("{} {}", fee.formatted, currency.symbol);
        }
        Command::Recipients { account } => {
            let currencies = api.get_currencies().await?;
            for wallet in api.get_recipient_wallets(&account, &currencies).await? {
                println!("{} {:<8} {}", wallet.id, wallet.currency.symbol, wallet.address);
            }
        }
        Command::Credentials(command) => run_credentials(context, command)?,
    }
    Ok(())
}

fn run_credentials(context: &WalletContext, command: CredentialsCommand) -> WalletResult<()> {
    let credentials = context.credentials();
    match command {
        CredentialsCommand::Show => {
            for entry in credentials.load_all_credentials()? {
                println!(
                    "{}  name: {}  pin: {}  hidden: {}",
                    entry.id,
                    entry.name.as_deref().unwrap_or("-"),
                    if entry.pin.is_some() { "set" } else { "-" },
                    entry.is_hidden
                );
            }
        }
        CredentialsCommand::SetName { wallet, name } => {
            credentials.update_credential(CredentialType::Name, Some(name), &wallet.wallet_id)?;
        }
        CredentialsCommand::SetPin { wallet, new_pin } => {
            credentials.update_credential(CredentialType::Pin, Some(new_pin), &wallet.wallet_id)?;
        }
        CredentialsCommand::ResetName(wallet) => {
            credentials.reset_credential(CredentialType::Name, &wallet.wallet_id)?;
        }
        CredentialsCommand::ResetPin(wallet) => {
            credentials.reset_credential(CredentialType::Pin, &wallet.wallet_id)?;
        }
        CredentialsCommand::Hide(wallet) => {
            credentials.set_hidden(&wallet.wallet_id, true)?;
        }
        CredentialsCommand::Unhide(wallet) => {
            credentials.set_hidden(&wallet.wallet_id, false)?;
        }
        CredentialsCommand::Wipe => {
            context.reset()?;
            println!("Local wallet data removed");
        }
    }
    Ok(())
}

/// Fetch the wallet list, pick `wallet_id` and pass its PIN gate.
async fn open_wallet(
    context: &WalletContext,
    wallet_id: &str,
    pin: Option<&str>,
) -> WalletResult<(Wallet, Vec<Currency>)> {
    let pin_lock = context.pin_lock();
    if pin_lock.requires_pin(wallet_id)? {
        if let Some(pin) = pin {
            pin_lock.unlock(wallet_id, pin)?;
        }
        pin_lock.ensure_unlocked(wallet_id)?;
    }

    let (response, currencies) = context.api().init_wallets().await?;
    let wallet = response
        .wallets
        .into_iter()
        .find(|w| w.id == wallet_id)
        .ok_or_else(|| WalletError::NotFound(format!("Wallet {}", wallet_id)))?;
    Ok((wallet, currencies))
}

fn find_currency(currencies: &[Currency], symbol: &str) -> WalletResult<Currency> {
    currencies
        .iter()
        .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
        .cloned()
        .ok_or_else(|| WalletError::NotFound(format!("Currency {}", symbol)))
}

fn print_wallet(wallet: &Wallet) {
    println!(
        "{}  {:<20} {} {} ({} {})  {}{}",
        wallet.id,
        wallet.display_name(),
        wallet.balance,
        wallet.currency.symbol,
        wallet.fiat_balance,
        wallet.fiat_currency,
        wallet.address,
        if wallet.has_pin() { "  [pin]" } else { "" }
    );
}
