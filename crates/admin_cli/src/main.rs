use std::error::Error;

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{AdjustBalanceCmd, Engine, EngineConfig, RegisterUserCmd, Role};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "walletpoint_admin")]
#[command(about = "Admin utilities for WalletPoint (bootstrap users, freeze and adjust wallets)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./walletpoint.db?mode=rwc"
    )]
    database_url: String,

    /// Secret the server signs QR codes with.
    #[arg(long, env = "WALLETPOINT__ENGINE__QR_SIGNING_SECRET", hide_env_values = true)]
    qr_signing_secret: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Wallet(Wallet),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Admin,
    Lecturer,
    Student,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Admin => Role::Admin,
            RoleArg::Lecturer => Role::Lecturer,
            RoleArg::Student => Role::Student,
        }
    }
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    full_name: String,
    #[arg(long, value_enum, default_value = "student")]
    role: RoleArg,
}

#[derive(Args, Debug)]
struct Wallet {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    Freeze(FreezeArgs),
    Unfreeze(UnfreezeArgs),
    Adjust(AdjustArgs),
}

#[derive(Args, Debug)]
struct FreezeArgs {
    /// Username of the acting admin.
    #[arg(long)]
    admin: String,
    #[arg(long)]
    user: String,
    #[arg(long)]
    reason: String,
}

#[derive(Args, Debug)]
struct UnfreezeArgs {
    #[arg(long)]
    admin: String,
    #[arg(long)]
    user: String,
}

#[derive(Args, Debug)]
struct AdjustArgs {
    #[arg(long)]
    admin: String,
    #[arg(long)]
    user: String,
    /// Signed amount; negative values debit the wallet.
    #[arg(long, allow_negative_numbers = true)]
    amount: i64,
    #[arg(long)]
    reason: String,
    /// Idempotency key; rerunning with the same key replays the adjustment.
    #[arg(long)]
    key: String,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .config(EngineConfig::new(cli.qr_signing_secret))
        .build()
        .await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let cmd = RegisterUserCmd::new(args.username, args.full_name, args.role.into());
            let (user, wallet) = engine.register_user(cmd).await?;
            println!(
                "created user: {} ({}) with wallet {}",
                user.username, user.id, wallet.id
            );
        }
        Command::Wallet(Wallet {
            command: WalletCommand::Freeze(args),
        }) => {
            let admin = engine.user_by_username(&args.admin).await?;
            let user = engine.user_by_username(&args.user).await?;
            engine
                .freeze_wallet(admin.id, user.id, &args.reason)
                .await?;
            println!("froze wallet of {}", user.username);
        }
        Command::Wallet(Wallet {
            command: WalletCommand::Unfreeze(args),
        }) => {
            let admin = engine.user_by_username(&args.admin).await?;
            let user = engine.user_by_username(&args.user).await?;
            engine.unfreeze_wallet(admin.id, user.id).await?;
            println!("unfroze wallet of {}", user.username);
        }
        Command::Wallet(Wallet {
            command: WalletCommand::Adjust(args),
        }) => {
            let admin = engine.user_by_username(&args.admin).await?;
            let user = engine.user_by_username(&args.user).await?;
            let key = args.key;
            let receipt = engine
                .adjust_balance(AdjustBalanceCmd::new(
                    admin.id,
                    user.id,
                    args.amount,
                    args.reason,
                    key.clone(),
                ))
                .await?;
            let balance = engine.wallet(user.id).await?.balance;
            println!(
                "{} {} (key {key}{}): balance of {} is now {balance}",
                receipt.transaction.code,
                args.amount,
                if receipt.replayed { ", replayed" } else { "" },
                user.username,
            );
        }
    }

    Ok(())
}
