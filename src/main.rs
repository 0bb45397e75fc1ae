use std::{error::Error, net::SocketAddr};

use clap::{Parser, Subcommand};
use log::{error, info};
use recipe_api::{
    actions::{migrate, users::create_superuser, wait_for_db},
    config::Config,
    routes::routes,
    state::State,
};

#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(author, version, about = "Recipe management REST API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the database, apply migrations and serve the API (default)
    Serve,
    /// Block until the database accepts connections
    WaitForDb,
    /// Apply pending migrations
    Migrate,
    /// Create a staff user with superuser rights
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

async fn serve(config: Config) -> Result<(), Box<dyn Error>> {
    let pool = wait_for_db(&config.database_url).await;
    migrate(&pool).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = State::new(pool, config);

    info!("Listening on {addr}");
    warp::serve(routes(state)).run(addr).await;

    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await?,
        Commands::WaitForDb => {
            wait_for_db(&config.database_url).await;
        }
        Commands::Migrate => {
            let pool = wait_for_db(&config.database_url).await;
            migrate(&pool).await?;
            info!("Migrations applied");
        }
        Commands::CreateSuperuser { email, password } => {
            let pool = wait_for_db(&config.database_url).await;
            let user = create_superuser(&email, &password, &pool).await?;
            info!("Superuser {} created", user.email);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{e}");
        std::process::exit(1);
    }
}
